//
// settings.rs
//
// Numbering settings, folder/file layers and the settings file
//

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::numeral::NumberStyle;

/// How a theorem's reference name is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TheoremRefFormat {
    #[default]
    #[serde(rename = "[type] [number] ([title])")]
    TypeNumberTitle,
    #[serde(rename = "[type] [number]")]
    TypeNumber,
    #[serde(rename = "[title] if title exists, [type] [number] otherwise")]
    TitleOrTypeNumber,
    #[serde(rename = "[title] ([type] [number]) if title exists, [type] [number] otherwise")]
    TitleWithTypeNumber,
}

/// Fully resolved numbering settings for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberingSettings {
    pub profile: String,
    pub number_prefix: String,
    pub number_suffix: String,
    pub number_init: u32,
    pub number_style: NumberStyle,
    pub infer_number_prefix: bool,
    pub infer_number_prefix_regexp: String,
    pub ref_format: TheoremRefFormat,
    pub title_suffix: String,
    pub label_prefix: String,
    pub eq_number_prefix: String,
    pub eq_number_suffix: String,
    pub eq_number_init: u32,
    pub eq_number_style: NumberStyle,
    pub infer_eq_number_prefix: bool,
    pub infer_eq_number_prefix_regexp: String,
    pub eq_ref_prefix: String,
    pub eq_ref_suffix: String,
}

const DEFAULT_PREFIX_REGEXP: &str = r"^[0-9]+(\.[0-9]+)*";

impl Default for NumberingSettings {
    fn default() -> Self {
        Self {
            profile: "English".to_string(),
            number_prefix: String::new(),
            number_suffix: String::new(),
            number_init: 1,
            number_style: NumberStyle::Arabic,
            infer_number_prefix: false,
            infer_number_prefix_regexp: DEFAULT_PREFIX_REGEXP.to_string(),
            ref_format: TheoremRefFormat::TypeNumberTitle,
            title_suffix: ".".to_string(),
            label_prefix: String::new(),
            eq_number_prefix: String::new(),
            eq_number_suffix: String::new(),
            eq_number_init: 1,
            eq_number_style: NumberStyle::Arabic,
            infer_eq_number_prefix: false,
            infer_eq_number_prefix_regexp: DEFAULT_PREFIX_REGEXP.to_string(),
            eq_ref_prefix: String::new(),
            eq_ref_suffix: String::new(),
        }
    }
}

/// Partial settings attached to a folder or a file. Unset fields fall
/// through to the enclosing layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsLayer {
    pub profile: Option<String>,
    pub number_prefix: Option<String>,
    pub number_suffix: Option<String>,
    pub number_init: Option<u32>,
    pub number_style: Option<NumberStyle>,
    pub infer_number_prefix: Option<bool>,
    pub infer_number_prefix_regexp: Option<String>,
    pub ref_format: Option<TheoremRefFormat>,
    pub title_suffix: Option<String>,
    pub label_prefix: Option<String>,
    pub eq_number_prefix: Option<String>,
    pub eq_number_suffix: Option<String>,
    pub eq_number_init: Option<u32>,
    pub eq_number_style: Option<NumberStyle>,
    pub infer_eq_number_prefix: Option<bool>,
    pub infer_eq_number_prefix_regexp: Option<String>,
    pub eq_ref_prefix: Option<String>,
    pub eq_ref_suffix: Option<String>,
}

macro_rules! apply_fields {
    ($layer:expr, $settings:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$layer.$field {
                $settings.$field = value.clone();
            }
        )+
    };
}

impl SettingsLayer {
    pub fn apply_to(&self, settings: &mut NumberingSettings) {
        apply_fields!(
            self,
            settings,
            profile,
            number_prefix,
            number_suffix,
            number_init,
            number_style,
            infer_number_prefix,
            infer_number_prefix_regexp,
            ref_format,
            title_suffix,
            label_prefix,
            eq_number_prefix,
            eq_number_suffix,
            eq_number_init,
            eq_number_style,
            infer_eq_number_prefix,
            infer_eq_number_prefix_regexp,
            eq_ref_prefix,
            eq_ref_suffix,
        );
    }
}

/// Layers keyed by vault path. `""` is the vault root; other keys are
/// folders or individual documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsTree {
    layers: BTreeMap<String, SettingsLayer>,
}

/// Paths whose layers apply to `path`, outermost first: the root, each
/// ancestor folder, then the path itself.
fn layer_chain(path: &str) -> Vec<&str> {
    let mut chain = vec![""];
    for (i, c) in path.char_indices() {
        if c == '/' {
            chain.push(&path[..i]);
        }
    }
    if !path.is_empty() {
        chain.push(path);
    }
    chain
}

impl SettingsTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, path: &str) -> NumberingSettings {
        let mut settings = NumberingSettings::default();
        for key in layer_chain(path) {
            if let Some(layer) = self.layers.get(key) {
                layer.apply_to(&mut settings);
            }
        }
        settings
    }

    pub fn layer(&self, path: &str) -> Option<&SettingsLayer> {
        self.layers.get(path)
    }

    pub fn set_layer(&mut self, path: impl Into<String>, layer: SettingsLayer) {
        self.layers.insert(path.into(), layer);
    }

    pub fn remove_layer(&mut self, path: &str) -> Option<SettingsLayer> {
        self.layers.remove(path)
    }

    /// Move the layer of `old` (if any) to `new`.
    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(layer) = self.layers.remove(old) {
            self.layers.insert(new.to_string(), layer);
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Index-wide options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Maximum number of documents being imported at once
    pub batch_size: usize,
    /// Treat the only theorem of a document as its main theorem
    pub set_only_theorem_as_main: bool,
    /// Quiet period for batching file change signals
    pub debounce_ms: u64,
}

pub const DEFAULT_BATCH_SIZE: usize = 8;

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            set_only_theorem_as_main: false,
            debounce_ms: 200,
        }
    }
}

/// On-disk settings: `{ "index": {...}, "layers": { "<path>": {...} } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub index: IndexConfig,
    pub layers: SettingsTree,
}

impl SettingsFile {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("invalid settings JSON")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }
}
