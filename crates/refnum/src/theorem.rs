//
// theorem.rs
//
// Theorem-like kinds, the callout header grammar and display-name profiles
//

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::error::CalloutSettingsError;
use crate::model::TheoremSettings;

/// Canonical kind id and its short prefix
pub const THEOREM_KINDS: &[(&str, &str)] = &[
    ("axiom", "axm"),
    ("definition", "def"),
    ("lemma", "lem"),
    ("proposition", "prop"),
    ("theorem", "thm"),
    ("corollary", "cor"),
    ("claim", "clm"),
    ("assumption", "ass"),
    ("example", "exm"),
    ("exercise", "exr"),
    ("conjecture", "cnj"),
    ("hypothesis", "hyp"),
    ("remark", "rmk"),
];

const LEGACY_KIND: &str = "math";

/// Map a kind id or prefix (any case) to the canonical kind id.
pub fn canonical_kind(token: &str) -> Option<&'static str> {
    let token = token.trim().to_lowercase();
    THEOREM_KINDS
        .iter()
        .find(|(id, prefix)| *id == token || *prefix == token)
        .map(|(id, _)| *id)
}

pub fn kind_prefix(kind: &str) -> Option<&'static str> {
    THEOREM_KINDS
        .iter()
        .find(|(id, _)| *id == kind)
        .map(|(_, prefix)| *prefix)
}

fn callout_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let mut alternatives: Vec<&str> = Vec::new();
        for (id, prefix) in THEOREM_KINDS {
            alternatives.push(id);
            alternatives.push(prefix);
        }
        alternatives.push(LEGACY_KIND);
        Regex::new(&format!(
            r"(?i)> *\[! *(?P<type>{}) *(?:\|(?P<number>.*?))?\](?P<fold>[+-])?(?P<title> .*)?",
            alternatives.join("|")
        ))
        .unwrap()
    })
}

#[derive(Deserialize)]
struct LegacySettings {
    #[serde(rename = "type")]
    kind: String,
    number: Option<String>,
    title: Option<String>,
}

/// Read the settings of a theorem callout from its first line.
///
/// Returns `Ok(None)` when the line is not a theorem callout header. The
/// number directive is normalized: nothing after `|` means `auto`, `*`
/// means unnumbered (empty).
pub fn parse_theorem_callout(line: &str) -> Result<Option<TheoremSettings>, CalloutSettingsError> {
    let Some(caps) = callout_regex().captures(line) else {
        return Ok(None);
    };
    let token = caps.name("type").map(|m| m.as_str()).unwrap_or_default();
    let number = caps.name("number").map(|m| m.as_str().trim());
    let fold = caps
        .name("fold")
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let title = caps
        .name("title")
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty());

    if token.eq_ignore_ascii_case(LEGACY_KIND) {
        let payload = number.unwrap_or_default();
        let legacy: LegacySettings = serde_json::from_str(payload)?;
        let kind = canonical_kind(&legacy.kind)
            .ok_or_else(|| CalloutSettingsError::UnknownKind(legacy.kind.clone()))?;
        return Ok(Some(TheoremSettings {
            kind: kind.to_string(),
            number: normalize_number(legacy.number.as_deref()),
            title: legacy.title.filter(|t| !t.trim().is_empty()).or(title),
            fold,
            legacy: true,
        }));
    }

    let kind = canonical_kind(token).ok_or_else(|| CalloutSettingsError::UnknownKind(token.to_string()))?;
    Ok(Some(TheoremSettings {
        kind: kind.to_string(),
        number: normalize_number(number),
        title,
        fold,
        legacy: false,
    }))
}

fn normalize_number(number: Option<&str>) -> String {
    match number.map(str::trim) {
        None | Some("") | Some("auto") => "auto".to_string(),
        Some("*") => String::new(),
        Some(literal) => literal.to_string(),
    }
}

// ============================================================================
// Profiles
// ============================================================================

/// Display names for theorem kinds in one language
pub struct Profile {
    pub id: &'static str,
    names: &'static [(&'static str, &'static str)],
}

pub const PROFILES: &[Profile] = &[
    Profile {
        id: "English",
        names: &[
            ("axiom", "Axiom"),
            ("definition", "Definition"),
            ("lemma", "Lemma"),
            ("proposition", "Proposition"),
            ("theorem", "Theorem"),
            ("corollary", "Corollary"),
            ("claim", "Claim"),
            ("assumption", "Assumption"),
            ("example", "Example"),
            ("exercise", "Exercise"),
            ("conjecture", "Conjecture"),
            ("hypothesis", "Hypothesis"),
            ("remark", "Remark"),
        ],
    },
    Profile {
        id: "日本語",
        names: &[
            ("axiom", "公理"),
            ("definition", "定義"),
            ("lemma", "補題"),
            ("proposition", "命題"),
            ("theorem", "定理"),
            ("corollary", "系"),
            ("claim", "主張"),
            ("assumption", "仮定"),
            ("example", "例"),
            ("exercise", "演習問題"),
            ("conjecture", "予想"),
            ("hypothesis", "仮説"),
            ("remark", "注意"),
        ],
    },
];

/// Display name of `kind` under `profile`, falling back to English and then
/// to the capitalized kind id.
pub fn display_name(profile: &str, kind: &str) -> String {
    let lookup = |p: &Profile| {
        p.names
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, name)| name.to_string())
    };
    PROFILES
        .iter()
        .find(|p| p.id == profile)
        .and_then(lookup)
        .or_else(|| PROFILES.first().and_then(lookup))
        .unwrap_or_else(|| {
            let mut chars = kind.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
}
