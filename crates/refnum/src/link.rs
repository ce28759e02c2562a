//
// link.rs
//
// Link identity, canonical form and vault path resolution
//

use serde::{Deserialize, Serialize};

/// What a link points at inside its target document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    File,
    Header,
    Block,
}

/// A reference to a document, a heading in it, or a block in it.
///
/// Equality and hashing go through [`Link::canonical`], so display text and
/// the embed flag never distinguish two links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub path: String,
    pub kind: LinkKind,
    /// Heading text or block id, without the `#`/`#^` marker
    pub subpath: Option<String>,
    pub display: Option<String>,
    pub embed: bool,
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.kind == other.kind && self.subpath == other.subpath
    }
}

impl Eq for Link {}

impl std::hash::Hash for Link {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.kind.hash(state);
        self.subpath.hash(state);
    }
}

impl Link {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: normalize_path(&path.into()),
            kind: LinkKind::File,
            subpath: None,
            display: None,
            embed: false,
        }
    }

    pub fn header(path: impl Into<String>, heading: impl Into<String>) -> Self {
        Self {
            kind: LinkKind::Header,
            subpath: Some(heading.into().trim().to_string()),
            ..Self::file(path)
        }
    }

    pub fn block(path: impl Into<String>, block_id: impl Into<String>) -> Self {
        Self {
            kind: LinkKind::Block,
            subpath: Some(block_id.into().trim().to_string()),
            ..Self::file(path)
        }
    }

    /// Parse a link target as written inside `[[...]]`, e.g. `notes/a#^eq1`.
    pub fn infer(linkpath: &str, embed: bool, display: Option<String>) -> Self {
        let mut link = match linkpath.split_once('#') {
            Some((path, sub)) => match sub.strip_prefix('^') {
                Some(block_id) => Link::block(path, block_id),
                None => Link::header(path, sub),
            },
            None => Link::file(linkpath),
        };
        link.embed = embed;
        link.display = display.filter(|d| !d.trim().is_empty());
        link
    }

    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: normalize_path(&path.into()),
            ..self.clone()
        }
    }

    pub fn with_display(mut self, display: Option<String>) -> Self {
        self.display = display;
        self
    }

    pub fn block_id(&self) -> Option<&str> {
        match self.kind {
            LinkKind::Block => self.subpath.as_deref(),
            _ => None,
        }
    }

    /// The identity key used by the link index: `[[path]]`, `[[path#Heading]]`
    /// or `[[path#^id]]`.
    pub fn canonical(&self) -> String {
        let path = self.path.replace('|', "\\|");
        match (self.kind, self.subpath.as_deref()) {
            (LinkKind::Header, Some(sub)) => format!("[[{}#{}]]", path, sub.replace('|', "\\|")),
            (LinkKind::Block, Some(sub)) => format!("[[{}#^{}]]", path, sub.replace('|', "\\|")),
            _ => format!("[[{}]]", path),
        }
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Vault paths use forward slashes and carry no leading `./` or `/`.
pub fn normalize_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let path = path.trim_start_matches("./").trim_start_matches('/');
    path.to_string()
}

/// Folder part of a vault path, `""` for the root
pub fn parent_folder(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// File name without folder and extension
pub fn basename(path: &str) -> &str {
    let name = path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Resolve a link path the way a vault resolves `[[...]]` targets.
///
/// Tries, in order: the exact path, the path with `.md` appended, both of
/// those relative to the source's folder, and finally a base-name match
/// (the shortest candidate path wins).
pub fn resolve_linkpath<'a, I>(linkpath: &str, source: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let linkpath = normalize_path(linkpath);
    if linkpath.is_empty() {
        // `[[#Heading]]` points into the source itself
        return Some(source.to_string());
    }
    let candidates: Vec<&String> = candidates.into_iter().collect();
    let with_ext = if linkpath.ends_with(".md") {
        linkpath.clone()
    } else {
        format!("{linkpath}.md")
    };
    let folder = parent_folder(source);
    let relative = |p: &str| {
        if folder.is_empty() {
            p.to_string()
        } else {
            format!("{folder}/{p}")
        }
    };

    for wanted in [
        linkpath.clone(),
        with_ext.clone(),
        relative(&linkpath),
        relative(&with_ext),
    ] {
        if candidates.iter().any(|c| **c == wanted) {
            return Some(wanted);
        }
    }

    let suffix = format!("/{with_ext}");
    candidates
        .into_iter()
        .filter(|c| c.ends_with(&suffix) || **c == with_ext)
        .min_by_key(|c| (c.len(), (*c).clone()))
        .cloned()
}
