//
// vault.rs
//
// Document collections: a directory on disk or an in-memory map
//

use anyhow::{anyhow, Context};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use walkdir::WalkDir;

use crate::link::{normalize_path, resolve_linkpath};
use crate::metadata::{extract_metadata, FileMetadata};

/// The document collection the index is built from.
///
/// Paths are vault-relative and use `/` separators.
pub trait Vault: Send + Sync {
    /// Every markdown document, sorted
    fn markdown_files(&self) -> Vec<String>;

    fn exists(&self, path: &str) -> bool;

    fn read(&self, path: &str) -> anyhow::Result<String>;

    /// Structural metadata, or `None` when it is not available yet
    fn metadata(&self, path: &str) -> Option<FileMetadata>;

    /// Full path of the document a link path written in `source` points to
    fn resolve_linkpath(&self, linkpath: &str, source: &str) -> Option<String>;

    fn write(&self, path: &str, text: &str) -> anyhow::Result<()>;
}

fn is_markdown(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".md")
}

// ============================================================================
// Filesystem
// ============================================================================

/// A directory of markdown files. Hidden files and folders are ignored.
#[derive(Debug)]
pub struct FsVault {
    root: PathBuf,
    /// Listing from the last scan, used for link resolution
    files: RwLock<Vec<String>>,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: RwLock::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Vault path of an absolute filesystem path under the root
    pub fn to_vault_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let path = normalize_path(&relative.to_string_lossy());
        (!path.is_empty()).then_some(path)
    }

    fn scan(&self) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| self.to_vault_path(e.path()))
            .filter(|p| is_markdown(p))
            .collect();
        files.sort();
        files
    }
}

impl Vault for FsVault {
    fn markdown_files(&self) -> Vec<String> {
        let files = self.scan();
        *self.files.write().unwrap_or_else(PoisonError::into_inner) = files.clone();
        files
    }

    fn exists(&self, path: &str) -> bool {
        self.root.join(path).is_file()
    }

    fn read(&self, path: &str) -> anyhow::Result<String> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full).with_context(|| format!("failed to read {}", full.display()))
    }

    fn metadata(&self, path: &str) -> Option<FileMetadata> {
        match self.read(path) {
            Ok(text) => Some(extract_metadata(&text)),
            Err(err) => {
                log::trace!("No metadata for {}: {:#}", path, err);
                None
            }
        }
    }

    /// Resolves against the cached listing first. A miss, or a hit on a file
    /// that has since disappeared, rescans the directory once and retries.
    fn resolve_linkpath(&self, linkpath: &str, source: &str) -> Option<String> {
        let cached = {
            let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
            resolve_linkpath(linkpath, source, files.iter())
        };
        if let Some(found) = cached {
            if self.exists(&found) {
                return Some(found);
            }
        }
        log::trace!("Rescanning {} to resolve {}", self.root.display(), linkpath);
        let files = self.markdown_files();
        resolve_linkpath(linkpath, source, files.iter())
    }

    fn write(&self, path: &str, text: &str) -> anyhow::Result<()> {
        let full = self.root.join(path);
        std::fs::write(&full, text).with_context(|| format!("failed to write {}", full.display()))?;
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        if is_markdown(path) && !files.iter().any(|f| f == path) {
            files.push(path.to_string());
            files.sort();
        }
        Ok(())
    }
}

// ============================================================================
// In memory
// ============================================================================

#[derive(Debug, Clone)]
struct MemoryDocument {
    text: String,
    metadata_ready: bool,
}

/// Documents held in memory; metadata comes from the line-based extractor.
#[derive(Debug, Default)]
pub struct MemoryVault {
    documents: RwLock<BTreeMap<String, MemoryDocument>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents<I, P, T>(documents: I) -> Self
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<String>,
        T: Into<String>,
    {
        let vault = Self::new();
        for (path, text) in documents {
            vault.insert(path, text);
        }
        vault
    }

    pub fn insert(&self, path: impl Into<String>, text: impl Into<String>) {
        self.put(path.into(), text.into(), true);
    }

    /// Add a document whose metadata is not available yet
    pub fn insert_pending(&self, path: impl Into<String>, text: impl Into<String>) {
        self.put(path.into(), text.into(), false);
    }

    fn put(&self, path: String, text: String, metadata_ready: bool) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize_path(&path), MemoryDocument { text, metadata_ready });
    }

    pub fn remove(&self, path: &str) -> bool {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .is_some()
    }

    pub fn rename(&self, old: &str, new: &str) -> bool {
        let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        match documents.remove(old) {
            Some(doc) => {
                documents.insert(normalize_path(new), doc);
                true
            }
            None => false,
        }
    }

    pub fn text(&self, path: &str) -> Option<String> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map(|doc| doc.text.clone())
    }
}

impl Vault for MemoryVault {
    fn markdown_files(&self) -> Vec<String> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|p| is_markdown(p))
            .cloned()
            .collect()
    }

    fn exists(&self, path: &str) -> bool {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    fn read(&self, path: &str) -> anyhow::Result<String> {
        self.text(path).ok_or_else(|| anyhow!("no such document: {path}"))
    }

    fn metadata(&self, path: &str) -> Option<FileMetadata> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        let doc = documents.get(path)?;
        doc.metadata_ready.then(|| extract_metadata(&doc.text))
    }

    fn resolve_linkpath(&self, linkpath: &str, source: &str) -> Option<String> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        resolve_linkpath(linkpath, source, documents.keys())
    }

    fn write(&self, path: &str, text: &str) -> anyhow::Result<()> {
        self.insert(path, text);
        Ok(())
    }
}
