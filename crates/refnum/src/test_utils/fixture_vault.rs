//! Deterministic fixture vault generator for benchmarks and tests.
//!
//! Generates synthetic markdown vaults with a controlled number of
//! documents, theorem callouts, labelled equations and cross-document
//! block links. Output is fully deterministic so benchmarks are
//! reproducible.

use std::fmt::Write;
use std::path::Path;
use tempfile::TempDir;

/// Configuration for generating a fixture vault.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub file_count: usize,
    pub theorems_per_file: usize,
    pub equations_per_file: usize,
    /// Block links from each document to equations of the following ones
    pub links_per_file: usize,
    /// Documents are spread over this many folders
    pub folders: usize,
}

const KINDS: &[&str] = &["theorem", "lemma", "definition", "proposition", "corollary"];

impl FixtureConfig {
    /// 10 documents, 3 theorems and 3 equations each.
    pub fn small() -> Self {
        Self {
            file_count: 10,
            theorems_per_file: 3,
            equations_per_file: 3,
            links_per_file: 2,
            folders: 2,
        }
    }

    /// 100 documents, 10 theorems and 10 equations each.
    pub fn medium() -> Self {
        Self {
            file_count: 100,
            theorems_per_file: 10,
            equations_per_file: 10,
            links_per_file: 5,
            folders: 5,
        }
    }
}

/// Vault path of document `index`
pub fn fixture_path(index: usize, config: &FixtureConfig) -> String {
    format!("chapter_{}/note_{}.md", index % config.folders.max(1), index)
}

/// Generate the content of a single document.
fn generate_document(index: usize, config: &FixtureConfig) -> String {
    let mut content = String::new();
    writeln!(content, "# Note {}", index).unwrap();
    content.push('\n');

    for t in 0..config.theorems_per_file {
        let kind = KINDS[(index + t) % KINDS.len()];
        writeln!(content, "> [!{}] Result {}.{}", kind, index, t).unwrap();
        writeln!(content, "> Statement {} of note {}.", t, index).unwrap();
        content.push('\n');
    }

    writeln!(content, "## Equations").unwrap();
    content.push('\n');
    for e in 0..config.equations_per_file {
        writeln!(content, "$$").unwrap();
        writeln!(content, "x_{{{}}} = {}", index, e).unwrap();
        writeln!(content, "$$ ^eq-{}", e).unwrap();
        content.push('\n');
    }

    if config.file_count > 1 && config.equations_per_file > 0 {
        writeln!(content, "## References").unwrap();
        content.push('\n');
        for l in 0..config.links_per_file {
            let target = (index + 1 + l) % config.file_count;
            if target == index {
                continue;
            }
            let target_path = fixture_path(target, config);
            let name = target_path.trim_end_matches(".md").rsplit('/').next().unwrap_or_default();
            writeln!(
                content,
                "See [[{}#^eq-{}]].",
                name,
                l % config.equations_per_file
            )
            .unwrap();
            content.push('\n');
        }
    }

    content
}

/// All documents of the fixture as `(path, text)` pairs, for in-memory vaults.
pub fn fixture_documents(config: &FixtureConfig) -> Vec<(String, String)> {
    (0..config.file_count)
        .map(|i| (fixture_path(i, config), generate_document(i, config)))
        .collect()
}

/// Write fixture documents into an existing directory.
pub fn write_fixture_vault(dir: &Path, config: &FixtureConfig) {
    for (path, content) in fixture_documents(config) {
        let full = dir.join(&path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("Failed to create folder for {}: {}", path, e));
        }
        std::fs::write(&full, &content)
            .unwrap_or_else(|e| panic!("Failed to write fixture file {}: {}", path, e));
    }
}

/// Create a temporary fixture vault. The directory is removed when the
/// `TempDir` is dropped.
pub fn create_fixture_vault(config: &FixtureConfig) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory for fixture vault");
    write_fixture_vault(temp_dir.path(), config);
    temp_dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::extract_metadata;
    use crate::vault::{FsVault, Vault};

    #[test]
    fn test_document_count_and_layout() {
        let config = FixtureConfig::small();
        let dir = create_fixture_vault(&config);
        let vault = FsVault::new(dir.path());
        let files = vault.markdown_files();
        assert_eq!(files.len(), config.file_count);
        assert!(files.iter().all(|f| f.starts_with("chapter_")));
    }

    #[test]
    fn test_deterministic_output() {
        let config = FixtureConfig::small();
        assert_eq!(fixture_documents(&config), fixture_documents(&config));
    }

    #[test]
    fn test_document_structure() {
        let config = FixtureConfig::small();
        let text = generate_document(0, &config);
        let meta = extract_metadata(&text);
        let count = |kind: &str| meta.sections.iter().filter(|s| s.kind == kind).count();
        assert_eq!(count("callout"), config.theorems_per_file);
        assert_eq!(count("math"), config.equations_per_file);
        assert_eq!(meta.links.len(), config.links_per_file);
        assert_eq!(meta.links[0].link, "note_1#^eq-0");
    }
}
