//
// error.rs
//
// Error taxonomy for importing and indexing
//

use thiserror::Error;

/// Failures surfaced by the index lifecycle.
///
/// Per-document conditions (`ImportFailure`, `MissingMetadata`) are normally
/// absorbed by the import batch and counted as skipped; they only reach a
/// caller through single-document operations such as `reload`.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to import '{path}': {message}")]
    ImportFailure { path: String, message: String },

    #[error("metadata for '{0}' is not available yet")]
    MissingMetadata(String),

    #[error("initialization was cancelled before completing")]
    Cancelled,

    #[error("no {construct} found at {path}:{line}")]
    ConstructNotFound {
        path: String,
        line: usize,
        construct: &'static str,
    },

    #[error("{0}")]
    Vault(#[from] anyhow::Error),
}

/// A theorem callout header whose settings cannot be read. The block is
/// indexed as a generic block instead.
#[derive(Debug, Error)]
pub enum CalloutSettingsError {
    #[error("invalid legacy callout settings: {0}")]
    LegacyJson(#[from] serde_json::Error),

    #[error("unknown theorem kind '{0}'")]
    UnknownKind(String),
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;
