//
// importer.rs
//
// Parsing collaborator: turns document text plus metadata into a page tree
//

use async_trait::async_trait;

use crate::metadata::FileMetadata;
use crate::model::Page;
use crate::parser::parse_page;

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub path: String,
    pub text: String,
    pub metadata: FileMetadata,
}

#[derive(Debug, Clone)]
pub enum ImportResult {
    Page(Box<Page>),
    Error(String),
}

/// Parses documents off the caller's task. The scheduler bounds how many
/// requests are outstanding at once.
#[async_trait]
pub trait Importer: Send + Sync {
    async fn import(&self, request: ImportRequest) -> ImportResult;
}

/// Runs the parser on tokio's blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkerImporter;

#[async_trait]
impl Importer for WorkerImporter {
    async fn import(&self, request: ImportRequest) -> ImportResult {
        let path = request.path.clone();
        let result = tokio::task::spawn_blocking(move || {
            parse_page(&request.path, &request.text, &request.metadata)
        })
        .await;
        match result {
            Ok(page) => ImportResult::Page(Box::new(page)),
            Err(err) => {
                log::warn!("Parser task for {} failed: {}", path, err);
                ImportResult::Error(err.to_string())
            }
        }
    }
}
