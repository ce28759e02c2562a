//
// initializer.rs
//
// Startup import batch with a bounded window of in-flight imports
//

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{IndexError, IndexResult};
use crate::event::{IndexEvent, InitializationStats};
use crate::manager::IndexManager;

/// Imports every markdown document of the vault, then numbers them all.
///
/// At most `batch_size` imports are outstanding at once; a freed slot pulls
/// the next queued document. Per-document failures are counted as skipped.
/// Cancelling the token makes [`run`](Self::run) return
/// [`IndexError::Cancelled`]; imports already in flight are detached and
/// never reach the store.
pub struct Initializer {
    manager: Arc<IndexManager>,
    batch_size: usize,
    cancellation_token: CancellationToken,
}

impl Initializer {
    pub fn new(manager: Arc<IndexManager>) -> Self {
        let batch_size = manager.config().batch_size;
        Self {
            manager,
            batch_size,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub async fn run(&self) -> IndexResult<InitializationStats> {
        let started = Instant::now();
        let window = self.batch_size.max(1);

        let vault = self.manager.vault().clone();
        let files = tokio::task::spawn_blocking(move || vault.markdown_files())
            .await
            .map_err(|err| IndexError::Vault(anyhow!("listing the vault failed: {err}")))?;
        log::info!("Importing {} documents ({} at a time)", files.len(), window);

        let mut stats = InitializationStats {
            files: files.len(),
            ..Default::default()
        };
        let mut queue: VecDeque<String> = files.into();
        let mut in_flight: JoinSet<(String, IndexResult<()>)> = JoinSet::new();

        loop {
            while in_flight.len() < window {
                let Some(path) = queue.pop_front() else {
                    break;
                };
                let manager = self.manager.clone();
                let token = self.cancellation_token.clone();
                in_flight.spawn(async move {
                    let result = manager.import_for_batch(&path, &token).await;
                    (path, result)
                });
            }
            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    log::info!(
                        "Import batch cancelled with {} in flight and {} queued",
                        in_flight.len(),
                        queue.len()
                    );
                    in_flight.detach_all();
                    return Err(IndexError::Cancelled);
                }
                joined = in_flight.join_next() => match joined {
                    Some(Ok((_, Ok(())))) => stats.imported += 1,
                    Some(Ok((path, Err(err)))) => {
                        stats.skipped += 1;
                        match err {
                            IndexError::MissingMetadata(_) => {
                                log::trace!("Skipped {}: metadata not ready", path)
                            }
                            err => log::warn!("Skipped {}: {}", path, err),
                        }
                    }
                    Some(Err(err)) => {
                        stats.skipped += 1;
                        log::warn!("Import task failed: {}", err);
                    }
                    None => {}
                }
            }
        }

        self.finalize(started, stats)
    }

    fn finalize(&self, started: Instant, mut stats: InitializationStats) -> IndexResult<InitializationStats> {
        for path in self.manager.stored_paths() {
            self.manager.number_document(&path);
        }
        let revision = self.manager.touch();
        self.manager.mark_initialized();

        stats.duration_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Indexed {} of {} documents in {}ms ({} skipped)",
            stats.imported,
            stats.files,
            stats.duration_ms,
            stats.skipped
        );
        let events = self.manager.events();
        events.emit(IndexEvent::Updated { revision });
        events.emit(IndexEvent::Initialized(stats.clone()));
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::{ImportRequest, ImportResult, Importer, WorkerImporter};
    use crate::settings::SettingsFile;
    use async_trait::async_trait;
    use std::time::Duration;
    use crate::vault::MemoryVault;

    #[tokio::test]
    async fn test_window_of_one_imports_everything() {
        let vault = Arc::new(MemoryVault::with_documents([
            ("a.md", "x\n"),
            ("b.md", "y\n"),
            ("c.md", "z\n"),
        ]));
        let manager = Arc::new(IndexManager::with_vault(vault, SettingsFile::default()));
        let stats = Initializer::new(manager.clone())
            .with_batch_size(1)
            .run()
            .await
            .unwrap();
        assert_eq!((stats.files, stats.imported, stats.skipped), (3, 3, 0));
        assert!(manager.is_initialized());
    }

    /// Takes a while to hand back each page
    struct SlowImporter;

    #[async_trait]
    impl Importer for SlowImporter {
        async fn import(&self, request: ImportRequest) -> ImportResult {
            tokio::time::sleep(Duration::from_millis(50)).await;
            WorkerImporter.import(request).await
        }
    }

    #[tokio::test]
    async fn test_cancelled_batch_leaves_store_untouched() {
        let vault = Arc::new(MemoryVault::with_documents([("a.md", "x\n"), ("b.md", "y\n")]));
        let manager = Arc::new(IndexManager::new(
            vault,
            Arc::new(SlowImporter),
            SettingsFile::default(),
        ));
        let initializer = Initializer::new(manager.clone());
        let token = initializer.cancellation_token();
        let run = tokio::spawn(async move { initializer.run().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        assert!(matches!(run.await.unwrap(), Err(IndexError::Cancelled)));
        let revision = manager.revision();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(manager.revision(), revision);
        assert!(manager.stored_paths().is_empty());
    }

    #[tokio::test]
    async fn test_empty_vault() {
        let manager = Arc::new(IndexManager::with_vault(
            Arc::new(MemoryVault::new()),
            SettingsFile::default(),
        ));
        let mut rx = manager.events().subscribe();
        let stats = Initializer::new(manager.clone()).run().await.unwrap();
        assert_eq!(stats.files, 0);
        assert!(matches!(rx.recv().await.unwrap(), IndexEvent::Updated { .. }));
        assert_eq!(rx.recv().await.unwrap(), IndexEvent::Initialized(stats));
    }
}
