//
// manager.rs
//
// Index lifecycle: import, change propagation and renumbering
//

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::anyhow;
use tokio_util::sync::CancellationToken;

use crate::error::{IndexError, IndexResult};
use crate::event::{EventBus, IndexEvent, InitializationStats};
use crate::importer::{ImportRequest, ImportResult, Importer, WorkerImporter};
use crate::link::Link;
use crate::model::{BlockRecord, PageRecord};
use crate::numbering::{update_names, NumberingSummary};
use crate::settings::{IndexConfig, NumberingSettings, SettingsFile, SettingsLayer};
use crate::staticify::{apply_rewrites, plan_rewrites, WriteOutcome};
use crate::store::ObjectStore;
use crate::vault::Vault;

/// Owns the object store and keeps it in step with the vault.
///
/// The store sits behind a synchronous lock that is only taken between
/// suspension points, so there is a single logical mutator even when many
/// imports are in flight.
pub struct IndexManager {
    store: RwLock<ObjectStore>,
    vault: Arc<dyn Vault>,
    importer: Arc<dyn Importer>,
    settings: RwLock<SettingsFile>,
    events: EventBus,
    initialized: AtomicBool,
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("revision", &self.revision())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl IndexManager {
    pub fn new(vault: Arc<dyn Vault>, importer: Arc<dyn Importer>, settings: SettingsFile) -> Self {
        Self {
            store: RwLock::new(ObjectStore::new()),
            vault,
            importer,
            settings: RwLock::new(settings),
            events: EventBus::new(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Manager with the blocking-pool importer
    pub fn with_vault(vault: Arc<dyn Vault>, settings: SettingsFile) -> Self {
        Self::new(vault, Arc::new(WorkerImporter), settings)
    }

    pub fn vault(&self) -> &Arc<dyn Vault> {
        &self.vault
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    fn store_read(&self) -> RwLockReadGuard<'_, ObjectStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_write(&self) -> RwLockWriteGuard<'_, ObjectStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the store under the read lock
    pub fn read<R>(&self, f: impl FnOnce(&ObjectStore) -> R) -> R {
        f(&self.store_read())
    }

    pub fn revision(&self) -> u64 {
        self.store_read().revision()
    }

    pub(crate) fn touch(&self) -> u64 {
        let mut store = self.store_write();
        store.touch();
        store.revision()
    }

    /// Paths of every stored document, sorted
    pub fn stored_paths(&self) -> Vec<String> {
        self.store_read()
            .pages()
            .into_iter()
            .map(|p| p.path.clone())
            .collect()
    }

    pub fn page_record(&self, path: &str) -> Option<PageRecord> {
        self.store_read().page_record(path)
    }

    pub fn page_records(&self) -> Vec<PageRecord> {
        let store = self.store_read();
        store
            .pages()
            .into_iter()
            .filter_map(|p| store.page_record(&p.path))
            .collect()
    }

    /// The block covering `line` in `path`
    pub fn block_at(&self, path: &str, line: usize) -> IndexResult<BlockRecord> {
        self.store_read()
            .block_at_line(path, line)
            .map(|b| b.to_record())
            .ok_or_else(|| IndexError::ConstructNotFound {
                path: path.to_string(),
                line,
                construct: "block",
            })
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn config(&self) -> IndexConfig {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .index
            .clone()
    }

    pub fn settings_for(&self, path: &str) -> NumberingSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .layers
            .resolve(path)
    }

    /// Replace the settings layer at `path`. Call
    /// [`local_settings_updated`](Self::local_settings_updated) afterwards to
    /// renumber.
    pub fn set_layer(&self, path: &str, layer: SettingsLayer) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .layers
            .set_layer(path, layer);
    }

    /// Replace all settings. Call
    /// [`global_settings_updated`](Self::global_settings_updated) afterwards.
    pub fn replace_settings(&self, settings: SettingsFile) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    // ========================================================================
    // Import
    // ========================================================================

    /// Read, parse and store one document without renumbering or emitting.
    pub(crate) async fn import_document(&self, path: &str) -> IndexResult<()> {
        self.import_into_store(path, None).await
    }

    /// [`import_document`](Self::import_document) for a startup batch: once
    /// `batch` is cancelled the parsed page is dropped instead of stored.
    pub(crate) async fn import_for_batch(&self, path: &str, batch: &CancellationToken) -> IndexResult<()> {
        self.import_into_store(path, Some(batch)).await
    }

    async fn import_into_store(&self, path: &str, batch: Option<&CancellationToken>) -> IndexResult<()> {
        let vault = self.vault.clone();
        let owned = path.to_string();
        let (metadata, text) = tokio::task::spawn_blocking(move || {
            let metadata = vault.metadata(&owned);
            let text = metadata.as_ref().map(|_| vault.read(&owned));
            (metadata, text)
        })
        .await
        .map_err(|err| IndexError::Vault(anyhow!("vault task failed: {err}")))?;

        let Some(metadata) = metadata else {
            return Err(IndexError::MissingMetadata(path.to_string()));
        };
        let text = match text {
            Some(text) => text?,
            None => return Err(IndexError::MissingMetadata(path.to_string())),
        };

        let request = ImportRequest {
            path: path.to_string(),
            text,
            metadata,
        };
        let mut page = match self.importer.import(request).await {
            ImportResult::Page(page) => page,
            ImportResult::Error(message) => {
                return Err(IndexError::ImportFailure {
                    path: path.to_string(),
                    message,
                })
            }
        };

        // Resolution may rescan the vault.
        let vault = self.vault.clone();
        let source = path.to_string();
        let page = tokio::task::spawn_blocking(move || {
            page.normalize_links(&|link: &Link| match vault.resolve_linkpath(&link.path, &source) {
                Some(resolved) => link.with_path(resolved),
                None => link.clone(),
            });
            page
        })
        .await
        .map_err(|err| IndexError::Vault(anyhow!("link resolution failed: {err}")))?;

        let mut store = self.store_write();
        if batch.is_some_and(CancellationToken::is_cancelled) {
            log::trace!("Dropped {}: batch cancelled", path);
            return Err(IndexError::Cancelled);
        }
        store.store_page(*page);
        log::trace!("Stored {}", path);
        Ok(())
    }

    /// Re-import one document and renumber it.
    pub async fn reload(&self, path: &str) -> IndexResult<()> {
        if let Err(err) = self.import_document(path).await {
            match &err {
                IndexError::MissingMetadata(_) => log::debug!("Not reloading {}: {}", path, err),
                _ => log::warn!("Failed to reload {}: {}", path, err),
            }
            return Err(err);
        }
        self.number_document(path);
        self.events.emit(IndexEvent::Updated {
            revision: self.revision(),
        });
        self.events.emit(IndexEvent::PageUpdated {
            path: path.to_string(),
        });
        Ok(())
    }

    // ========================================================================
    // Numbering
    // ========================================================================

    pub(crate) fn number_document(&self, path: &str) -> NumberingSummary {
        let settings = self.settings_for(path);
        let only_theorem_main = self.config().set_only_theorem_as_main;
        update_names(&mut self.store_write(), path, &settings, only_theorem_main)
    }

    /// Recompute numbering for one stored document.
    pub fn renumber(&self, path: &str) -> NumberingSummary {
        let summary = self.number_document(path);
        self.events.emit(IndexEvent::PageUpdated {
            path: path.to_string(),
        });
        summary
    }

    /// Documents targeted by block links from the stored copy of `path`
    fn block_link_targets(&self, path: &str) -> BTreeSet<String> {
        self.store_read()
            .page(path)
            .map(|page| {
                page.links
                    .iter()
                    .filter(|l| l.block_id().is_some())
                    .map(|l| l.path.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Renumber every listed document that is still stored and present in
    /// the vault. Returns the paths that were renumbered.
    fn renumber_all(&self, paths: BTreeSet<String>) -> Vec<String> {
        let mut renumbered = Vec::new();
        for path in paths {
            let stored = self.store_read().page(&path).is_some();
            if stored && self.vault.exists(&path) {
                self.renumber(&path);
                renumbered.push(path);
            }
        }
        renumbered
    }

    // ========================================================================
    // Change signals
    // ========================================================================

    /// Reload the changed documents, then renumber them together with every
    /// document they link to by block, before or after the change. Emits one
    /// `Updated` for the whole batch and returns the renumbered paths.
    pub async fn update_linked<S>(&self, files: &[S]) -> Vec<String>
    where
        S: AsRef<str> + Sync,
    {
        let mut affected: BTreeSet<String> = BTreeSet::new();
        for file in files {
            affected.extend(self.block_link_targets(file.as_ref()));
        }

        for file in files {
            let path = file.as_ref();
            match self.import_document(path).await {
                Ok(()) => {
                    affected.insert(path.to_string());
                }
                Err(IndexError::MissingMetadata(_)) => {
                    log::debug!("Metadata for {} not ready, keeping previous copy", path)
                }
                Err(err) => log::warn!("Failed to import {}: {}", path, err),
            }
        }

        for file in files {
            affected.extend(self.block_link_targets(file.as_ref()));
        }

        let renumbered = self.renumber_all(affected);
        log::debug!("Change to {} documents renumbered {}", files.len(), renumbered.len());
        self.events.emit(IndexEvent::Updated {
            revision: self.revision(),
        });
        renumbered
    }

    /// Move a document: drop the old object, carry its settings layer over
    /// and import it under the new path.
    pub async fn rename(&self, old: &str, new: &str) -> IndexResult<()> {
        let mut affected = self.block_link_targets(old);
        self.store_write().delete(old);
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .layers
            .rename(old, new);

        let result = self.import_document(new).await;
        if let Err(err) = &result {
            log::warn!("Failed to import renamed document {}: {}", new, err);
        }
        affected.extend(self.block_link_targets(new));
        affected.insert(new.to_string());
        affected.remove(old);
        self.renumber_all(affected);

        self.events.emit(IndexEvent::Updated {
            revision: self.revision(),
        });
        result
    }

    /// Forget a deleted document and renumber whatever it linked to.
    pub fn delete(&self, path: &str) -> Vec<String> {
        let mut affected = self.block_link_targets(path);
        affected.remove(path);
        let removed = self.store_write().delete(path);
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .layers
            .remove_layer(path);
        if !removed {
            log::trace!("Deleted document {} was not indexed", path);
        }

        let renumbered = self.renumber_all(affected);
        self.events.emit(IndexEvent::Updated {
            revision: self.revision(),
        });
        renumbered
    }

    /// Renumber every stored document at or below `path` (a folder or a
    /// document; `""` is the whole vault).
    pub fn local_settings_updated(&self, path: &str) -> Vec<String> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let paths: Vec<String> = self
            .stored_paths()
            .into_iter()
            .filter(|p| path.is_empty() || p == path || p.starts_with(&prefix))
            .collect();
        for p in &paths {
            self.renumber(p);
        }
        self.events.emit(IndexEvent::LocalSettingsUpdated {
            path: path.to_string(),
        });
        paths
    }

    /// Drop everything and run a fresh import batch.
    pub async fn global_settings_updated(self: &Arc<Self>) -> IndexResult<InitializationStats> {
        self.store_write().clear();
        self.events.emit(IndexEvent::GlobalSettingsUpdated);
        self.initialize().await
    }

    /// Run the startup import batch with the configured window.
    pub async fn initialize(self: &Arc<Self>) -> IndexResult<InitializationStats> {
        crate::initializer::Initializer::new(self.clone()).run().await
    }

    // ========================================================================
    // Staticify
    // ========================================================================

    /// Write the current equation numbers into the document as `\tag{..}`.
    ///
    /// Refused without touching the document when `editing_line` falls in a
    /// range that would be rewritten.
    pub async fn staticify(&self, path: &str, editing_line: Option<usize>) -> IndexResult<WriteOutcome> {
        let vault = self.vault.clone();
        let owned = path.to_string();
        let text = tokio::task::spawn_blocking(move || vault.read(&owned))
            .await
            .map_err(|err| IndexError::Vault(anyhow!("vault task failed: {err}")))??;

        let rewrites = {
            let store = self.store_read();
            if store.page(path).is_none() {
                return Err(IndexError::MissingMetadata(path.to_string()));
            }
            let lines: Vec<&str> = text.lines().collect();
            plan_rewrites(&store, path, &lines)
        };
        if rewrites.is_empty() {
            return Ok(WriteOutcome::Unchanged);
        }
        if let Some(line) = editing_line {
            if rewrites.iter().any(|r| r.position.contains_line(line)) {
                log::debug!("Not rewriting {}: line {} is being edited", path, line);
                return Ok(WriteOutcome::Refused);
            }
        }

        let updated = apply_rewrites(&text, &rewrites);
        self.vault.write(path, &updated)?;
        log::info!("Wrote {} equation tags into {}", rewrites.len(), path);
        self.update_linked(&[path]).await;
        Ok(WriteOutcome::Written(rewrites.len()))
    }
}
