//
// watch.rs
//
// Filesystem change signals, debounced into index updates
//

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::manager::IndexManager;
use crate::vault::FsVault;

/// A change to one vault document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Changed(String),
    Renamed { from: String, to: String },
    Deleted(String),
}

fn is_hidden(path: &str) -> bool {
    path.split('/').any(|part| part.starts_with('.'))
}

fn is_markdown(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".md")
}

/// Translate a raw notify event into document changes. Events outside the
/// vault, on hidden paths or on non-markdown files are dropped.
pub fn classify(event: &Event, vault: &FsVault) -> Vec<ChangeEvent> {
    let paths: Vec<Option<String>> = event
        .paths
        .iter()
        .map(|p| {
            vault
                .to_vault_path(p)
                .filter(|p| is_markdown(p) && !is_hidden(p))
        })
        .collect();

    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            match (&paths[0], &paths[1]) {
                (Some(from), Some(to)) => vec![ChangeEvent::Renamed {
                    from: from.clone(),
                    to: to.clone(),
                }],
                (Some(from), None) => vec![ChangeEvent::Deleted(from.clone())],
                (None, Some(to)) => vec![ChangeEvent::Changed(to.clone())],
                (None, None) => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => paths
            .into_iter()
            .flatten()
            .map(ChangeEvent::Deleted)
            .collect(),
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any => paths
            .into_iter()
            .flatten()
            .map(ChangeEvent::Changed)
            .collect(),
        _ => Vec::new(),
    }
}

/// Start watching the vault root. The watcher stops when it is dropped.
pub fn watch_vault(
    vault: Arc<FsVault>,
) -> anyhow::Result<(RecommendedWatcher, mpsc::UnboundedReceiver<ChangeEvent>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler_vault = vault.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for change in classify(&event, &handler_vault) {
                log::trace!("Change signal: {:?}", change);
                // Receiver gone means the watch loop has stopped
                let _ = tx.send(change);
            }
        }
        Err(err) => log::warn!("File watcher error: {}", err),
    })
    .context("failed to create file watcher")?;

    watcher
        .watch(vault.root(), RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", vault.root().display()))?;
    log::info!("Watching {}", vault.root().display());
    Ok((watcher, rx))
}

/// Apply one debounced batch of changes in arrival order. Content changes
/// are collected into a single `update_linked` call at the end.
pub async fn apply_changes(manager: &IndexManager, changes: Vec<ChangeEvent>) {
    let mut changed: BTreeSet<String> = BTreeSet::new();
    for change in changes {
        match change {
            ChangeEvent::Changed(path) => {
                changed.insert(path);
            }
            ChangeEvent::Deleted(path) => {
                changed.remove(&path);
                manager.delete(&path);
            }
            ChangeEvent::Renamed { from, to } => {
                changed.remove(&from);
                changed.remove(&to);
                if let Err(err) = manager.rename(&from, &to).await {
                    log::warn!("Rename {} -> {} not indexed: {}", from, to, err);
                }
            }
        }
    }
    if !changed.is_empty() {
        let files: Vec<String> = changed.into_iter().collect();
        manager.update_linked(&files).await;
    }
}

/// Drain change signals until the channel closes or `token` is cancelled.
/// Signals arriving within `debounce` of each other form one batch.
pub async fn run_watch_loop(
    manager: Arc<IndexManager>,
    mut rx: mpsc::UnboundedReceiver<ChangeEvent>,
    debounce: Duration,
    token: CancellationToken,
) {
    loop {
        let first = tokio::select! {
            _ = token.cancelled() => break,
            change = rx.recv() => match change {
                Some(change) => change,
                None => break,
            },
        };

        let mut batch = vec![first];
        let mut closed = false;
        loop {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(change)) => batch.push(change),
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }

        log::debug!("Applying {} change signals", batch.len());
        apply_changes(&manager, batch).await;
        if closed {
            break;
        }
    }
    log::info!("Watch loop stopped");
}
