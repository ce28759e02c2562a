// index_lifecycle.rs - Integration tests for import, change propagation and settings
//
// Run with: cargo test --test index_lifecycle

use std::sync::Arc;

use async_trait::async_trait;
use refnum::importer::{ImportRequest, ImportResult, Importer, WorkerImporter};
use refnum::initializer::Initializer;
use refnum::model::BlockData;
use refnum::numeral::NumberStyle;
use refnum::settings::{SettingsFile, SettingsLayer};
use refnum::vault::{FsVault, MemoryVault};
use refnum::{IndexError, IndexEvent, IndexManager};
use tokio::sync::broadcast::Receiver;

fn manager_for(vault: Arc<MemoryVault>) -> Arc<IndexManager> {
    Arc::new(IndexManager::with_vault(vault, SettingsFile::default()))
}

fn theorem_title(manager: &IndexManager, path: &str, line: usize) -> Option<String> {
    match manager.block_at(path, line).unwrap().data {
        BlockData::Theorem { main_title, .. } => main_title,
        other => panic!("expected a theorem at {path}:{line}, got {other:?}"),
    }
}

fn equation_name(manager: &IndexManager, path: &str, line: usize) -> Option<String> {
    match manager.block_at(path, line).unwrap().data {
        BlockData::Equation { print_name, .. } => print_name,
        other => panic!("expected an equation at {path}:{line}, got {other:?}"),
    }
}

fn drain(rx: &mut Receiver<IndexEvent>) -> Vec<IndexEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Fails every document whose path contains "bad"
struct FlakyImporter;

#[async_trait]
impl Importer for FlakyImporter {
    async fn import(&self, request: ImportRequest) -> ImportResult {
        if request.path.contains("bad") {
            ImportResult::Error("parser crashed".to_string())
        } else {
            WorkerImporter.import(request).await
        }
    }
}

/// Never finishes an import
struct StuckImporter;

#[async_trait]
impl Importer for StuckImporter {
    async fn import(&self, _request: ImportRequest) -> ImportResult {
        std::future::pending().await
    }
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn theorem_and_unlinked_equation_after_import() {
    let text = "# Title\n\n> [!theorem]\n> Body.\n\n$$\nx\n$$\n";
    let vault = Arc::new(MemoryVault::with_documents([("a.md", text)]));
    let manager = manager_for(vault);
    let stats = manager.initialize().await.unwrap();

    assert_eq!((stats.files, stats.imported, stats.skipped), (1, 1, 0));
    assert_eq!(theorem_title(&manager, "a.md", 2).as_deref(), Some("Theorem 1"));
    assert_eq!(equation_name(&manager, "a.md", 5), None);
}

#[tokio::test]
async fn missing_metadata_is_skipped() {
    let vault = Arc::new(MemoryVault::with_documents([("a.md", "x\n")]));
    vault.insert_pending("b.md", "y\n");
    let manager = manager_for(vault);
    let stats = manager.initialize().await.unwrap();

    assert_eq!((stats.files, stats.imported, stats.skipped), (2, 1, 1));
    assert_eq!(manager.stored_paths(), vec!["a.md"]);
}

#[tokio::test]
async fn importer_failures_do_not_abort_the_batch() {
    let vault = Arc::new(MemoryVault::with_documents([
        ("a.md", "x\n"),
        ("bad.md", "y\n"),
        ("c.md", "z\n"),
    ]));
    let manager = Arc::new(IndexManager::new(
        vault,
        Arc::new(FlakyImporter),
        SettingsFile::default(),
    ));
    let stats = Initializer::new(manager.clone())
        .with_batch_size(2)
        .run()
        .await
        .unwrap();

    assert_eq!((stats.imported, stats.skipped), (2, 1));
    assert_eq!(manager.stored_paths(), vec!["a.md", "c.md"]);

    let err = manager.reload("bad.md").await.unwrap_err();
    assert!(matches!(err, IndexError::ImportFailure { ref path, .. } if path == "bad.md"));
}

#[tokio::test]
async fn initialization_emits_updated_then_initialized() {
    let vault = Arc::new(MemoryVault::with_documents([("a.md", "x\n"), ("b.md", "y\n")]));
    let manager = manager_for(vault);
    let mut rx = manager.events().subscribe();
    let stats = manager.initialize().await.unwrap();

    let events = drain(&mut rx);
    let tail = &events[events.len() - 2..];
    assert!(matches!(tail[0], IndexEvent::Updated { revision } if revision == manager.revision()));
    assert_eq!(tail[1], IndexEvent::Initialized(stats));
    assert!(manager.is_initialized());
}

#[tokio::test]
async fn cancelled_batch_reports_cancelled() {
    let vault = Arc::new(MemoryVault::with_documents([("a.md", "x\n"), ("b.md", "y\n")]));
    let manager = Arc::new(IndexManager::new(
        vault,
        Arc::new(StuckImporter),
        SettingsFile::default(),
    ));
    let initializer = Initializer::new(manager.clone());
    let token = initializer.cancellation_token();
    let run = tokio::spawn(async move { initializer.run().await });

    tokio::task::yield_now().await;
    token.cancel();
    let result = run.await.unwrap();
    assert!(matches!(result, Err(IndexError::Cancelled)));
    assert!(!manager.is_initialized());
}

#[tokio::test]
async fn filesystem_vault_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("alg")).unwrap();
    std::fs::write(
        dir.path().join("alg/1.2 groups.md"),
        "> [!lemma] Cosets\n> Body.\n\n$$\ng h\n$$ ^prod\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("index.md"), "See [[1.2 groups#^prod]].\n").unwrap();

    let mut settings = SettingsFile::default();
    settings.layers.set_layer(
        "alg",
        SettingsLayer {
            infer_number_prefix: Some(true),
            infer_eq_number_prefix: Some(true),
            ..Default::default()
        },
    );
    let manager = Arc::new(IndexManager::with_vault(
        Arc::new(FsVault::new(dir.path())),
        settings,
    ));
    manager.initialize().await.unwrap();

    let path = "alg/1.2 groups.md";
    assert_eq!(theorem_title(&manager, path, 0).as_deref(), Some("Lemma 1.2.1"));
    assert_eq!(equation_name(&manager, path, 3).as_deref(), Some("(1.2.1)"));
}

// ============================================================================
// Change propagation
// ============================================================================

#[tokio::test]
async fn removing_the_last_link_unnumbers_the_equation() {
    let vault = Arc::new(MemoryVault::with_documents([
        ("a.md", "$$\nx\n$$ ^e1\n\n$$\ny\n$$ ^e2\n"),
        ("src.md", "[[a#^e2]]\n"),
    ]));
    let manager = manager_for(vault.clone());
    manager.initialize().await.unwrap();
    assert_eq!(equation_name(&manager, "a.md", 0), None);
    assert_eq!(equation_name(&manager, "a.md", 4).as_deref(), Some("(1)"));

    vault.insert("src.md", "[[a#^e1]] and [[a#^e2]]\n");
    manager.update_linked(&["src.md"]).await;
    assert_eq!(equation_name(&manager, "a.md", 0).as_deref(), Some("(1)"));
    assert_eq!(equation_name(&manager, "a.md", 4).as_deref(), Some("(2)"));

    vault.insert("src.md", "nothing here\n");
    let renumbered = manager.update_linked(&["src.md"]).await;
    assert_eq!(renumbered, vec!["a.md", "src.md"]);
    assert_eq!(equation_name(&manager, "a.md", 0), None);
    assert_eq!(equation_name(&manager, "a.md", 4), None);
}

#[tokio::test]
async fn notes_created_after_startup_resolve_short_links() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.md"), "start\n").unwrap();
    let manager = Arc::new(IndexManager::with_vault(
        Arc::new(FsVault::new(dir.path())),
        SettingsFile::default(),
    ));
    manager.initialize().await.unwrap();

    std::fs::write(dir.path().join("c.md"), "$$\ny\n$$ ^e\n").unwrap();
    std::fs::write(dir.path().join("d.md"), "see [[c#^e]]\n").unwrap();
    manager.update_linked(&["c.md", "d.md"]).await;

    let links = manager.read(|store| store.page("d.md").map(|p| p.links.clone()));
    assert_eq!(links, Some(vec![refnum::link::Link::block("c.md", "e")]));
    assert_eq!(equation_name(&manager, "c.md", 0).as_deref(), Some("(1)"));
}

#[tokio::test]
async fn revisions_never_decrease() {
    let vault = Arc::new(MemoryVault::with_documents([("a.md", "x\n"), ("b.md", "[[a]]\n")]));
    let manager = manager_for(vault.clone());
    let mut rx = manager.events().subscribe();

    manager.initialize().await.unwrap();
    let after_init = manager.revision();
    vault.insert("a.md", "changed\n");
    manager.update_linked(&["a.md"]).await;
    assert!(manager.revision() > after_init);
    vault.remove("b.md");
    manager.delete("b.md");

    let revisions: Vec<u64> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            IndexEvent::Updated { revision } => Some(revision),
            _ => None,
        })
        .collect();
    assert!(revisions.len() >= 3);
    assert!(revisions.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn rename_reindexes_under_new_path() {
    let vault = Arc::new(MemoryVault::with_documents([("old.md", "> [!definition]\n> Body.\n")]));
    let manager = manager_for(vault.clone());
    manager.initialize().await.unwrap();

    vault.rename("old.md", "new.md");
    manager.rename("old.md", "new.md").await.unwrap();
    assert_eq!(manager.stored_paths(), vec!["new.md"]);
    assert_eq!(theorem_title(&manager, "new.md", 0).as_deref(), Some("Definition 1"));
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn local_settings_renumber_folder() {
    let vault = Arc::new(MemoryVault::with_documents([
        ("ch1/a.md", "> [!theorem]\n> A.\n"),
        ("ch2/b.md", "> [!theorem]\n> B.\n"),
    ]));
    let manager = manager_for(vault);
    manager.initialize().await.unwrap();
    let mut rx = manager.events().subscribe();

    manager.set_layer(
        "ch1",
        SettingsLayer {
            number_style: Some(NumberStyle::AlphUpper),
            ..Default::default()
        },
    );
    assert_eq!(manager.local_settings_updated("ch1"), vec!["ch1/a.md"]);
    assert_eq!(theorem_title(&manager, "ch1/a.md", 0).as_deref(), Some("Theorem A"));
    assert_eq!(theorem_title(&manager, "ch2/b.md", 0).as_deref(), Some("Theorem 1"));

    let events = drain(&mut rx);
    assert_eq!(
        events.last(),
        Some(&IndexEvent::LocalSettingsUpdated { path: "ch1".into() })
    );
}

#[tokio::test]
async fn global_settings_rebuild_everything() {
    let vault = Arc::new(MemoryVault::with_documents([("a.md", "> [!theorem]\n> A.\n")]));
    let manager = manager_for(vault);
    manager.initialize().await.unwrap();

    let mut settings = SettingsFile::default();
    settings.layers.set_layer(
        "",
        SettingsLayer {
            number_style: Some(NumberStyle::RomanUpper),
            number_init: Some(4),
            ..Default::default()
        },
    );
    manager.replace_settings(settings);
    let mut rx = manager.events().subscribe();
    let stats = manager.global_settings_updated().await.unwrap();

    assert_eq!(stats.imported, 1);
    assert_eq!(theorem_title(&manager, "a.md", 0).as_deref(), Some("Theorem IV"));
    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&IndexEvent::GlobalSettingsUpdated));
    assert_eq!(events.last(), Some(&IndexEvent::Initialized(stats)));
}
