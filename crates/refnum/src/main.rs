//
// main.rs
//
// refnum binary: index a vault, print its numbering, optionally keep watching
//

use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use refnum::cli::report::{format_json, format_page, format_report, parse_args, ReportArgs};
use refnum::event::IndexEvent;
use refnum::manager::IndexManager;
use refnum::settings::SettingsFile;
use refnum::vault::FsVault;
use refnum::watch::{run_watch_loop, watch_vault};

/// Settings file picked up from the vault root when `--settings` is absent
const DEFAULT_SETTINGS_FILE: &str = ".refnum.json";

fn print_usage() {
    println!(
        "refnum {}, theorem and equation numbering for markdown vaults.",
        env!("CARGO_PKG_VERSION")
    );
    print!(
        r#"
Usage: refnum [OPTIONS] <DIR>

Available options:

--watch                      Keep running and re-number on file changes
--json                       Print page records as JSON
--settings <FILE>            Settings file (default: <DIR>/{DEFAULT_SETTINGS_FILE})
--concurrency <N>            Documents imported at once during startup
--version                    Print the version
--help                       Print this help message

"#
    );
}

fn load_settings(args: &ReportArgs) -> anyhow::Result<SettingsFile> {
    let mut settings = match &args.settings {
        Some(path) => SettingsFile::load(path)?,
        None => {
            let path = args.path.join(DEFAULT_SETTINGS_FILE);
            if path.is_file() {
                SettingsFile::load(&path)?
            } else {
                SettingsFile::default()
            }
        }
    };
    if let Some(n) = args.concurrency {
        settings.index.batch_size = n;
    }
    Ok(settings)
}

async fn watch(manager: Arc<IndexManager>, vault: Arc<FsVault>, root: &Path, json: bool) -> anyhow::Result<()> {
    let (_watcher, rx) = watch_vault(vault)?;
    let token = CancellationToken::new();
    let debounce = Duration::from_millis(manager.config().debounce_ms);
    let watch_loop = tokio::spawn(run_watch_loop(manager.clone(), rx, debounce, token.clone()));

    let mut events = manager.events().subscribe();
    let printer_manager = manager.clone();
    let printer = tokio::spawn(async move {
        loop {
            let path = match events.recv().await {
                Ok(IndexEvent::PageUpdated { path }) => path,
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    log::warn!("Report fell behind by {} events", missed);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let Some(record) = printer_manager.page_record(&path) else {
                continue;
            };
            if json {
                match serde_json::to_string(&record) {
                    Ok(line) => println!("{line}"),
                    Err(err) => log::warn!("Failed to serialize {}: {}", path, err),
                }
            } else {
                print!("{}", format_page(&record));
            }
        }
    });

    println!("Watching {} (Ctrl-C to stop)", root.display());
    tokio::signal::ctrl_c().await?;
    token.cancel();
    watch_loop.await?;
    printer.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut argv = env::args();
    argv.next(); // skip executable name
    let argv: Vec<String> = argv.collect();

    for arg in &argv {
        match arg.as_str() {
            "--version" => {
                println!("refnum {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_usage();
                return Ok(());
            }
            _ => {}
        }
    }

    let args = parse_args(&mut argv.into_iter()).map_err(|err| anyhow!(err))?;

    env_logger::init();

    let settings = load_settings(&args)?;
    let vault = Arc::new(FsVault::new(&args.path));
    let manager = Arc::new(IndexManager::with_vault(vault.clone(), settings));

    let stats = manager.initialize().await?;
    log::info!(
        "{} documents, {} imported, {} skipped",
        stats.files,
        stats.imported,
        stats.skipped
    );

    let records = manager.page_records();
    if args.json {
        println!("{}", format_json(&records)?);
    } else {
        print!("{}", format_report(&records));
    }

    if args.watch {
        watch(manager, vault, &args.path, args.json).await?;
    }
    Ok(())
}
