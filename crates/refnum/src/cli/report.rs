//
// cli/report.rs
//
// Argument parsing and numbering report for the `refnum` binary
//

use std::fmt::Write;
use std::path::PathBuf;

use crate::model::{BlockData, PageRecord};

/// Parsed command-line arguments
#[derive(Debug, PartialEq, Eq)]
pub struct ReportArgs {
    pub path: PathBuf,
    pub watch: bool,
    pub json: bool,
    pub settings: Option<PathBuf>,
    pub concurrency: Option<usize>,
}

/// Parse `refnum [--watch] [--json] [--settings FILE] [--concurrency N] DIR`.
pub fn parse_args(args: &mut impl Iterator<Item = String>) -> Result<ReportArgs, String> {
    let mut path: Option<PathBuf> = None;
    let mut watch = false;
    let mut json = false;
    let mut settings = None;
    let mut concurrency = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--watch" => watch = true,
            "--json" => json = true,
            "--settings" => {
                let file = args
                    .next()
                    .ok_or_else(|| "--settings requires a file".to_string())?;
                settings = Some(PathBuf::from(file));
            }
            "--concurrency" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--concurrency requires a number".to_string())?;
                let n: usize = value
                    .parse()
                    .map_err(|_| format!("Invalid concurrency '{}'", value))?;
                if n == 0 {
                    return Err("--concurrency must be at least 1".to_string());
                }
                concurrency = Some(n);
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown flag: '{}'", other));
            }
            _ => {
                if path.is_some() {
                    return Err("Multiple paths provided; expected exactly one".to_string());
                }
                path = Some(PathBuf::from(arg));
            }
        }
    }

    let path = path.ok_or_else(|| "Missing required <DIR> argument".to_string())?;
    if !path.is_dir() {
        return Err(format!("Not a directory: {}", path.display()));
    }

    Ok(ReportArgs {
        path,
        watch,
        json,
        settings,
        concurrency,
    })
}

/// `(line, name, reference)` for every numbered construct of a page
fn numbered_entries(record: &PageRecord) -> Vec<(usize, String, String)> {
    let mut entries = Vec::new();
    for block in record.sections.iter().flat_map(|s| &s.blocks) {
        let line = block.position.start + 1;
        match &block.data {
            BlockData::Theorem {
                main_title: Some(title),
                ref_name,
                ..
            } => entries.push((line, title.clone(), ref_name.clone().unwrap_or_default())),
            BlockData::Equation {
                print_name: Some(name),
                ref_name,
                ..
            } => entries.push((line, name.clone(), ref_name.clone().unwrap_or_default())),
            _ => {}
        }
    }
    entries
}

/// Human-readable table of one page's numbering. Empty when nothing in the
/// page is numbered.
pub fn format_page(record: &PageRecord) -> String {
    let entries = numbered_entries(record);
    if entries.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    match &record.ref_name {
        Some(name) => writeln!(out, "{}  [{}]", record.path, name).unwrap(),
        None => writeln!(out, "{}", record.path).unwrap(),
    }
    for (line, name, reference) in entries {
        writeln!(out, "  {:>5}  {:<24} {}", line, name, reference).unwrap();
    }
    out
}

pub fn format_report(records: &[PageRecord]) -> String {
    records
        .iter()
        .map(format_page)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_json(records: &[PageRecord]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}
