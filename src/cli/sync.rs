//! Sync command implementation

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::source::SessionSource;
use crate::sync::{self, SyncOptions, SyncReport};

pub fn run(
    config: &Config,
    paths: Vec<PathBuf>,
    session: Option<String>,
    force: bool,
) -> Result<()> {
    let mut store = super::open_store(config)?;
    let opts = SyncOptions { force };

    let report = if !paths.is_empty() {
        sync::sync_paths(&mut store, &paths, opts)?
    } else if let Some(session_id) = session {
        let source = SessionSource::new(config.source_root());
        sync::sync_session(&mut store, &source, &session_id, opts)?
    } else {
        let source = SessionSource::new(config.source_root());
        sync::sync_all(&mut store, &source, opts)?
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!(
        "Synced {} file(s), skipped {} unchanged, {} message(s) extracted",
        report.files_processed, report.files_skipped, report.messages_extracted
    );
    if report.malformed_lines > 0 || report.unclassified > 0 {
        println!(
            "Skipped {} malformed line(s), {} unclassified record(s)",
            report.malformed_lines, report.unclassified
        );
    }
    for failure in &report.errors {
        println!(
            "Failed: {} ({}): {}",
            failure.path.display(),
            failure.category,
            failure.detail
        );
    }
}
