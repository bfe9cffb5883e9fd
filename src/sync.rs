//! Source-to-store synchronization.
//!
//! Sync is pull-based and whole-file: a source log is either skipped (already
//! extracted, fingerprint unchanged) or re-read from the first line. There is
//! no partial resume - the line reader is restartable and the store writes
//! are idempotent, so retrying a whole file is always safe and always
//! converges to the same stored rows.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::classify::{classify, MessageRecord, Record, ToolResultRecord, ToolUseRecord};
use crate::error::{Error, Result};
use crate::source::reader::{LineItem, LogReader};
use crate::source::{source_file_for, Fingerprint, SessionSource, SourceFile};
use crate::store::{ExtractionStatus, Store};
use crate::topics;

/// Everything extracted from one source file, ready to be written in a
/// single transaction.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub session_id: String,
    pub project_dir: String,
    pub source_path: String,
    /// Human-readable project path recovered from message `cwd` fields.
    pub project_path: Option<String>,
    /// Session title, taken from the last summary record in the log.
    pub title: Option<String>,
    pub log_version: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub messages: Vec<MessageRecord>,
    pub tool_uses: Vec<ToolUseRecord>,
    pub tool_results: Vec<ToolResultRecord>,
    pub malformed_lines: u64,
    pub unclassified: u64,
}

impl Extraction {
    /// Display name for the project: last component of the recovered project
    /// path, falling back to the encoded directory name.
    pub fn project_name(&self) -> Option<String> {
        if let Some(path) = &self.project_path {
            if let Some(name) = Path::new(path).file_name().and_then(|n| n.to_str()) {
                return Some(name.to_string());
            }
        }
        if self.project_dir.is_empty() {
            None
        } else {
            Some(self.project_dir.clone())
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Re-extract even when the stored fingerprint matches.
    pub force: bool,
}

/// One file that failed during a sync run. The run itself keeps going.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub category: &'static str,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub files_processed: u64,
    pub files_skipped: u64,
    pub messages_extracted: u64,
    pub malformed_lines: u64,
    pub unclassified: u64,
    pub errors: Vec<FileFailure>,
}

/// Sync every discoverable session log under the source root.
pub fn sync_all(store: &mut Store, source: &SessionSource, opts: SyncOptions) -> Result<SyncReport> {
    let files = source.discover()?;
    info!(count = files.len(), root = %source.root().display(), "discovered session logs");
    Ok(sync_files(store, &files, opts))
}

/// Sync one session by identifier. A session with no discoverable log file
/// is reported and skipped rather than failing - callers reacting to host
/// events may race file creation.
pub fn sync_session(
    store: &mut Store,
    source: &SessionSource,
    session_id: &str,
    opts: SyncOptions,
) -> Result<SyncReport> {
    match source.find_session(session_id)? {
        Some(file) => Ok(sync_files(store, &[file], opts)),
        None => {
            warn!(session_id, "no log file found for session, skipping");
            Ok(SyncReport::default())
        }
    }
}

/// Sync explicitly named log files, wherever they live.
pub fn sync_paths(store: &mut Store, paths: &[PathBuf], opts: SyncOptions) -> Result<SyncReport> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match source_file_for(path) {
            Some(file) => files.push(file),
            None => {
                return Err(Error::InvalidQuery(format!(
                    "not a session log path: {}",
                    path.display()
                )))
            }
        }
    }
    Ok(sync_files(store, &files, opts))
}

fn sync_files(store: &mut Store, files: &[SourceFile], opts: SyncOptions) -> SyncReport {
    let mut report = SyncReport::default();

    for file in files {
        match sync_one(store, file, opts) {
            Ok(Some(ext)) => {
                report.files_processed += 1;
                report.messages_extracted += ext.messages.len() as u64;
                report.malformed_lines += ext.malformed_lines;
                report.unclassified += ext.unclassified;
                // Keep the WAL from ballooning across a large batch; the
                // truncating checkpoint at the end does the real cleanup.
                store.checkpoint_passive();
            }
            Ok(None) => report.files_skipped += 1,
            Err(err) => {
                // One broken file must not stop the rest of the run.
                warn!(path = %file.path.display(), error = %err, "sync failed for file");
                if let Err(mark_err) = store.mark_failed(&file.path.to_string_lossy()) {
                    warn!(error = %mark_err, "could not record extraction failure");
                }
                report.errors.push(FileFailure {
                    path: file.path.clone(),
                    category: err.category(),
                    detail: err.to_string(),
                });
            }
        }
    }

    // Housekeeping after the batch; failures here degrade query planning or
    // disk usage, not correctness.
    store.refresh_statistics();
    store.checkpoint_truncate();
    report
}

/// Sync a single file. `Ok(None)` means the stored extraction is current and
/// nothing was re-read.
fn sync_one(store: &mut Store, file: &SourceFile, opts: SyncOptions) -> Result<Option<Extraction>> {
    let source_path = file.path.to_string_lossy().to_string();

    // Fingerprint before parsing: if the file grows mid-extraction the stale
    // fingerprint forces a re-extract on the next run.
    let fingerprint = Fingerprint::of(&file.path)?;

    if !opts.force {
        if let Some(state) = store.extraction_state(&source_path)? {
            if state.status == ExtractionStatus::Complete && state.fingerprint == Some(fingerprint)
            {
                debug!(path = %source_path, "unchanged since last extraction, skipping");
                return Ok(None);
            }
        }
    }

    let ext = extract(file)?;

    // Marker commits on its own before the bulk write; a crash between the
    // two leaves 'in_progress' behind and the next run re-extracts.
    store.mark_in_progress(&source_path)?;
    let inserted = store.apply_extraction(&ext, fingerprint)?;

    topics::index_session(store, &ext);

    info!(
        session_id = %ext.session_id,
        messages = ext.messages.len(),
        new = inserted,
        malformed = ext.malformed_lines,
        "extracted session log"
    );
    Ok(Some(ext))
}

/// Read and classify one log file into an [`Extraction`]. Pure with respect
/// to the store; only the source file is touched.
pub fn extract(file: &SourceFile) -> Result<Extraction> {
    let mut ext = Extraction {
        session_id: file.session_id.clone(),
        project_dir: file.project_dir.clone(),
        source_path: file.path.to_string_lossy().to_string(),
        project_path: None,
        title: None,
        log_version: None,
        started_at: None,
        ended_at: None,
        messages: Vec::new(),
        tool_uses: Vec::new(),
        tool_results: Vec::new(),
        malformed_lines: 0,
        unclassified: 0,
    };

    for item in LogReader::open(&file.path)? {
        match item? {
            LineItem::Malformed { line_no, snippet } => {
                debug!(path = %ext.source_path, line_no, snippet, "skipping malformed line");
                ext.malformed_lines += 1;
            }
            LineItem::Record { value, .. } => {
                for record in classify(&value) {
                    match record {
                        Record::Message(msg) => {
                            if ext.session_id.is_empty() {
                                if let Some(id) = &msg.session_id {
                                    ext.session_id = id.clone();
                                }
                            }
                            // First cwd wins; later directory changes within
                            // a session do not move the project.
                            if ext.project_path.is_none() {
                                ext.project_path = msg.cwd.clone();
                            }
                            if ext.log_version.is_none() {
                                ext.log_version = msg.version.clone();
                            }
                            if let Some(ts) = msg.timestamp {
                                ext.started_at = Some(match ext.started_at {
                                    Some(cur) => cur.min(ts),
                                    None => ts,
                                });
                                ext.ended_at = Some(match ext.ended_at {
                                    Some(cur) => cur.max(ts),
                                    None => ts,
                                });
                            }
                            ext.messages.push(msg);
                        }
                        Record::ToolUse(tool) => ext.tool_uses.push(tool),
                        Record::ToolResult(res) => ext.tool_results.push(res),
                        // Summaries accumulate; the last one names the
                        // session.
                        Record::Summary(s) => ext.title = Some(s.text),
                        Record::Unrecognized { kind } => {
                            debug!(path = %ext.source_path, kind = kind.as_deref().unwrap_or("<none>"), "unclassified record");
                            ext.unclassified += 1;
                        }
                    }
                }
            }
        }
    }

    if ext.session_id.is_empty() {
        return Err(Error::Corrupt {
            detail: format!("no session identifier for {}", ext.source_path),
        });
    }

    Ok(ext)
}
