//! Host-tool lifecycle hook entry point.
//!
//! The host tool invokes this at session end with the session identifier
//! either as an argument or as a JSON object on stdin. The contract is that
//! the hook NEVER fails the caller: any problem is logged and swallowed, and
//! in background mode the process returns before the sync finishes.

use std::io::Read;
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::store::Store;
use crate::sync::{self, SyncOptions};
use crate::source::SessionSource;

#[derive(Debug, Deserialize)]
struct HookPayload {
    session_id: Option<String>,
}

/// Run the hook. Always returns `Ok(())`; the host tool must not see a
/// session fail to close because indexing had a problem.
pub fn handle(config: &Config, session_id: Option<String>, background: bool) {
    let session_id = match session_id.or_else(read_stdin_session_id) {
        Some(id) if !id.is_empty() => id,
        _ => {
            warn!("hook invoked without a session identifier, ignoring");
            return;
        }
    };

    if background {
        spawn_background_sync(&session_id);
        return;
    }

    if let Err(err) = run_sync(config, &session_id) {
        warn!(session_id = %session_id, error = %err, "hook sync failed");
    }
}

fn run_sync(config: &Config, session_id: &str) -> crate::error::Result<()> {
    let mut store = Store::open(&config.database_path(), config.database.busy_timeout_ms)?;
    let source = SessionSource::new(config.source_root());
    let report = sync::sync_session(&mut store, &source, session_id, SyncOptions::default())?;
    info!(
        session_id,
        processed = report.files_processed,
        messages = report.messages_extracted,
        "hook sync finished"
    );
    Ok(())
}

/// Re-invoke this binary as a detached `sync --session` run so the hook
/// returns immediately.
fn spawn_background_sync(session_id: &str) {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(err) => {
            warn!(error = %err, "cannot locate own binary for background sync");
            return;
        }
    };
    let spawned = Command::new(exe)
        .args(["sync", "--session", session_id])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    match spawned {
        Ok(child) => debug!(session_id, pid = child.id(), "background sync spawned"),
        Err(err) => warn!(session_id, error = %err, "failed to spawn background sync"),
    }
}

fn read_stdin_session_id() -> Option<String> {
    let mut buf = String::new();
    if std::io::stdin().read_to_string(&mut buf).is_err() || buf.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<HookPayload>(&buf) {
        Ok(payload) => payload.session_id,
        Err(err) => {
            warn!(error = %err, "malformed hook payload on stdin");
            None
        }
    }
}
