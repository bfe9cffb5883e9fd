//! Session source discovery.
//!
//! Session logs live under a root directory as
//! `<root>/<encoded-project-dir>/<session_id>.jsonl`. The encoding scheme of
//! the project directory name is not specified anywhere authoritative and may
//! vary by host-tool version, so it is treated as opaque: the human-readable
//! project path is recovered from `cwd` fields inside the log content, and
//! the encoded name is only kept as a display fallback.

pub mod reader;

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// One discoverable session log file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Session identifier, taken from the file stem.
    pub session_id: String,
    /// Encoded project directory name, stored verbatim.
    pub project_dir: String,
    pub path: PathBuf,
}

/// (size, modification-time) pair used to detect source changes between
/// sync runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub size: u64,
    pub mtime_ms: i64,
}

impl Fingerprint {
    pub fn of(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path).map_err(|e| Error::SourceUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Ok(Self {
            size: meta.len(),
            mtime_ms,
        })
    }
}

/// Filesystem-backed session source.
pub struct SessionSource {
    root: PathBuf,
}

impl SessionSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discover all session log files under the root.
    pub fn discover(&self) -> Result<Vec<SourceFile>> {
        let mut files = Vec::new();

        if !self.root.exists() {
            return Ok(files);
        }

        for entry in WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().map(|e| e != "jsonl").unwrap_or(true) {
                continue;
            }
            if let Some(file) = source_file_for(path) {
                files.push(file);
            }
        }

        // Deterministic order so repeated runs process files identically.
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Find a single session's log file by its identifier.
    pub fn find_session(&self, session_id: &str) -> Result<Option<SourceFile>> {
        Ok(self
            .discover()?
            .into_iter()
            .find(|f| f.session_id == session_id))
    }
}

/// Build a [`SourceFile`] for an arbitrary path, without requiring it to live
/// under a source root.
pub fn source_file_for(path: &Path) -> Option<SourceFile> {
    let session_id = path.file_stem()?.to_str()?.to_string();
    let project_dir = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();
    Some(SourceFile {
        session_id,
        project_dir,
        path: path.to_path_buf(),
    })
}
