//! Storage engine: durable schema, transaction discipline, checkpointing.
//!
//! One SQLite file holds all tables plus the FTS5 index; WAL sidecars live
//! next to it. Any number of concurrent readers are allowed; a single active
//! writer is enforced by SQLite's native locking with a bounded busy
//! timeout, so a blocked writer fails fast with a "locked" error instead of
//! hanging.

mod links;
mod schema;
mod search;

pub use links::RelatedHit;
pub use search::{SearchFilters, SearchHit, SearchResponse};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::source::Fingerprint;
use crate::sync::Extraction;

pub use schema::SCHEMA;

/// Extraction status of one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Pending => "pending",
            ExtractionStatus::InProgress => "in_progress",
            ExtractionStatus::Complete => "complete",
            ExtractionStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "in_progress" => ExtractionStatus::InProgress,
            "complete" => ExtractionStatus::Complete,
            "failed" => ExtractionStatus::Failed,
            _ => ExtractionStatus::Pending,
        }
    }
}

/// Stored extraction state for one source file.
#[derive(Debug, Clone)]
pub struct ExtractionState {
    pub status: ExtractionStatus,
    pub message_count: i64,
    pub fingerprint: Option<Fingerprint>,
    pub log_version: Option<String>,
}

pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the store, apply pragmas and schema, and run a fast
    /// structural check. The full integrity check is available separately
    /// via [`Store::integrity_check`]; it is too slow for every startup.
    pub fn open(path: &Path, busy_timeout_ms: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|e| Error::Open {
            path: path.to_path_buf(),
            source: e,
        })?;

        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.apply_pragmas(busy_timeout_ms)?;
        store.quick_check()?;
        store.conn.execute_batch(SCHEMA)?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        let store = Self { conn, path: None };
        store.conn.pragma_update(None, "foreign_keys", "ON")?;
        store.conn.execute_batch(SCHEMA)?;
        Ok(store)
    }

    fn apply_pragmas(&self, busy_timeout_ms: u64) -> Result<()> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.conn.pragma_update(None, "temp_store", "MEMORY")?;
        self.conn.pragma_update(None, "cache_size", -64000i64)?;
        self.conn
            .busy_timeout(std::time::Duration::from_millis(busy_timeout_ms))?;
        Ok(())
    }

    /// Fast structural check run on every open.
    fn quick_check(&self) -> Result<()> {
        let verdict: String = self
            .conn
            .query_row("PRAGMA quick_check(1)", [], |row| row.get(0))?;
        if verdict == "ok" {
            Ok(())
        } else {
            Err(Error::Corrupt { detail: verdict })
        }
    }

    /// Full integrity check, for diagnostics only.
    pub fn integrity_check(&self) -> Result<()> {
        let verdict: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if verdict == "ok" {
            Ok(())
        } else {
            Err(Error::Corrupt { detail: verdict })
        }
    }

    // ============================================
    // EXTRACTION STATE
    // ============================================

    pub fn extraction_state(&self, source_path: &str) -> Result<Option<ExtractionState>> {
        let row = self
            .conn
            .query_row(
                "SELECT status, message_count, file_size, file_mtime_ms, log_version
                 FROM extraction_state WHERE source_path = ?",
                params![source_path],
                |row| {
                    let status: String = row.get(0)?;
                    let size: Option<i64> = row.get(2)?;
                    let mtime_ms: Option<i64> = row.get(3)?;
                    Ok(ExtractionState {
                        status: ExtractionStatus::parse(&status),
                        message_count: row.get(1)?,
                        fingerprint: match (size, mtime_ms) {
                            (Some(size), Some(mtime_ms)) => Some(Fingerprint {
                                size: size as u64,
                                mtime_ms,
                            }),
                            _ => None,
                        },
                        log_version: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Commit the `in_progress` marker on its own, before the bulk write
    /// transaction. A crash during the bulk write rolls that transaction
    /// back but leaves this row as unambiguous evidence of incompleteness.
    pub fn mark_in_progress(&self, source_path: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO extraction_state (source_path, status, started_at)
             VALUES (?, 'in_progress', ?)
             ON CONFLICT(source_path) DO UPDATE SET
                 status = 'in_progress',
                 started_at = excluded.started_at,
                 completed_at = NULL",
            params![source_path, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn mark_failed(&self, source_path: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE extraction_state SET status = 'failed', completed_at = ?
             WHERE source_path = ?",
            params![Utc::now().to_rfc3339(), source_path],
        )?;
        Ok(())
    }

    // ============================================
    // EXTRACTION WRITES
    // ============================================

    /// Write everything extracted from one source file in a single
    /// transaction: session upsert, messages, tool uses and results, links,
    /// and the `complete` state row with the new fingerprint. Returns the
    /// number of newly inserted messages.
    ///
    /// Message and tool-use inserts are idempotent on their log-provided
    /// identifiers, so re-running the same extraction is a no-op.
    pub fn apply_extraction(&mut self, ext: &Extraction, fingerprint: Fingerprint) -> Result<u64> {
        let tx = self.conn.transaction()?;

        let project_name = ext.project_name();
        tx.execute(
            "INSERT INTO sessions
                 (id, project_dir, project_path, project_name, title,
                  started_at, ended_at, message_count, source_path)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
             ON CONFLICT(id) DO UPDATE SET
                 project_path = COALESCE(excluded.project_path, sessions.project_path),
                 project_name = COALESCE(excluded.project_name, sessions.project_name),
                 title = COALESCE(excluded.title, sessions.title),
                 started_at = COALESCE(sessions.started_at, excluded.started_at),
                 ended_at = COALESCE(excluded.ended_at, sessions.ended_at),
                 source_path = excluded.source_path",
            params![
                ext.session_id,
                ext.project_dir,
                ext.project_path,
                project_name,
                ext.title,
                ext.started_at.map(|t| t.to_rfc3339()),
                ext.ended_at.map(|t| t.to_rfc3339()),
                ext.source_path,
            ],
        )?;

        let mut inserted: u64 = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO messages
                     (session_id, uuid, role, content, timestamp, parent_uuid)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )?;
            for msg in &ext.messages {
                inserted += stmt.execute(params![
                    ext.session_id,
                    msg.uuid,
                    msg.role.as_str(),
                    msg.text,
                    msg.timestamp.map(|t| t.to_rfc3339()),
                    msg.parent_uuid,
                ])? as u64;
            }
        }

        // Map tool invocation ids back to the message that issued them, in
        // content order.
        let mut owners = std::collections::HashMap::new();
        for msg in &ext.messages {
            for (seq, tool_id) in msg.tool_use_ids.iter().enumerate() {
                owners.insert(tool_id.as_str(), (msg.uuid.as_str(), seq as i64));
            }
        }
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO tool_uses (id, message_uuid, seq, name, input, timestamp)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )?;
            for tool in &ext.tool_uses {
                let (message_uuid, seq) = owners
                    .get(tool.id.as_str())
                    .map(|(m, s)| (Some(*m), *s))
                    .unwrap_or((None, 0));
                stmt.execute(params![
                    tool.id,
                    message_uuid,
                    seq,
                    tool.name,
                    serde_json::to_string(&tool.input).ok(),
                    tool.timestamp.map(|t| t.to_rfc3339()),
                ])?;
            }
        }
        {
            let mut stmt = tx.prepare(
                "UPDATE tool_uses SET status = ?, result = COALESCE(?, result) WHERE id = ?",
            )?;
            for res in &ext.tool_results {
                let status = if res.is_error { "error" } else { "success" };
                stmt.execute(params![status, res.output, res.tool_use_id])?;
            }
        }

        // Relationship hints: parent/child threading and project membership.
        {
            let mut stmt = tx.prepare(
                "INSERT INTO links (source_type, source_id, target_type, target_id, kind, weight)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(source_type, source_id, target_type, target_id, kind)
                 DO UPDATE SET weight = MAX(links.weight, excluded.weight)",
            )?;
            for msg in &ext.messages {
                if let Some(parent) = &msg.parent_uuid {
                    stmt.execute(params![
                        "message",
                        msg.uuid,
                        "message",
                        parent,
                        "replies_to",
                        1.0f64,
                    ])?;
                }
            }
            if let Some(project) = &project_name {
                stmt.execute(params![
                    "session",
                    ext.session_id,
                    "project",
                    project,
                    "belongs_to",
                    1.0f64,
                ])?;
            }
        }

        // Derived message count reflects what is actually stored.
        let message_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM messages WHERE session_id = ?",
            params![ext.session_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "UPDATE sessions SET message_count = ? WHERE id = ?",
            params![message_count, ext.session_id],
        )?;

        // State goes to 'complete' in the same commit as the rows it
        // describes, with the fingerprint taken before parsing began.
        tx.execute(
            "INSERT INTO extraction_state
                 (source_path, status, completed_at, message_count,
                  file_size, file_mtime_ms, log_version)
             VALUES (?, 'complete', ?, ?, ?, ?, ?)
             ON CONFLICT(source_path) DO UPDATE SET
                 status = 'complete',
                 completed_at = excluded.completed_at,
                 message_count = excluded.message_count,
                 file_size = excluded.file_size,
                 file_mtime_ms = excluded.file_mtime_ms,
                 log_version = excluded.log_version",
            params![
                ext.source_path,
                Utc::now().to_rfc3339(),
                message_count,
                fingerprint.size as i64,
                fingerprint.mtime_ms,
                ext.log_version,
            ],
        )?;

        tx.commit()?;
        Ok(inserted)
    }

    // ============================================
    // TOPICS & LINKS
    // ============================================

    pub fn ensure_topic(&self, id: &str, name: &str, kind: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO topics (id, name, kind) VALUES (?, ?, ?)",
            params![id, name, kind],
        )?;
        Ok(())
    }

    /// Insert or merge a directed link. Duplicate (source, target, kind)
    /// rows keep the stronger weight.
    pub fn upsert_link(
        &self,
        source: (&str, &str),
        target: (&str, &str),
        kind: &str,
        weight: f64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO links (source_type, source_id, target_type, target_id, kind, weight)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(source_type, source_id, target_type, target_id, kind)
             DO UPDATE SET weight = MAX(links.weight, excluded.weight)",
            params![source.0, source.1, target.0, target.1, kind, weight.clamp(0.0, 1.0)],
        )?;
        Ok(())
    }

    // ============================================
    // MAINTENANCE
    // ============================================

    /// Statistics refresh after a bulk insert so the query planner has
    /// accurate cardinality estimates. Best-effort: skipped under
    /// contention with only a performance cost.
    pub fn refresh_statistics(&self) {
        if let Err(e) = self.conn.execute_batch(
            "INSERT INTO messages_fts(messages_fts) VALUES('optimize');
             PRAGMA optimize;",
        ) {
            warn!(error = %e, "statistics refresh skipped");
        }
    }

    /// Truncating WAL checkpoint, run after each bulk extraction batch to
    /// bound on-disk log growth. Best-effort.
    pub fn checkpoint_truncate(&self) {
        if let Err(e) =
            self.conn
                .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_row| Ok(()))
        {
            warn!(error = %e, "truncating checkpoint skipped");
        } else {
            debug!("wal checkpoint (truncate) complete");
        }
    }

    /// Lighter non-blocking checkpoint for between batches.
    pub fn checkpoint_passive(&self) {
        if let Err(e) = self
            .conn
            .query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_row| Ok(()))
        {
            debug!(error = %e, "passive checkpoint skipped");
        }
    }

    // ============================================
    // QUERIES
    // ============================================

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, project_dir, project_path, project_name, title,
                        started_at, ended_at, message_count, source_path
                 FROM sessions WHERE id = ?",
                params![session_id],
                map_session_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_sessions(&self, project: Option<&str>) -> Result<Vec<SessionRow>> {
        let base = "SELECT id, project_dir, project_path, project_name, title,
                           started_at, ended_at, message_count, source_path
                    FROM sessions";
        let order = " ORDER BY ended_at DESC, id";

        let rows = match project {
            Some(p) => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{base} WHERE project_name LIKE '%'||?||'%'{order}"))?;
                let rows = stmt.query_map(params![p], map_session_row)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(&format!("{base}{order}"))?;
                let rows = stmt.query_map([], map_session_row)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(rows)
    }

    pub fn messages_for_session(&self, session_id: &str) -> Result<Vec<MessageRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, uuid, role, content, timestamp, parent_uuid
             FROM messages WHERE session_id = ?
             ORDER BY COALESCE(timestamp, ''), id",
        )?;
        let rows = stmt.query_map(params![session_id], map_message_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let session_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        let message_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        let tool_use_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM tool_uses", [], |row| row.get(0))?;

        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(s.project_name, s.project_dir) AS project,
                    COUNT(*) AS sessions,
                    SUM(s.message_count) AS messages
             FROM sessions s
             GROUP BY project
             ORDER BY messages DESC",
        )?;
        let projects = stmt
            .query_map([], |row| {
                Ok(ProjectStats {
                    project: row.get(0)?,
                    session_count: row.get(1)?,
                    message_count: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(StoreStats {
            session_count,
            message_count,
            tool_use_count,
            storage_size_bytes: self.storage_size_bytes(),
            projects,
        })
    }

    /// On-disk footprint: the store file plus its WAL sidecars.
    fn storage_size_bytes(&self) -> u64 {
        let Some(path) = &self.path else { return 0 };
        let mut total = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        for suffix in ["-wal", "-shm"] {
            let mut sidecar = path.as_os_str().to_owned();
            sidecar.push(suffix);
            total += std::fs::metadata(PathBuf::from(sidecar))
                .map(|m| m.len())
                .unwrap_or(0);
        }
        total
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> &Connection {
        &self.conn
    }
}

fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        project_dir: row.get(1)?,
        project_path: row.get(2)?,
        project_name: row.get(3)?,
        title: row.get(4)?,
        started_at: row.get(5)?,
        ended_at: row.get(6)?,
        message_count: row.get(7)?,
        source_path: row.get(8)?,
    })
}

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        uuid: row.get(2)?,
        role: row.get(3)?,
        content: row.get(4)?,
        timestamp: row.get(5)?,
        parent_uuid: row.get(6)?,
    })
}

// ============================================
// ROW TYPES
// ============================================

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: String,
    pub project_dir: String,
    pub project_path: Option<String>,
    pub project_name: Option<String>,
    pub title: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub message_count: i64,
    pub source_path: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub session_id: String,
    pub uuid: String,
    pub role: String,
    pub content: String,
    pub timestamp: Option<String>,
    pub parent_uuid: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProjectStats {
    pub project: String,
    pub session_count: i64,
    pub message_count: i64,
}

#[derive(Debug, Clone)]
pub struct StoreStats {
    pub session_count: i64,
    pub message_count: i64,
    pub tool_use_count: i64,
    pub storage_size_bytes: u64,
    pub projects: Vec<ProjectStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{MessageRecord, Role, ToolResultRecord, ToolUseRecord};
    use chrono::TimeZone;

    fn msg(uuid: &str, role: Role, text: &str, parent: Option<&str>) -> MessageRecord {
        MessageRecord {
            uuid: uuid.to_string(),
            session_id: Some("s-1".to_string()),
            parent_uuid: parent.map(String::from),
            role,
            text: text.to_string(),
            timestamp: Some(chrono::Utc.with_ymd_and_hms(2026, 2, 10, 8, 30, 0).unwrap()),
            cwd: Some("/home/dev/webapp".to_string()),
            version: Some("1.0.24".to_string()),
            tool_use_ids: vec![],
        }
    }

    fn extraction(messages: Vec<MessageRecord>) -> Extraction {
        Extraction {
            session_id: "s-1".to_string(),
            project_dir: "-home-dev-webapp".to_string(),
            source_path: "/tmp/s-1.jsonl".to_string(),
            project_path: Some("/home/dev/webapp".to_string()),
            title: None,
            log_version: Some("1.0.24".to_string()),
            started_at: None,
            ended_at: None,
            messages,
            tool_uses: vec![],
            tool_results: vec![],
            malformed_lines: 0,
            unclassified: 0,
        }
    }

    fn fp() -> Fingerprint {
        Fingerprint {
            size: 100,
            mtime_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn apply_extraction_is_idempotent() {
        let mut store = Store::open_in_memory().unwrap();
        let ext = extraction(vec![
            msg("u-1", Role::User, "set up auth", None),
            msg("a-1", Role::Assistant, "I added OAuth 2.0 support", Some("u-1")),
        ]);

        let first = store.apply_extraction(&ext, fp()).unwrap();
        let second = store.apply_extraction(&ext, fp()).unwrap();
        assert_eq!(first, 2);
        assert_eq!(second, 0);

        let stats = store.stats().unwrap();
        assert_eq!(stats.session_count, 1);
        assert_eq!(stats.message_count, 2);

        // Links are merged, not duplicated.
        let link_count: i64 = store
            .raw()
            .query_row("SELECT COUNT(*) FROM links WHERE kind='replies_to'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(link_count, 1);
    }

    #[test]
    fn tool_results_resolve_status() {
        let mut store = Store::open_in_memory().unwrap();
        let mut m = msg("a-1", Role::Assistant, "running the build", None);
        m.tool_use_ids = vec!["t-1".to_string(), "t-2".to_string()];
        let mut ext = extraction(vec![m]);
        ext.tool_uses = vec![
            ToolUseRecord {
                id: "t-1".to_string(),
                name: "Bash".to_string(),
                input: serde_json::json!({"command": "cargo build"}),
                timestamp: None,
            },
            ToolUseRecord {
                id: "t-2".to_string(),
                name: "Read".to_string(),
                input: serde_json::json!({"file_path": "main.rs"}),
                timestamp: None,
            },
        ];
        ext.tool_results = vec![ToolResultRecord {
            tool_use_id: "t-1".to_string(),
            is_error: true,
            output: Some("compile error".to_string()),
        }];

        store.apply_extraction(&ext, fp()).unwrap();

        let (status, result): (String, Option<String>) = store
            .raw()
            .query_row(
                "SELECT status, result FROM tool_uses WHERE id='t-1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "error");
        assert_eq!(result.as_deref(), Some("compile error"));

        let pending: String = store
            .raw()
            .query_row("SELECT status FROM tool_uses WHERE id='t-2'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(pending, "pending");

        // Invocation order within the message is preserved.
        let seq: i64 = store
            .raw()
            .query_row("SELECT seq FROM tool_uses WHERE id='t-2'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(seq, 1);
    }

    #[test]
    fn tool_rows_reference_textless_issuing_message() {
        let mut store = Store::open_in_memory().unwrap();
        let mut m = msg("a-1", Role::Assistant, "", None);
        m.tool_use_ids = vec!["t-1".to_string()];
        let mut ext = extraction(vec![m]);
        ext.tool_uses = vec![ToolUseRecord {
            id: "t-1".to_string(),
            name: "Bash".to_string(),
            input: serde_json::json!({"command": "ls"}),
            timestamp: None,
        }];

        store.apply_extraction(&ext, fp()).unwrap();

        let owner: Option<String> = store
            .raw()
            .query_row(
                "SELECT message_uuid FROM tool_uses WHERE id='t-1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(owner.as_deref(), Some("a-1"));
    }

    #[test]
    fn state_machine_records_fingerprint_on_complete() {
        let mut store = Store::open_in_memory().unwrap();
        assert!(store.extraction_state("/tmp/s-1.jsonl").unwrap().is_none());

        store.mark_in_progress("/tmp/s-1.jsonl").unwrap();
        let state = store.extraction_state("/tmp/s-1.jsonl").unwrap().unwrap();
        assert_eq!(state.status, ExtractionStatus::InProgress);
        assert!(state.fingerprint.is_none());

        let ext = extraction(vec![msg("u-1", Role::User, "hello", None)]);
        store.apply_extraction(&ext, fp()).unwrap();
        let state = store.extraction_state("/tmp/s-1.jsonl").unwrap().unwrap();
        assert_eq!(state.status, ExtractionStatus::Complete);
        assert_eq!(state.fingerprint, Some(fp()));
        assert_eq!(state.message_count, 1);
        assert_eq!(state.log_version.as_deref(), Some("1.0.24"));
    }

    #[test]
    fn mark_failed_preserves_row() {
        let store = Store::open_in_memory().unwrap();
        store.mark_in_progress("/tmp/x.jsonl").unwrap();
        store.mark_failed("/tmp/x.jsonl").unwrap();
        let state = store.extraction_state("/tmp/x.jsonl").unwrap().unwrap();
        assert_eq!(state.status, ExtractionStatus::Failed);
    }

    #[test]
    fn fts_index_follows_insert_update_delete() {
        let mut store = Store::open_in_memory().unwrap();
        let ext = extraction(vec![msg("u-1", Role::User, "zanzibar deployment", None)]);
        store.apply_extraction(&ext, fp()).unwrap();

        let hits = |store: &Store, term: &str| -> i64 {
            store
                .raw()
                .query_row(
                    "SELECT COUNT(*) FROM messages_fts WHERE messages_fts MATCH ?",
                    params![term],
                    |r| r.get(0),
                )
                .unwrap()
        };

        // Insert is visible immediately.
        assert_eq!(hits(&store, "zanzibar"), 1);

        // Update re-indexes through the trigger.
        store
            .raw()
            .execute(
                "UPDATE messages SET content='quokka migration' WHERE uuid='u-1'",
                [],
            )
            .unwrap();
        assert_eq!(hits(&store, "zanzibar"), 0);
        assert_eq!(hits(&store, "quokka"), 1);

        // Delete removes the index entry, no stale rows.
        store
            .raw()
            .execute("DELETE FROM messages WHERE uuid='u-1'", [])
            .unwrap();
        assert_eq!(hits(&store, "quokka"), 0);
    }

    #[test]
    fn link_weights_merge_keeping_stronger() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_link(("session", "s-1"), ("topic", "t-1"), "mentions", 0.4)
            .unwrap();
        store
            .upsert_link(("session", "s-1"), ("topic", "t-1"), "mentions", 0.9)
            .unwrap();
        store
            .upsert_link(("session", "s-1"), ("topic", "t-1"), "mentions", 0.2)
            .unwrap();

        let (count, weight): (i64, f64) = store
            .raw()
            .query_row("SELECT COUNT(*), MAX(weight) FROM links", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(count, 1);
        assert!((weight - 0.9).abs() < 1e-9);
    }

    #[test]
    fn stats_break_down_per_project() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .apply_extraction(&extraction(vec![msg("u-1", Role::User, "one", None)]), fp())
            .unwrap();

        let mut other = extraction(vec![{
            let mut m = msg("u-9", Role::User, "two", None);
            m.session_id = Some("s-2".to_string());
            m
        }]);
        other.session_id = "s-2".to_string();
        other.project_path = Some("/home/dev/api".to_string());
        other.source_path = "/tmp/s-2.jsonl".to_string();
        store.apply_extraction(&other, fp()).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.session_count, 2);
        assert_eq!(stats.projects.len(), 2);
        let names: Vec<&str> = stats.projects.iter().map(|p| p.project.as_str()).collect();
        assert!(names.contains(&"webapp"));
        assert!(names.contains(&"api"));
    }
}
