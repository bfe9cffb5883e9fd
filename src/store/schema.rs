//! SQLite schema definition.
//!
//! The full-text index is an external-content FTS5 table kept synchronized
//! with `messages` by insert/update/delete triggers, so the index can never
//! drift from the source-of-truth rows - there is no out-of-band batch job.

pub const SCHEMA: &str = r#"
-- ============================================
-- SESSIONS
-- ============================================

-- One continuous assistant conversation. The decoded project path comes from
-- log content (cwd); project_dir is the encoded directory name, stored
-- verbatim and never parsed.
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    project_dir TEXT NOT NULL,
    project_path TEXT,
    project_name TEXT,
    title TEXT,
    started_at DATETIME,
    ended_at DATETIME,
    message_count INTEGER NOT NULL DEFAULT 0,
    source_path TEXT NOT NULL
);

-- ============================================
-- MESSAGES
-- ============================================

-- One conversational turn. uuid is the log-provided identifier; inserts are
-- idempotent on it. parent_uuid is a weak lookup key, not a foreign key:
-- malformed input may reference missing or cyclic parents.
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    uuid TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL,                    -- 'user' | 'assistant'
    content TEXT NOT NULL,
    timestamp DATETIME,
    parent_uuid TEXT
);

-- ============================================
-- TOOL USES
-- ============================================

-- Referenced by the message that invoked it (weak reference, no cascade):
-- a tool row stays meaningful as historical data even if its message is
-- purged. seq preserves invocation order within the message.
CREATE TABLE IF NOT EXISTS tool_uses (
    id TEXT PRIMARY KEY,
    message_uuid TEXT,
    seq INTEGER NOT NULL DEFAULT 0,
    name TEXT NOT NULL,
    input TEXT,
    timestamp DATETIME,
    status TEXT NOT NULL DEFAULT 'pending', -- 'pending' | 'success' | 'error'
    result TEXT
);

-- ============================================
-- TOPICS & LINKS
-- ============================================

-- Extracted concepts, created opportunistically by best-effort entity
-- extraction. Absent for most sessions.
CREATE TABLE IF NOT EXISTS topics (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL DEFAULT 'topic'
);

-- Directed, weighted relationships between entities. Endpoints are weak
-- (id + type), deliberately not cascade-deleted, to preserve historical
-- relationship data. Duplicate (source, target, kind) rows are merged.
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY,
    source_type TEXT NOT NULL,
    source_id TEXT NOT NULL,
    target_type TEXT NOT NULL,
    target_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 0 CHECK (weight >= 0.0 AND weight <= 1.0),
    UNIQUE(source_type, source_id, target_type, target_id, kind)
);

-- ============================================
-- EXTRACTION STATE
-- ============================================

-- One row per source file. status transitions:
-- pending -> in_progress -> {complete, failed}. A fingerprint mismatch
-- against the live file invalidates 'complete' and forces full
-- re-extraction from line zero.
CREATE TABLE IF NOT EXISTS extraction_state (
    id INTEGER PRIMARY KEY,
    source_path TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL DEFAULT 'pending',
    started_at DATETIME,
    completed_at DATETIME,
    message_count INTEGER NOT NULL DEFAULT 0,
    file_size INTEGER,
    file_mtime_ms INTEGER,
    log_version TEXT
);

-- ============================================
-- FULL-TEXT INDEX
-- ============================================

CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
    content,
    content='messages',
    content_rowid='id',
    tokenize='unicode61'
);

CREATE TRIGGER IF NOT EXISTS messages_ai AFTER INSERT ON messages BEGIN
    INSERT INTO messages_fts(rowid, content) VALUES (new.id, new.content);
END;

CREATE TRIGGER IF NOT EXISTS messages_ad AFTER DELETE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, content) VALUES('delete', old.id, old.content);
END;

CREATE TRIGGER IF NOT EXISTS messages_au AFTER UPDATE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, content) VALUES('delete', old.id, old.content);
    INSERT INTO messages_fts(rowid, content) VALUES (new.id, new.content);
END;

-- ============================================
-- INDEXES
-- ============================================

CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_name);
CREATE INDEX IF NOT EXISTS idx_sessions_ended ON sessions(ended_at DESC);

CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);
CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_role ON messages(role);

CREATE INDEX IF NOT EXISTS idx_tool_uses_message ON tool_uses(message_uuid);
CREATE INDEX IF NOT EXISTS idx_tool_uses_name ON tool_uses(name);

CREATE INDEX IF NOT EXISTS idx_links_source ON links(source_type, source_id);
CREATE INDEX IF NOT EXISTS idx_links_target ON links(target_type, target_id);

CREATE INDEX IF NOT EXISTS idx_extraction_path ON extraction_state(source_path);
"#;
