//! Event classification for session log records.
//!
//! The log format is undocumented and evolves between host-tool versions, so
//! classification is a dispatch over the record's declared `type` field with
//! defensive field access throughout. Anything that doesn't match a known
//! shape degrades to [`Record::Unrecognized`] rather than failing - unknown
//! records are counted, never dropped silently.
//!
//! `classify` is a pure function: one decoded record in, zero or more
//! canonical records out. No I/O happens here.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Conversational role of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One canonical record produced from a single log line.
#[derive(Debug, Clone)]
pub enum Record {
    Message(MessageRecord),
    ToolUse(ToolUseRecord),
    ToolResult(ToolResultRecord),
    Summary(SummaryRecord),
    /// Known to exist, shape not understood. Carries the declared type (if
    /// any) so future classifier versions can special-case it.
    Unrecognized { kind: Option<String> },
}

/// A conversational turn.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub uuid: String,
    pub session_id: Option<String>,
    /// Weak lookup key into the same session's messages; threads are
    /// reconstructed by traversal with cycle detection, never trusted as an
    /// acyclic pointer chain.
    pub parent_uuid: Option<String>,
    pub role: Role,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
    /// Project working directory as recorded in the log content. Stored as
    /// provided, never parsed for correctness.
    pub cwd: Option<String>,
    /// Host-tool version marker carried by the record.
    pub version: Option<String>,
    /// Tool invocations nested in this turn, in content order.
    pub tool_use_ids: Vec<String>,
}

/// A tool invocation nested inside an assistant turn.
#[derive(Debug, Clone)]
pub struct ToolUseRecord {
    pub id: String,
    pub name: String,
    pub input: Value,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A later-arriving result for a previously seen tool invocation.
#[derive(Debug, Clone)]
pub struct ToolResultRecord {
    pub tool_use_id: String,
    pub is_error: bool,
    pub output: Option<String>,
}

/// A session summary line.
#[derive(Debug, Clone)]
pub struct SummaryRecord {
    pub text: String,
    pub leaf_uuid: Option<String>,
}

/// Map one decoded log record to zero or more canonical records.
pub fn classify(value: &Value) -> Vec<Record> {
    let kind = value.get("type").and_then(|v| v.as_str());

    match kind {
        Some("user") => classify_turn(value, Role::User),
        Some("assistant") => classify_turn(value, Role::Assistant),
        Some("summary") => classify_summary(value),
        other => vec![Record::Unrecognized {
            kind: other.map(String::from),
        }],
    }
}

fn classify_summary(value: &Value) -> Vec<Record> {
    match value.get("summary").and_then(|v| v.as_str()) {
        Some(text) if !text.is_empty() => vec![Record::Summary(SummaryRecord {
            text: text.to_string(),
            leaf_uuid: value
                .get("leafUuid")
                .and_then(|v| v.as_str())
                .map(String::from),
        })],
        _ => vec![Record::Unrecognized {
            kind: Some("summary".to_string()),
        }],
    }
}

fn classify_turn(value: &Value, role: Role) -> Vec<Record> {
    // A turn without an identifier cannot be stored idempotently.
    let uuid = match value.get("uuid").and_then(|v| v.as_str()) {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => {
            return vec![Record::Unrecognized {
                kind: Some(role.as_str().to_string()),
            }]
        }
    };

    let timestamp = value
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let content = value.get("message").and_then(|m| m.get("content"));

    let mut records = Vec::new();
    let mut text_parts: Vec<&str> = Vec::new();
    let mut tool_use_ids = Vec::new();

    match content {
        Some(Value::String(s)) => text_parts.push(s),
        Some(Value::Array(blocks)) => {
            for block in blocks {
                match block.get("type").and_then(|t| t.as_str()) {
                    Some("text") => {
                        if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
                            text_parts.push(t);
                        }
                    }
                    Some("tool_use") => {
                        let id = block.get("id").and_then(|v| v.as_str());
                        let name = block.get("name").and_then(|v| v.as_str());
                        if let (Some(id), Some(name)) = (id, name) {
                            tool_use_ids.push(id.to_string());
                            records.push(Record::ToolUse(ToolUseRecord {
                                id: id.to_string(),
                                name: name.to_string(),
                                input: block.get("input").cloned().unwrap_or(Value::Null),
                                timestamp,
                            }));
                        }
                    }
                    Some("tool_result") => {
                        if let Some(id) = block.get("tool_use_id").and_then(|v| v.as_str()) {
                            records.push(Record::ToolResult(ToolResultRecord {
                                tool_use_id: id.to_string(),
                                is_error: block
                                    .get("is_error")
                                    .and_then(|v| v.as_bool())
                                    .unwrap_or(false),
                                output: flatten_result_content(block.get("content")),
                            }));
                        }
                    }
                    // Thinking blocks are neither message text nor tool
                    // activity; they are skipped.
                    _ => {}
                }
            }
        }
        _ => {}
    }

    let text = text_parts.join("\n");

    // A pure tool-result turn carries no conversational text; it still
    // yields its ToolResult records, but not an empty message. A turn that
    // ISSUES tool uses keeps its message even without text: that message
    // anchors the tool rows and the parent/child thread.
    if !text.is_empty() || !tool_use_ids.is_empty() {
        records.insert(
            0,
            Record::Message(MessageRecord {
                uuid,
                session_id: value
                    .get("sessionId")
                    .and_then(|v| v.as_str())
                    .map(String::from),
                parent_uuid: value
                    .get("parentUuid")
                    .and_then(|v| v.as_str())
                    .map(String::from),
                role,
                text,
                timestamp,
                cwd: value.get("cwd").and_then(|v| v.as_str()).map(String::from),
                version: value
                    .get("version")
                    .and_then(|v| v.as_str())
                    .map(String::from),
                tool_use_ids,
            }),
        );
    }

    if records.is_empty() {
        // Known type, nothing usable inside it.
        return vec![Record::Unrecognized {
            kind: Some(role.as_str().to_string()),
        }];
    }

    records
}

/// Tool result content arrives either as a bare string or as an array of
/// text blocks; flatten both to a single string.
fn flatten_result_content(content: Option<&Value>) -> Option<String> {
    match content {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(blocks)) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("\n"))
            }
        }
        _ => None,
    }
}
