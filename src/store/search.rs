//! Search and ranking over the full-text index.
//!
//! Query text always goes through the FTS5 MATCH operator - an equality or
//! LIKE comparison against indexed content silently degrades to a full scan
//! and is not reachable from this API. User syntax (bare terms, quoted
//! phrases, OR/NOT, trailing-`*` prefixes) is compiled to an FTS5 match
//! expression with every term quoted, so stray punctuation can't be
//! misread as index syntax.

use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;

use crate::classify::Role;
use crate::error::{Error, Result};

use super::Store;

/// Metadata predicates applied alongside the match expression. These join
/// against message/session columns; they are never encoded into the
/// full-text query string.
#[derive(Debug, Default, Clone)]
pub struct SearchFilters {
    /// Substring match on the session's project name.
    pub project: Option<String>,
    pub role: Option<Role>,
    pub since: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub session_id: String,
    pub message_uuid: String,
    pub role: String,
    /// Normalized relevance in [0,1], higher is better.
    pub score: f64,
    pub timestamp: Option<String>,
    /// Excerpt around the match, with `[` `]` markers.
    pub snippet: String,
}

#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    /// True when results were cut at a record boundary to honor the
    /// output-size budget.
    pub truncated: bool,
}

impl Store {
    /// Ranked, snippeted, size-bounded full-text search.
    ///
    /// Ordering: normalized score descending, ties broken by timestamp
    /// descending. `budget_chars` caps the total rendered text; when it
    /// would be exceeded the result set is truncated at a whole-hit
    /// boundary and flagged.
    pub fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
        budget_chars: usize,
    ) -> Result<SearchResponse> {
        let match_expr = compile_match_query(query)?;

        let mut sql = String::from(
            "SELECT m.uuid, m.session_id, m.role, m.timestamp,
                    bm25(messages_fts) AS rank,
                    snippet(messages_fts, 0, '[', ']', ' … ', 12) AS excerpt
             FROM messages_fts
             JOIN messages m ON m.id = messages_fts.rowid
             JOIN sessions s ON s.id = m.session_id
             WHERE messages_fts MATCH ?",
        );
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(match_expr)];

        if let Some(project) = &filters.project {
            sql.push_str(" AND s.project_name LIKE '%' || ? || '%'");
            params.push(Box::new(project.clone()));
        }
        if let Some(role) = filters.role {
            sql.push_str(" AND m.role = ?");
            params.push(Box::new(role.as_str()));
        }
        if let Some(since) = filters.since {
            sql.push_str(" AND m.timestamp >= ?");
            params.push(Box::new(since.to_rfc3339()));
        }
        if let Some(before) = filters.before {
            sql.push_str(" AND m.timestamp < ?");
            params.push(Box::new(before.to_rfc3339()));
        }

        // bm25() is smaller-is-better; ascending rank is best-first.
        sql.push_str(" ORDER BY rank, m.timestamp DESC LIMIT ?");
        params.push(Box::new(limit as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
            |row| {
                let rank: f64 = row.get(4)?;
                Ok(SearchHit {
                    message_uuid: row.get(0)?,
                    session_id: row.get(1)?,
                    role: row.get(2)?,
                    timestamp: row.get(3)?,
                    score: normalize_score(rank),
                    snippet: row.get(5)?,
                })
            },
        )?;

        let mut hits = Vec::new();
        let mut rendered = 0usize;
        let mut truncated = false;
        for hit in rows {
            let hit = hit?;
            let cost = rendered_size(&hit);
            if rendered + cost > budget_chars && !hits.is_empty() {
                truncated = true;
                break;
            }
            rendered += cost;
            hits.push(hit);
        }

        Ok(SearchResponse { hits, truncated })
    }
}

/// Approximate rendered size of one hit, in characters.
fn rendered_size(hit: &SearchHit) -> usize {
    hit.snippet.chars().count()
        + hit.session_id.len()
        + hit.message_uuid.len()
        + hit.role.len()
        + hit.timestamp.as_deref().map(str::len).unwrap_or(0)
        + 32
}

/// Map a raw bm25 rank (unbounded, lower is better, typically negative) to
/// [0,1] higher-is-better. Monotone: a strictly better rank yields a
/// strictly higher score.
fn normalize_score(rank: f64) -> f64 {
    let raw = (-rank).max(0.0);
    raw / (1.0 + raw)
}

/// Compile user query syntax into an FTS5 match expression.
///
/// Bare terms AND together; `"quoted phrases"` match adjacently; uppercase
/// `OR` / `NOT` / `AND` pass through as operators; a trailing `*` requests
/// prefix matching. Everything else is quoted. An empty query is an error,
/// never "match everything".
pub fn compile_match_query(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidQuery("query text is empty".to_string()));
    }

    #[derive(PartialEq)]
    enum Tok {
        Term(String),
        Op(&'static str),
    }

    let mut tokens: Vec<Tok> = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut phrase = String::new();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                phrase.push(c);
            }
            // The phrase ended at the first quote, so it cannot contain one.
            if !phrase.trim().is_empty() {
                tokens.push(Tok::Term(format!("\"{phrase}\"")));
            }
            continue;
        }

        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            word.push(c);
            chars.next();
        }

        match word.as_str() {
            "OR" => tokens.push(Tok::Op("OR")),
            "AND" => tokens.push(Tok::Op("AND")),
            "NOT" => tokens.push(Tok::Op("NOT")),
            _ => {
                let (term, prefix) = match word.strip_suffix('*') {
                    Some(stem) => (stem, true),
                    None => (word.as_str(), false),
                };
                // Strip characters FTS5 would treat as syntax; what remains
                // is quoted verbatim.
                let cleaned: String = term.chars().filter(|c| *c != '"').collect();
                if cleaned.is_empty() {
                    continue;
                }
                let quoted = format!("\"{cleaned}\"");
                tokens.push(Tok::Term(if prefix {
                    format!("{quoted}*")
                } else {
                    quoted
                }));
            }
        }
    }

    if !tokens.iter().any(|t| matches!(t, Tok::Term(_))) {
        return Err(Error::InvalidQuery(
            "query contains no searchable terms".to_string(),
        ));
    }
    if matches!(tokens.first(), Some(Tok::Op(_))) || matches!(tokens.last(), Some(Tok::Op(_))) {
        return Err(Error::InvalidQuery(
            "query starts or ends with an operator".to_string(),
        ));
    }
    for pair in tokens.windows(2) {
        if matches!(pair, [Tok::Op(_), Tok::Op(_)]) {
            return Err(Error::InvalidQuery(
                "adjacent operators in query".to_string(),
            ));
        }
    }

    let parts: Vec<String> = tokens
        .into_iter()
        .map(|t| match t {
            Tok::Term(s) => s,
            Tok::Op(o) => o.to_string(),
        })
        .collect();
    Ok(parts.join(" "))
}
