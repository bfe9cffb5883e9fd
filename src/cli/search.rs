//! Search command implementation

use chrono::{DateTime, NaiveDate, Utc};

use crate::classify::Role;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::SearchFilters;

#[allow(clippy::too_many_arguments)]
pub fn run(
    config: &Config,
    query: &str,
    project: Option<String>,
    role: Option<String>,
    since: Option<String>,
    before: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let store = super::open_store(config)?;

    let role = match role.as_deref() {
        Some(r) => Some(Role::parse(r).ok_or_else(|| {
            Error::InvalidQuery(format!("unknown role: {r} (expected user or assistant)"))
        })?),
        None => None,
    };
    let filters = SearchFilters {
        project,
        role,
        since: since.as_deref().map(parse_time).transpose()?,
        before: before.as_deref().map(parse_time).transpose()?,
    };

    let limit = limit.unwrap_or(config.search.default_limit);
    let response = store.search(query, &filters, limit, config.search.result_budget_chars)?;

    if response.hits.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    for hit in &response.hits {
        let timestamp = hit.timestamp.as_deref().unwrap_or("-");
        println!(
            "{:.3}  {:<10} {:<16} {}",
            hit.score,
            hit.role,
            short_id(&hit.session_id),
            timestamp
        );
        println!("       {}", hit.snippet);
    }
    if response.truncated {
        println!("(result list truncated by output budget)");
    }
    Ok(())
}

/// Session ids come from arbitrary file stems, so truncation must be
/// character-based.
fn short_id(id: &str) -> String {
    id.chars().take(16).collect()
}

/// Accept a full RFC 3339 timestamp or a bare date, taken as midnight UTC.
fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    Err(Error::InvalidQuery(format!(
        "unparseable time: {s} (expected RFC 3339 or YYYY-MM-DD)"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_rfc3339_and_bare_dates() {
        let full = parse_time("2026-02-10T08:30:00Z").unwrap();
        assert_eq!(full.hour(), 8);
        let bare = parse_time("2026-02-10").unwrap();
        assert_eq!(bare.hour(), 0);
    }

    #[test]
    fn short_id_truncates_on_character_boundaries() {
        assert_eq!(short_id("abcdef"), "abcdef");
        // Multibyte ids must not panic or split a character.
        let id = "й".repeat(20);
        assert_eq!(short_id(&id), "й".repeat(16));
    }

    #[test]
    fn rejects_garbage_times() {
        assert_eq!(
            parse_time("yesterday").unwrap_err().category(),
            "invalid_query"
        );
    }
}
