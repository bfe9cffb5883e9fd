//! Best-effort topic indexing.
//!
//! After a session is extracted, its message text is mined for recurring
//! terms and each becomes a topic linked to the session with a weight
//! proportional to how often it appears. This feeds the relationship graph
//! only; failures here are logged and never fail a sync.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::warn;

use crate::store::Store;
use crate::sync::Extraction;

const MIN_TERM_LEN: usize = 4;
const MIN_FREQUENCY: u32 = 2;
const MAX_TOPICS_PER_SESSION: usize = 8;

/// Common words that carry no topical signal in conversation logs.
const STOPWORDS: &[&str] = &[
    "that", "this", "with", "from", "have", "will", "your", "what", "when",
    "then", "them", "they", "there", "here", "please", "would", "could",
    "should", "about", "into", "just", "like", "make", "made", "need",
    "want", "also", "been", "because", "where", "which", "while", "using",
    "some", "more", "only", "does", "done", "over", "other", "after",
    "before", "file", "files", "code", "line", "lines",
];

/// Index the extraction's topics into the store. Never fails: topic
/// extraction is derived data and an inconsistency here costs relevance,
/// not correctness.
pub fn index_session(store: &Store, ext: &Extraction) {
    for (name, weight) in top_terms(ext) {
        let id = topic_id(&name);
        let result = store
            .ensure_topic(&id, &name, "term")
            .and_then(|_| store.upsert_link(("session", &ext.session_id), ("topic", &id), "mentions", weight));
        if let Err(err) = result {
            warn!(session_id = %ext.session_id, topic = %name, error = %err, "topic indexing failed");
        }
    }
}

/// Stable identifier for a topic name.
pub fn topic_id(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    hex::encode(&digest[..8])
}

/// Recurring terms across the session's messages, weighted by frequency
/// relative to the most frequent term.
fn top_terms(ext: &Extraction) -> Vec<(String, f64)> {
    let mut freq: HashMap<String, u32> = HashMap::new();
    for msg in &ext.messages {
        for term in terms(&msg.text) {
            *freq.entry(term).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, u32)> = freq
        .into_iter()
        .filter(|(_, n)| *n >= MIN_FREQUENCY)
        .collect();
    let max = match ranked.iter().map(|(_, n)| *n).max() {
        Some(max) => max as f64,
        None => return Vec::new(),
    };
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(MAX_TOPICS_PER_SESSION);

    ranked
        .into_iter()
        .map(|(term, n)| (term, n as f64 / max))
        .collect()
}

fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| t.chars().count() >= MIN_TERM_LEN)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
}
