//! Relationship graph queries over the `links` table.
//!
//! Hop 1 is a direct link between the source entity and a session; hop 2 is
//! a session sharing a common link target with the source (two sessions both
//! linked to the same topic, for example) without being directly linked
//! itself. Links are stored directed but traversed in both directions.

use rusqlite::params;
use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};

use super::{MessageRow, Store};

/// One related session.
#[derive(Debug, Clone)]
pub struct RelatedHit {
    pub session_id: String,
    /// In [0,1]; hop-2 weights are the product of the two traversed links.
    pub weight: f64,
    pub hops: u8,
}

/// Entity kinds addressable by `related`.
const SOURCE_TYPES: &[&str] = &["session", "topic", "project", "message"];

impl Store {
    /// Sessions related to the given entity, hop 1 and hop 2 combined,
    /// deduplicated by session (lowest hop wins, then highest weight) and
    /// ordered by weight descending.
    ///
    /// An unknown entity is a `not_found` error; a known entity with no
    /// links (including the nothing-extracted-yet case) is an empty result.
    pub fn related(&self, source_type: &str, source_id: &str) -> Result<Vec<RelatedHit>> {
        if !SOURCE_TYPES.contains(&source_type) {
            return Err(Error::InvalidQuery(format!(
                "unknown entity type: {source_type}"
            )));
        }
        if !self.entity_exists(source_type, source_id)? {
            return Err(Error::NotFound {
                kind: match source_type {
                    "session" => "session",
                    "topic" => "topic",
                    "project" => "project",
                    _ => "message",
                },
                id: source_id.to_string(),
            });
        }

        let direct = self.neighbors(source_type, source_id)?;

        // session -> (weight, hops); direct links take precedence.
        let mut best: HashMap<String, (f64, u8)> = HashMap::new();
        let mut direct_sessions: HashSet<String> = HashSet::new();

        for (ntype, nid, weight) in &direct {
            if ntype == "session" && !(ntype == source_type && nid == source_id) {
                direct_sessions.insert(nid.clone());
                let entry = best.entry(nid.clone()).or_insert((*weight, 1));
                if *weight > entry.0 {
                    *entry = (*weight, 1);
                }
            }
        }

        for (ntype, nid, weight) in &direct {
            if ntype == source_type && nid == source_id {
                continue;
            }
            for (htype, hid, hweight) in self.neighbors(ntype, nid)? {
                if htype != "session" {
                    continue;
                }
                if htype == source_type && hid == source_id {
                    continue;
                }
                if direct_sessions.contains(&hid) {
                    continue;
                }
                let combined = (weight * hweight).clamp(0.0, 1.0);
                let entry = best.entry(hid).or_insert((combined, 2));
                if entry.1 == 2 && combined > entry.0 {
                    entry.0 = combined;
                }
            }
        }

        let mut hits: Vec<RelatedHit> = best
            .into_iter()
            .map(|(session_id, (weight, hops))| RelatedHit {
                session_id,
                weight,
                hops,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.hops.cmp(&b.hops))
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(hits)
    }

    /// Undirected neighborhood of one entity: every entity it shares a link
    /// row with, with the link weight.
    fn neighbors(&self, etype: &str, eid: &str) -> Result<Vec<(String, String, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT target_type, target_id, weight FROM links
             WHERE source_type = ? AND source_id = ?
             UNION ALL
             SELECT source_type, source_id, weight FROM links
             WHERE target_type = ? AND target_id = ?",
        )?;
        let rows = stmt.query_map(params![etype, eid, etype, eid], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn entity_exists(&self, etype: &str, eid: &str) -> Result<bool> {
        let (sql, keyed) = match etype {
            "session" => ("SELECT COUNT(*) FROM sessions WHERE id = ?", true),
            "topic" => ("SELECT COUNT(*) FROM topics WHERE id = ? OR name = ?", false),
            "project" => ("SELECT COUNT(*) FROM sessions WHERE project_name = ?", true),
            _ => ("SELECT COUNT(*) FROM messages WHERE uuid = ?", true),
        };
        let count: i64 = if keyed {
            self.conn.query_row(sql, params![eid], |row| row.get(0))?
        } else {
            self.conn
                .query_row(sql, params![eid, eid], |row| row.get(0))?
        };
        Ok(count > 0)
    }

    /// Messages of a session in thread order: parent chains first, children
    /// after parents. Parent references are weak keys from untrusted input,
    /// so traversal carries a visited set - cycles and dangling parents
    /// fall back to timestamp order instead of looping or vanishing.
    pub fn thread(&self, session_id: &str) -> Result<Vec<MessageRow>> {
        let rows = self.messages_for_session(session_id)?;
        if rows.is_empty() {
            return Ok(rows);
        }

        let by_uuid: HashMap<String, usize> = rows
            .iter()
            .enumerate()
            .map(|(i, m)| (m.uuid.clone(), i))
            .collect();

        // children[i] = indices replying to rows[i], in stored order.
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];
        let mut roots: Vec<usize> = Vec::new();
        for (i, msg) in rows.iter().enumerate() {
            match msg.parent_uuid.as_ref().and_then(|p| by_uuid.get(p)) {
                Some(&parent) if parent != i => children[parent].push(i),
                _ => roots.push(i),
            }
        }

        let mut visited = vec![false; rows.len()];
        let mut order: Vec<usize> = Vec::with_capacity(rows.len());
        for root in roots {
            let mut stack = vec![root];
            while let Some(i) = stack.pop() {
                if visited[i] {
                    continue;
                }
                visited[i] = true;
                order.push(i);
                for &child in children[i].iter().rev() {
                    stack.push(child);
                }
            }
        }
        // Cycle members are reachable from no root; emit them in stored
        // (timestamp) order rather than dropping them.
        for i in 0..rows.len() {
            if !visited[i] {
                order.push(i);
            }
        }

        let mut by_index: Vec<Option<MessageRow>> = rows.into_iter().map(Some).collect();
        Ok(order
            .into_iter()
            .filter_map(|i| by_index[i].take())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_sessions(ids: &[&str]) -> Store {
        let store = Store::open_in_memory().unwrap();
        for id in ids {
            store
                .raw()
                .execute(
                    "INSERT INTO sessions (id, project_dir, source_path) VALUES (?, 'p', '/tmp/x')",
                    params![id],
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn unknown_entity_type_is_invalid_query() {
        let store = store_with_sessions(&[]);
        assert_eq!(
            store.related("galaxy", "x").unwrap_err().category(),
            "invalid_query"
        );
    }

    #[test]
    fn missing_entity_distinguished_from_empty_link_table() {
        let store = store_with_sessions(&["a"]);
        // Entity exists, nothing extracted yet: empty result.
        assert!(store.related("session", "a").unwrap().is_empty());
        // No such entity: not_found.
        assert_eq!(
            store.related("session", "zzz").unwrap_err().category(),
            "not_found"
        );
    }

    #[test]
    fn direct_links_are_hop_one() {
        let store = store_with_sessions(&["a", "b"]);
        store
            .upsert_link(("session", "a"), ("session", "b"), "follows", 0.8)
            .unwrap();
        let hits = store.related("session", "a").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].session_id, "b");
        assert_eq!(hits[0].hops, 1);
        assert!((hits[0].weight - 0.8).abs() < 1e-9);

        // Reverse direction traverses too.
        let hits = store.related("session", "b").unwrap();
        assert_eq!(hits[0].session_id, "a");
    }

    #[test]
    fn shared_target_yields_hop_two_with_product_weight() {
        let store = store_with_sessions(&["a", "b", "c"]);
        store.ensure_topic("t-1", "authentication", "topic").unwrap();
        store
            .upsert_link(("session", "a"), ("session", "b"), "follows", 1.0)
            .unwrap();
        store
            .upsert_link(("session", "b"), ("session", "c"), "follows", 0.5)
            .unwrap();

        let hits = store.related("session", "a").unwrap();
        let b = hits.iter().find(|h| h.session_id == "b").unwrap();
        let c = hits.iter().find(|h| h.session_id == "c").unwrap();
        assert_eq!(b.hops, 1);
        assert_eq!(c.hops, 2);
        assert!((c.weight - 0.5).abs() < 1e-9);
    }

    #[test]
    fn dedupe_prefers_lowest_hop() {
        let store = store_with_sessions(&["a", "b"]);
        store.ensure_topic("t-1", "auth", "topic").unwrap();
        // b is directly linked AND shares topic t-1 with a.
        store
            .upsert_link(("session", "a"), ("session", "b"), "follows", 0.3)
            .unwrap();
        store
            .upsert_link(("session", "a"), ("topic", "t-1"), "mentions", 0.9)
            .unwrap();
        store
            .upsert_link(("session", "b"), ("topic", "t-1"), "mentions", 0.9)
            .unwrap();

        let hits = store.related("session", "a").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].hops, 1);
        assert!((hits[0].weight - 0.3).abs() < 1e-9);
    }

    #[test]
    fn related_from_topic_lists_its_sessions() {
        let store = store_with_sessions(&["a", "b"]);
        store.ensure_topic("t-1", "caching", "topic").unwrap();
        store
            .upsert_link(("session", "a"), ("topic", "t-1"), "mentions", 0.7)
            .unwrap();
        store
            .upsert_link(("session", "b"), ("topic", "t-1"), "mentions", 0.4)
            .unwrap();

        let hits = store.related("topic", "t-1").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].session_id, "a");
        assert_eq!(hits[1].session_id, "b");
    }

    #[test]
    fn ordering_is_weight_descending() {
        let store = store_with_sessions(&["a", "b", "c", "d"]);
        store
            .upsert_link(("session", "a"), ("session", "b"), "follows", 0.2)
            .unwrap();
        store
            .upsert_link(("session", "a"), ("session", "c"), "follows", 0.9)
            .unwrap();
        store
            .upsert_link(("session", "a"), ("session", "d"), "follows", 0.5)
            .unwrap();
        let ids: Vec<String> = store
            .related("session", "a")
            .unwrap()
            .into_iter()
            .map(|h| h.session_id)
            .collect();
        assert_eq!(ids, vec!["c", "d", "b"]);
    }

    fn insert_message(store: &Store, uuid: &str, parent: Option<&str>, ts: &str) {
        store
            .raw()
            .execute(
                "INSERT INTO messages (session_id, uuid, role, content, timestamp, parent_uuid)
                 VALUES ('a', ?, 'user', 'x', ?, ?)",
                params![uuid, ts, parent],
            )
            .unwrap();
    }

    #[test]
    fn thread_orders_children_after_parents() {
        let store = store_with_sessions(&["a"]);
        insert_message(&store, "m-2", Some("m-1"), "2026-02-10T08:31:00+00:00");
        insert_message(&store, "m-1", None, "2026-02-10T08:30:00+00:00");
        insert_message(&store, "m-3", Some("m-2"), "2026-02-10T08:32:00+00:00");

        let uuids: Vec<String> = store
            .thread("a")
            .unwrap()
            .into_iter()
            .map(|m| m.uuid)
            .collect();
        assert_eq!(uuids, vec!["m-1", "m-2", "m-3"]);
    }

    #[test]
    fn thread_survives_parent_cycles() {
        let store = store_with_sessions(&["a"]);
        // m-1 and m-2 reference each other; malformed but must not loop.
        insert_message(&store, "m-1", Some("m-2"), "2026-02-10T08:30:00+00:00");
        insert_message(&store, "m-2", Some("m-1"), "2026-02-10T08:31:00+00:00");
        insert_message(&store, "m-3", None, "2026-02-10T08:32:00+00:00");

        let uuids: Vec<String> = store
            .thread("a")
            .unwrap()
            .into_iter()
            .map(|m| m.uuid)
            .collect();
        assert_eq!(uuids.len(), 3);
        assert!(uuids.contains(&"m-1".to_string()));
        assert!(uuids.contains(&"m-2".to_string()));
    }

    #[test]
    fn thread_keeps_dangling_parent_messages() {
        let store = store_with_sessions(&["a"]);
        insert_message(&store, "m-1", Some("gone"), "2026-02-10T08:30:00+00:00");
        let rows = store.thread("a").unwrap();
        assert_eq!(rows.len(), 1);
    }
}
