//! Conditional-request fingerprint store
//!
//! Keeps the fingerprint of the last representation written for each
//! resource path. The store is an injected handle over a concurrent map:
//! each `set` is a single atomic insert, so a concurrent `check` sees either
//! the old or the new fingerprint, never a partial one. Last write wins and
//! no history is kept. Nothing survives the process.
//!
//! ```rust
//! use resource_pipeline::etag::{ETagCheck, ETagStore};
//!
//! let store = ETagStore::new();
//! let etag = store.set("/entries/e_1", &serde_json::json!({"value": 1})).unwrap();
//!
//! assert_eq!(store.check("/entries/e_1", Some(&etag)), ETagCheck::Matches);
//! assert_eq!(store.check("/entries/e_2", Some(&etag)), ETagCheck::NoRecord);
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::error::Result;

/// Outcome of an `If-Match` check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ETagCheck {
    /// No fingerprint stored for the path, or no header given
    NoRecord,
    /// The header matches the stored fingerprint
    Matches,
    /// The header names a different fingerprint
    Stale,
}

/// Outcome of an `If-None-Match` check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCheck {
    /// The client copy is current; answer `304 Not Modified`
    NotModified,
    /// Send the full representation
    Modified,
}

/// Process-lifetime fingerprint store keyed by resource path
#[derive(Debug, Clone, Default)]
pub struct ETagStore {
    entries: Arc<DashMap<String, String>>,
}

impl ETagStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint a representation
    ///
    /// Quoted BLAKE3 hex digest of the JSON serialization. Equal content
    /// always yields the same fingerprint.
    pub fn fingerprint<T: Serialize + ?Sized>(representation: &T) -> Result<String> {
        let bytes = serde_json::to_vec(representation)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(&bytes);
        Ok(format!("\"{}\"", hasher.finalize().to_hex()))
    }

    /// Store the fingerprint of a representation, replacing any prior one
    pub fn set<T: Serialize + ?Sized>(&self, path: &str, representation: &T) -> Result<String> {
        let etag = Self::fingerprint(representation)?;
        self.entries.insert(path.to_string(), etag.clone());
        tracing::debug!(path, etag = %etag, "ETag stored");
        Ok(etag)
    }

    /// Stored fingerprint for a path
    pub fn get(&self, path: &str) -> Option<String> {
        self.entries.get(path).map(|entry| entry.value().clone())
    }

    /// Forget the fingerprint for a path, e.g. after a delete
    pub fn remove(&self, path: &str) -> Option<String> {
        self.entries.remove(path).map(|(_, etag)| etag)
    }

    /// Compare an `If-Match` header against the stored fingerprint
    ///
    /// Accepts `*`, comma-separated lists and weak validators. Weak
    /// validators never satisfy `If-Match`.
    pub fn check(&self, path: &str, if_match: Option<&str>) -> ETagCheck {
        let Some(header) = if_match.map(str::trim).filter(|h| !h.is_empty()) else {
            return ETagCheck::NoRecord;
        };
        let Some(current) = self.get(path) else {
            return ETagCheck::NoRecord;
        };

        let matched = header == "*"
            || validators(header).any(|(weak, tag)| !weak && tag == current);
        if matched {
            ETagCheck::Matches
        } else {
            tracing::debug!(path, "If-Match precondition is stale");
            ETagCheck::Stale
        }
    }

    /// Compare an `If-None-Match` header against the stored fingerprint
    ///
    /// Uses weak comparison, as conditional reads do.
    pub fn check_if_none_match(&self, path: &str, if_none_match: Option<&str>) -> ReadCheck {
        let Some(header) = if_none_match.map(str::trim).filter(|h| !h.is_empty()) else {
            return ReadCheck::Modified;
        };
        let Some(current) = self.get(path) else {
            return ReadCheck::Modified;
        };

        if header == "*" || validators(header).any(|(_, tag)| tag == current) {
            ReadCheck::NotModified
        } else {
            ReadCheck::Modified
        }
    }

    /// Number of stored fingerprints
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split a validator list into `(weak, tag)` pairs
fn validators(header: &str) -> impl Iterator<Item = (bool, &str)> {
    header
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| match v.strip_prefix("W/") {
            Some(tag) => (true, tag),
            None => (false, v),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_is_deterministic_and_quoted() {
        let a = ETagStore::fingerprint(&json!({"id": "e_1", "value": 3})).unwrap();
        let b = ETagStore::fingerprint(&json!({"id": "e_1", "value": 3})).unwrap();
        let c = ETagStore::fingerprint(&json!({"id": "e_1", "value": 4})).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with('"') && a.ends_with('"'));
        assert_eq!(a.len(), 66);
    }

    #[test]
    fn test_overwrite_invalidates_previous() {
        let store = ETagStore::new();
        let r1 = json!({"value": 1});
        let r2 = json!({"value": 2});
        let first = store.set("/entries/e_1", &r1).unwrap();
        assert_eq!(store.check("/entries/e_1", Some(&first)), ETagCheck::Matches);

        store.set("/entries/e_1", &r2).unwrap();
        let old = ETagStore::fingerprint(&r1).unwrap();
        assert_eq!(store.check("/entries/e_1", Some(&old)), ETagCheck::Stale);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_wildcard_lists_and_weak() {
        let store = ETagStore::new();
        let etag = store.set("/habits/h_1", &json!({"name": "Read"})).unwrap();

        assert_eq!(store.check("/habits/h_1", Some("*")), ETagCheck::Matches);
        let list = format!("\"other\", {}", etag);
        assert_eq!(store.check("/habits/h_1", Some(&list)), ETagCheck::Matches);
        let weak = format!("W/{}", etag);
        assert_eq!(store.check("/habits/h_1", Some(&weak)), ETagCheck::Stale);
        assert_eq!(store.check("/habits/h_1", None), ETagCheck::NoRecord);
    }

    #[test]
    fn test_if_none_match() {
        let store = ETagStore::new();
        assert_eq!(
            store.check_if_none_match("/habits/h_1", Some("*")),
            ReadCheck::Modified
        );
        let etag = store.set("/habits/h_1", &json!({"name": "Read"})).unwrap();
        let weak = format!("W/{}", etag);
        assert_eq!(
            store.check_if_none_match("/habits/h_1", Some(&weak)),
            ReadCheck::NotModified
        );
        assert_eq!(
            store.check_if_none_match("/habits/h_1", Some("\"nope\"")),
            ReadCheck::Modified
        );
    }

    #[test]
    fn test_remove() {
        let store = ETagStore::new();
        let etag = store.set("/entries/e_1", &json!(1)).unwrap();
        assert_eq!(store.remove("/entries/e_1"), Some(etag.clone()));
        assert_eq!(store.check("/entries/e_1", Some(&etag)), ETagCheck::NoRecord);
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sets_are_atomic() {
        let store = ETagStore::new();
        let candidates: Vec<String> = (0..8)
            .map(|i| ETagStore::fingerprint(&json!({ "value": i })).unwrap())
            .collect();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    store.set("/entries/shared", &json!({ "value": i })).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = store.get("/entries/shared").unwrap();
        assert!(candidates.contains(&stored));
        assert_eq!(store.check("/entries/shared", Some(&stored)), ETagCheck::Matches);
    }
}
