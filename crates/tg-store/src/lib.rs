//! Persisted key/value store for governor settings and state.
//!
//! Values are JSON. Every successful [`ConfigStore::set`] that changes at
//! least one value publishes exactly one [`ChangeSet`] holding all changed
//! keys, so subscribers can apply related keys together.
//!
//! Two implementations are provided:
//! - [`MemoryStore`]: process-local, for tests and virtual-time replays
//! - [`SqliteStore`]: durable, one row per key

mod memory;
mod sqlite;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Capacity of the change notification channel.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The store refused the write.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Old and new value of one changed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// All keys changed by one write, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: BTreeMap<String, Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, change: Change) {
        self.changes.insert(key.into(), change);
    }

    pub fn get(&self, key: &str) -> Option<&Change> {
        self.changes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.changes.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    /// The new value of every changed key; removed keys map to null.
    pub fn new_values(&self) -> Map<String, Value> {
        self.changes
            .iter()
            .map(|(key, change)| {
                (
                    key.clone(),
                    change.new_value.clone().unwrap_or(Value::Null),
                )
            })
            .collect()
    }
}

/// Read/write/subscribe access to persisted key/value settings.
pub trait ConfigStore: Send + Sync {
    /// Reads the given keys. Missing keys are absent from the result.
    fn get(
        &self,
        keys: &[&str],
    ) -> impl Future<Output = Result<Map<String, Value>, StoreError>> + Send;

    /// Reads every stored key.
    fn get_all(&self) -> impl Future<Output = Result<Map<String, Value>, StoreError>> + Send;

    /// Writes all entries atomically and notifies subscribers of the keys
    /// whose value changed.
    fn set(&self, entries: Map<String, Value>) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Subscribes to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<ChangeSet>;
}

impl<T: ConfigStore> ConfigStore for Arc<T> {
    fn get(
        &self,
        keys: &[&str],
    ) -> impl Future<Output = Result<Map<String, Value>, StoreError>> + Send {
        (**self).get(keys)
    }

    fn get_all(&self) -> impl Future<Output = Result<Map<String, Value>, StoreError>> + Send {
        (**self).get_all()
    }

    fn set(&self, entries: Map<String, Value>) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).set(entries)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        (**self).subscribe()
    }
}

/// Computes the change set for writing `entries` over `current`, and
/// applies it to `current`.
pub(crate) fn merge_entries(
    current: &mut Map<String, Value>,
    entries: Map<String, Value>,
) -> ChangeSet {
    let mut changes = ChangeSet::new();
    for (key, value) in entries {
        let old_value = current.get(&key).cloned();
        if old_value.as_ref() == Some(&value) {
            continue;
        }
        current.insert(key.clone(), value.clone());
        changes.insert(
            key,
            Change {
                old_value,
                new_value: Some(value),
            },
        );
    }
    changes
}

/// Publishes a change set if it holds anything.
pub(crate) fn publish(sender: &broadcast::Sender<ChangeSet>, changes: ChangeSet) {
    if changes.is_empty() {
        return;
    }
    tracing::debug!(keys = ?changes.keys().collect::<Vec<_>>(), "settings changed");
    // No subscribers is fine.
    let _ = sender.send(changes);
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn merge_skips_unchanged_values() {
        let mut current = Map::new();
        current.insert("a".into(), json!(1));

        let mut entries = Map::new();
        entries.insert("a".into(), json!(1));
        entries.insert("b".into(), json!(true));
        let changes = merge_entries(&mut current, entries);

        assert_eq!(changes.len(), 1);
        assert!(changes.contains("b"));
        assert_eq!(changes.get("b").unwrap().old_value, None);
        assert_eq!(current["b"], json!(true));
    }

    #[test]
    fn new_values_maps_removed_keys_to_null() {
        let mut changes = ChangeSet::new();
        changes.insert(
            "gone",
            Change {
                old_value: Some(json!(3)),
                new_value: None,
            },
        );
        assert_eq!(changes.new_values()["gone"], Value::Null);
    }
}
