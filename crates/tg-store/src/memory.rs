//! In-memory store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::{CHANGE_CHANNEL_CAPACITY, ChangeSet, ConfigStore, StoreError, merge_entries, publish};

/// A store that lives only as long as the process.
#[derive(Debug)]
pub struct MemoryStore {
    values: Mutex<Map<String, Value>>,
    changes: broadcast::Sender<ChangeSet>,
    fail_writes: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_values(Map::new())
    }

    /// Creates a store pre-populated with `values`, without notifying.
    pub fn with_values(values: Map<String, Value>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Mutex::new(values),
            changes,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent write fail, as an unreachable backend would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Synchronous read of one key.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl ConfigStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys
            .iter()
            .filter_map(|key| values.get(*key).map(|v| ((*key).to_string(), v.clone())))
            .collect())
    }

    async fn get_all(&self) -> Result<Map<String, Value>, StoreError> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        let changes = {
            let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
            merge_entries(&mut values, entries)
        };
        publish(&self.changes, changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.changes.subscribe()
    }
}
