//! SQLite-backed store.
//!
//! # Schema
//!
//! One table, `settings`, with the key as primary key and the value as
//! JSON text. `updated_at` is ISO 8601 and only informational.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::{CHANGE_CHANNEL_CAPACITY, ChangeSet, ConfigStore, StoreError, merge_entries, publish};

/// Durable settings store.
///
/// The connection is guarded by a mutex; every operation is a short
/// synchronous transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<ChangeSet>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens a store at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// Opens an in-memory store.
    ///
    /// Useful for testing. The data is lost when the store is dropped.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Initializes the schema. Idempotent.
    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );
            ",
        )?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn read_all(conn: &Connection) -> Result<Map<String, Value>, StoreError> {
        let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut values = Map::new();
        for row in rows {
            let (key, raw) = row?;
            if let Some(value) = decode(&key, &raw) {
                values.insert(key, value);
            }
        }
        Ok(values)
    }

    fn read_one(conn: &Connection, key: &str) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.and_then(|raw| decode(key, &raw)))
    }

    fn write(&self, entries: Map<String, Value>) -> Result<ChangeSet, StoreError> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn.transaction()?;
        let mut current = Map::new();
        for key in entries.keys() {
            if let Some(value) = Self::read_one(&tx, key)? {
                current.insert(key.clone(), value);
            }
        }
        let changes = merge_entries(&mut current, entries);
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO settings (key, value, updated_at)
                VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                ",
            )?;
            for key in changes.keys() {
                let value = current.get(key).unwrap_or(&Value::Null);
                stmt.execute(params![key, value.to_string()])?;
            }
        }
        tx.commit()?;
        Ok(changes)
    }
}

/// Parses a stored value. Rows that are not valid JSON read as absent,
/// so callers fall back to their defaults and the next write replaces
/// them.
fn decode(key: &str, raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, %err, "ignoring malformed stored value");
            None
        }
    }
}

impl ConfigStore for SqliteStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = Map::new();
        for key in keys {
            if let Some(value) = Self::read_one(&conn, key)? {
                values.insert((*key).to_string(), value);
            }
        }
        Ok(values)
    }

    async fn get_all(&self) -> Result<Map<String, Value>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        Self::read_all(&conn)
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<(), StoreError> {
        let changes = self.write(entries)?;
        publish(&self.changes, changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.changes.subscribe()
    }
}
