//! SQLite-backed preference store.
//!
//! One row per key: the declared type tag and the value's JSON form. The tag
//! is checked on read so a key whose declared type changed between releases
//! surfaces as a type mismatch instead of a silently reinterpreted value.

use crate::error::{StoreError, StoreResult};
use crate::store::{check_type, Listeners, PrefListener, PrefStore};
use prefsync_types::{PrefValue, TypedKey};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// Persistent preference store backed by SQLite.
pub struct SqlitePrefStore {
    conn: Mutex<Connection>,
    listeners: Listeners,
}

impl SqlitePrefStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        debug!("Opened preference store at {}", path.display());
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS prefs (
                name TEXT PRIMARY KEY,
                value_type TEXT NOT NULL,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            listeners: Listeners::new(),
        })
    }

    /// Names of all stored keys, sorted.
    pub fn names(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn.prepare("SELECT name FROM prefs ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

impl PrefStore for SqlitePrefStore {
    fn get(&self, key: &TypedKey) -> StoreResult<Option<PrefValue>> {
        let row: Option<(String, String)> = {
            let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
            conn.query_row(
                "SELECT value_type, value FROM prefs WHERE name = ?1",
                params![key.name()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };

        let Some((tag, raw)) = row else {
            return Ok(None);
        };
        if tag != key.value_type().tag() {
            return Err(StoreError::TypeMismatch {
                key: key.name().to_string(),
                expected: key.value_type().to_string(),
                found: tag,
            });
        }
        let json: serde_json::Value = serde_json::from_str(&raw)?;
        let value = PrefValue::from_json(key.value_type(), json).map_err(|e| {
            StoreError::InvalidData(format!("stored value for {} is corrupt: {e}", key.name()))
        })?;
        Ok(Some(value))
    }

    fn put(&self, key: &TypedKey, value: PrefValue) -> StoreResult<()> {
        check_type(key, &value)?;
        let raw = serde_json::to_string(&value.to_json())?;
        {
            let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
            conn.execute(
                "INSERT OR REPLACE INTO prefs (name, value_type, value) VALUES (?1, ?2, ?3)",
                params![key.name(), key.value_type().tag(), raw],
            )?;
        }
        trace!("put {} = {}", key.name(), raw);
        self.listeners.notify_put(key, &value);
        Ok(())
    }

    fn remove(&self, key: &TypedKey) -> StoreResult<()> {
        {
            let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
            conn.execute("DELETE FROM prefs WHERE name = ?1", params![key.name()])?;
        }
        self.listeners.notify_remove(key);
        Ok(())
    }

    fn add_listener(&self, listener: Arc<dyn PrefListener>) {
        self.listeners.add(listener);
    }
}
