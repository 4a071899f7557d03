//! Disk-backed aggregation store.
//!
//! One SQLite table (`key TEXT PRIMARY KEY, value TEXT`) over a named
//! temporary file, with accumulator state serialized as JSON text. SQLite's
//! default `BINARY` collation orders keys by bytes, matching Rust's `String`
//! ordering, so key iteration here agrees exactly with [`MemoryStore`].
//!
//! The store owns the temporary file: dropping the store (on success or
//! failure) deletes the backing storage.
//!
//! [`MemoryStore`]: super::MemoryStore

use rusqlite::{Connection, OptionalExtension, params};
use tempfile::NamedTempFile;

use crate::aggregate::AccumulatorState;
use crate::error::JoinResult;

use super::AggregationStore;

/// Aggregation store backed by a SQLite database in a scoped temporary file.
pub struct SqliteStore {
    conn: Connection,
    // The backing file lives exactly as long as the store.
    file: NamedTempFile,
}

impl SqliteStore {
    /// Create an empty store over a fresh temporary file.
    pub fn new() -> JoinResult<Self> {
        let file = NamedTempFile::new()?;
        let conn = Connection::open(file.path())?;
        conn.execute_batch("CREATE TABLE d (key TEXT PRIMARY KEY, value TEXT NOT NULL)")?;
        Ok(Self { conn, file })
    }

    /// Path of the backing database file (removed when the store is dropped).
    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }
}

impl AggregationStore for SqliteStore {
    fn get(&self, key: &str) -> JoinResult<Option<AccumulatorState>> {
        let text: Option<String> = self
            .conn
            .query_row("SELECT value FROM d WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        match text {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn set(&mut self, key: &str, state: &AccumulatorState) -> JoinResult<()> {
        let text = serde_json::to_string(state)?;
        self.conn.execute(
            "INSERT INTO d (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, text],
        )?;
        Ok(())
    }

    fn key_page(&self, after: Option<&str>, limit: usize) -> JoinResult<Vec<String>> {
        let limit = limit as i64;
        let mut keys = Vec::new();
        match after {
            Some(after) => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT key FROM d WHERE key > ?1 ORDER BY key ASC LIMIT ?2")?;
                let rows = stmt.query_map(params![after, limit], |row| row.get::<_, String>(0))?;
                for key in rows {
                    keys.push(key?);
                }
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT key FROM d ORDER BY key ASC LIMIT ?1")?;
                let rows = stmt.query_map(params![limit], |row| row.get::<_, String>(0))?;
                for key in rows {
                    keys.push(key?);
                }
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use crate::aggregate::{AccumulatorState, Accumulator};
    use crate::store::AggregationStore;
    use serde_json::json;

    fn state(values: &[(&str, Accumulator)]) -> AccumulatorState {
        values
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn round_trips_state_through_disk() {
        let mut store = SqliteStore::new().unwrap();
        let s = state(&[
            ("total", Accumulator::Scalar(json!(7))),
            ("mean", Accumulator::Avg { count: 3, sum: 7.0 }),
            ("tags", Accumulator::Set(vec![json!("a"), json!(null)])),
        ]);
        store.set("k", &s).unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), s);
        assert!(store.get("other").unwrap().is_none());
    }

    #[test]
    fn set_overwrites_existing_key() {
        let mut store = SqliteStore::new().unwrap();
        store.set("k", &state(&[("n", Accumulator::Count(1))])).unwrap();
        store.set("k", &state(&[("n", Accumulator::Count(2))])).unwrap();
        assert_eq!(
            store.get("k").unwrap().unwrap(),
            state(&[("n", Accumulator::Count(2))])
        );
        let keys: Vec<String> = store.keys().map(|k| k.unwrap()).collect();
        assert_eq!(keys, vec!["k"]);
    }

    #[test]
    fn keys_match_memory_store_ordering() {
        let mut store = SqliteStore::new().unwrap();
        for key in ["b", "a", "c:2", "c:10", ""] {
            store.set(key, &state(&[("n", Accumulator::Count(1))])).unwrap();
        }
        let keys: Vec<String> = store.keys().map(|k| k.unwrap()).collect();
        assert_eq!(keys, vec!["", "a", "b", "c:10", "c:2"]);
    }

    #[test]
    fn backing_file_is_removed_on_drop() {
        let store = SqliteStore::new().unwrap();
        let path = store.path().to_path_buf();
        assert!(path.exists());
        drop(store);
        assert!(!path.exists());
    }
}
