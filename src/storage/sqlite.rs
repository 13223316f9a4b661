//! SQLite snapshots.
//!
//! ```sql
//! CREATE TABLE collections (
//!     name TEXT PRIMARY KEY,
//!     body TEXT NOT NULL,      -- JSON array, the whole collection
//!     updated_at TEXT NOT NULL
//! ) WITHOUT ROWID;
//! ```

use super::{SnapshotBackend, StoreError};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Shared connection holding every collection of one service instance.
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
    location: String,
}

impl SqliteDatabase {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let location = path.as_ref().display().to_string();
        let conn = Connection::open(path)?;
        Self::initialize(conn, location)
    }

    /// In-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?, ":memory:".to_string())
    }

    fn initialize(conn: Connection, location: String) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            ) WITHOUT ROWID;
            "#,
        )?;
        info!(location = %location, "Opened SQLite storage");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location,
        })
    }

    pub fn collection<T>(&self, name: &str) -> SqliteBackend<T> {
        SqliteBackend {
            db: self.clone(),
            name: name.to_string(),
            _records: PhantomData,
        }
    }
}

/// One named collection inside a [`SqliteDatabase`].
pub struct SqliteBackend<T> {
    db: SqliteDatabase,
    name: String,
    _records: PhantomData<fn() -> T>,
}

impl<T> SnapshotBackend<T> for SqliteBackend<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Vec<T>, StoreError> {
        let conn = self.db.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM collections WHERE name = ?1",
                params![self.name],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => serde_json::from_str(&body)
                .map_err(|e| StoreError::Corrupt(format!("{}/{}: {}", self.db.location, self.name, e))),
            None => Ok(Vec::new()),
        }
    }

    fn store(&self, records: &[T]) -> Result<(), StoreError> {
        let body = serde_json::to_string(records)?;
        let mut conn = self.db.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO collections (name, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![self.name, body, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}#{}", self.db.location, self.name)
    }
}
