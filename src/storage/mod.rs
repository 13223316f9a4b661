//! Snapshot Storage
//! Mission: Persist whole collections with atomic read-modify-persist semantics
//!
//! Every collection (accounts, items, tokens) is held in memory as a single
//! snapshot and written back in full on each mutation. A [`SnapshotStore`]
//! serializes mutations behind its write lock and only publishes a new snapshot
//! once the backend has accepted it, so readers never see a half-applied change
//! and a failed write leaves memory and disk as they were.

mod json_file;
mod sqlite;

pub use json_file::JsonFileBackend;
pub use sqlite::{SqliteBackend, SqliteDatabase};

use parking_lot::{Mutex, RwLock};
use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Where a collection's snapshot lives.
pub trait SnapshotBackend<T>: Send + Sync {
    /// Load the full collection. A collection that was never written is empty.
    fn load(&self) -> Result<Vec<T>, StoreError>;

    /// Replace the full collection.
    fn store(&self, records: &[T]) -> Result<(), StoreError>;

    /// Human readable location, for logs.
    fn describe(&self) -> String;
}

/// Volatile backend used by tests and throwaway instances.
pub struct MemoryBackend<T> {
    records: Mutex<Vec<T>>,
}

impl<T> MemoryBackend<T> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Default for MemoryBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> SnapshotBackend<T> for MemoryBackend<T> {
    fn load(&self) -> Result<Vec<T>, StoreError> {
        Ok(self.records.lock().clone())
    }

    fn store(&self, records: &[T]) -> Result<(), StoreError> {
        *self.records.lock() = records.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Pending changes to one collection, handed to [`SnapshotStore::transact`].
///
/// Reading through [`records`](Self::records) leaves the transaction clean; only
/// [`records_mut`](Self::records_mut) marks it for persistence.
pub struct Transaction<'a, T> {
    records: &'a mut Vec<T>,
    dirty: bool,
}

impl<T> Transaction<'_, T> {
    pub fn records(&self) -> &[T] {
        self.records
    }

    pub fn records_mut(&mut self) -> &mut Vec<T> {
        self.dirty = true;
        self.records
    }
}

/// In-memory snapshot of a collection backed by a [`SnapshotBackend`].
pub struct SnapshotStore<T> {
    name: &'static str,
    backend: Box<dyn SnapshotBackend<T>>,
    records: RwLock<Vec<T>>,
}

impl<T: Clone + Send + Sync> SnapshotStore<T> {
    /// Load the collection from its backend. Corrupt data fails the open.
    pub fn open(name: &'static str, backend: Box<dyn SnapshotBackend<T>>) -> Result<Self, StoreError> {
        let records = backend.load()?;
        info!(
            collection = name,
            records = records.len(),
            location = %backend.describe(),
            "Opened collection"
        );

        Ok(Self {
            name,
            backend,
            records: RwLock::new(records),
        })
    }

    /// Run `f` against a consistent snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        let records = self.records.read();
        f(&records)
    }

    /// Run a read-modify-persist cycle as one unit.
    ///
    /// `f` works on a copy of the collection. If it returns `Ok` and touched the
    /// records mutably, the copy is persisted and then published. Any error (from
    /// `f` or from the backend) discards the copy.
    pub fn transact<R, E>(
        &self,
        f: impl FnOnce(&mut Transaction<'_, T>) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut published = self.records.write();
        let mut working = published.clone();

        let mut txn = Transaction {
            records: &mut working,
            dirty: false,
        };
        let outcome = f(&mut txn)?;
        let dirty = txn.dirty;

        if dirty {
            self.backend.store(&working)?;
            debug!(
                collection = self.name,
                records = working.len(),
                "Persisted collection"
            );
            *published = working;
        }

        Ok(outcome)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Selects the backend family for every collection of one service instance.
#[derive(Clone)]
pub enum StorageProvider {
    /// One pretty-printed JSON file per collection inside a directory.
    JsonFiles(PathBuf),
    /// All collections inside one SQLite database.
    Sqlite(SqliteDatabase),
    /// Nothing survives the process.
    Memory,
}

impl StorageProvider {
    pub fn backend<T>(&self, collection: &str) -> Box<dyn SnapshotBackend<T>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        match self {
            StorageProvider::JsonFiles(dir) => {
                Box::new(JsonFileBackend::<T>::new(dir.join(format!("{collection}.json"))))
            }
            StorageProvider::Sqlite(db) => Box::new(db.collection::<T>(collection)),
            StorageProvider::Memory => Box::new(MemoryBackend::<T>::new()),
        }
    }
}

/// Storage errors
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Sqlite(rusqlite::Error),
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
            Self::Sqlite(e) => write!(f, "SQLite error: {}", e),
            Self::Corrupt(detail) => write!(f, "Corrupt snapshot: {}", detail),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialization(e) => Some(e),
            Self::Sqlite(e) => Some(e),
            Self::Corrupt(_) => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    struct RejectingBackend;

    impl SnapshotBackend<u32> for RejectingBackend {
        fn load(&self) -> Result<Vec<u32>, StoreError> {
            Ok(vec![1, 2])
        }

        fn store(&self, _records: &[u32]) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk unavailable",
            )))
        }

        fn describe(&self) -> String {
            "rejecting".to_string()
        }
    }

    fn memory_store() -> SnapshotStore<u32> {
        SnapshotStore::open("numbers", Box::new(MemoryBackend::<u32>::new())).unwrap()
    }

    #[test]
    fn test_transact_publishes_after_persist() {
        let store = memory_store();

        store
            .transact(|txn| {
                txn.records_mut().push(7);
                Ok::<_, StoreError>(())
            })
            .unwrap();

        assert_eq!(store.read(|r| r.to_vec()), vec![7]);
    }

    #[test]
    fn test_failed_persist_keeps_previous_snapshot() {
        let store = SnapshotStore::<u32>::open("numbers", Box::new(RejectingBackend)).unwrap();

        let result = store.transact(|txn| {
            txn.records_mut().clear();
            Ok::<_, StoreError>(())
        });

        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(store.read(|r| r.to_vec()), vec![1, 2]);
    }

    #[test]
    fn test_read_only_transaction_skips_persist() {
        // Any write against this backend fails, so a clean transaction must not write.
        let store = SnapshotStore::<u32>::open("numbers", Box::new(RejectingBackend)).unwrap();

        let total = store
            .transact(|txn| Ok::<_, StoreError>(txn.records().iter().sum::<u32>()))
            .unwrap();

        assert_eq!(total, 3);
    }

    #[test]
    fn test_closure_error_discards_changes() {
        let store = memory_store();

        let result: Result<(), StoreError> = store.transact(|txn| {
            txn.records_mut().push(1);
            Err(StoreError::Corrupt("abort".to_string()))
        });

        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_transactions_do_not_lose_updates() {
        let store = Arc::new(memory_store());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    for j in 0..25 {
                        store
                            .transact(|txn| {
                                txn.records_mut().push(i * 100 + j);
                                Ok::<_, StoreError>(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 200);
    }
}
