//! JSON file snapshots.

use super::{SnapshotBackend, StoreError};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// One collection stored as a pretty-printed JSON array.
///
/// Writes go to a sibling `.tmp` file which is flushed, synced and renamed over
/// the target, so the file on disk is always either the old or the new snapshot.
pub struct JsonFileBackend<T> {
    path: PathBuf,
    _records: PhantomData<fn() -> T>,
}

impl<T> JsonFileBackend<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make the rename itself durable.
    #[cfg(unix)]
    fn sync_parent(&self) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        File::open(parent)?.sync_all()?;
        Ok(())
    }

    // Directories cannot be opened as files here
    #[cfg(not(unix))]
    fn sync_parent(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<T> SnapshotBackend<T> for JsonFileBackend<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Vec<T>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", self.path.display(), e)))
    }

    fn store(&self, records: &[T]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.temp_path();
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&temp_path, &self.path)?;
        self.sync_parent()?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u32,
        label: String,
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::<Row>::new(dir.path().join("rows.json"));

        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("rows.json");
        let rows = vec![
            Row { id: 1, label: "one".to_string() },
            Row { id: 2, label: "two".to_string() },
        ];

        JsonFileBackend::<Row>::new(&path).store(&rows).unwrap();

        let reopened = JsonFileBackend::<Row>::new(&path);
        assert_eq!(reopened.load().unwrap(), rows);
        // The temp file is renamed away, never left behind
        assert!(!path.with_file_name("rows.json.tmp").exists());
    }

    #[test]
    fn test_store_replaces_existing_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.json");
        let backend = JsonFileBackend::<Row>::new(&path);

        backend
            .store(&[Row { id: 1, label: "old".to_string() }])
            .unwrap();
        backend
            .store(&[Row { id: 2, label: "new".to_string() }])
            .unwrap();

        assert_eq!(
            backend.load().unwrap(),
            vec![Row { id: 2, label: "new".to_string() }]
        );
        assert!(!path.with_file_name("rows.json.tmp").exists());
    }

    #[test]
    fn test_relative_path_in_working_directory() {
        let backend = JsonFileBackend::<Row>::new("rows.json");
        assert!(backend.sync_parent().is_ok());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.json");
        fs::write(&path, "[{\"id\": 1,").unwrap();

        let result = JsonFileBackend::<Row>::new(&path).load();
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }
}
