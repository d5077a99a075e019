//! Config snapshot storage: named configuration documents, one per object.
//!
//! The directory store keeps each snapshot in `<name>.yml`. Documents are
//! written as JSON, which every YAML reader accepts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use thiserror::Error;

/// Extension of snapshot files in the config sync directory.
pub const SNAPSHOT_EXTENSION: &str = "yml";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed snapshot {name}: {source}")]
    Malformed {
        name: String,
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A set of named configuration snapshots.
pub trait SnapshotStorage: Send + Sync {
    /// Names starting with `prefix`, sorted.
    fn list_all(&self, prefix: &str) -> Result<Vec<String>, SnapshotError>;
    fn exists(&self, name: &str) -> bool;
    fn read(&self, name: &str) -> Result<Option<Value>, SnapshotError>;
    fn write(&self, name: &str, data: &Value) -> Result<(), SnapshotError>;
    fn delete(&self, name: &str) -> Result<bool, SnapshotError>;
}

/// Path of the snapshot file for `name` inside `directory`.
pub fn snapshot_path(directory: &Path, name: &str) -> PathBuf {
    directory.join(format!("{name}.{SNAPSHOT_EXTENSION}"))
}

/// Snapshots stored as files in a directory (the config sync directory).
pub struct DirectoryStorage {
    directory: PathBuf,
}

impl DirectoryStorage {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }
}

impl SnapshotStorage for DirectoryStorage {
    fn list_all(&self, prefix: &str) -> Result<Vec<String>, SnapshotError> {
        if !self.directory.is_dir() {
            return Ok(Vec::new());
        }

        let suffix = format!(".{SNAPSHOT_EXTENSION}");
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(&suffix) {
                if name.starts_with(prefix) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn exists(&self, name: &str) -> bool {
        snapshot_path(&self.directory, name).is_file()
    }

    fn read(&self, name: &str) -> Result<Option<Value>, SnapshotError> {
        let path = snapshot_path(&self.directory, name);
        if !path.is_file() {
            return Ok(None);
        }
        let raw = std::fs::read(&path)?;
        let value = serde_json::from_slice(&raw).map_err(|source| SnapshotError::Malformed {
            name: name.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    fn write(&self, name: &str, data: &Value) -> Result<(), SnapshotError> {
        std::fs::create_dir_all(&self.directory)?;
        let raw = serde_json::to_vec_pretty(data)?;
        std::fs::write(snapshot_path(&self.directory, name), raw)?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, SnapshotError> {
        let path = snapshot_path(&self.directory, name);
        if !path.is_file() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }
}

/// In-memory snapshots, used for staging a transform before it is written out.
#[derive(Default)]
pub struct MemoryStorage {
    snapshots: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// All snapshots, sorted by name.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.read_guard()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // A panic elsewhere never leaves the map half-updated, so poisoning is ignored.
    fn read_guard(&self) -> RwLockReadGuard<'_, BTreeMap<String, Value>> {
        self.snapshots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Value>> {
        self.snapshots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SnapshotStorage for MemoryStorage {
    fn list_all(&self, prefix: &str) -> Result<Vec<String>, SnapshotError> {
        Ok(self
            .read_guard()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn exists(&self, name: &str) -> bool {
        self.read_guard().contains_key(name)
    }

    fn read(&self, name: &str) -> Result<Option<Value>, SnapshotError> {
        Ok(self.read_guard().get(name).cloned())
    }

    fn write(&self, name: &str, data: &Value) -> Result<(), SnapshotError> {
        self.write_guard().insert(name.to_string(), data.clone());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, SnapshotError> {
        Ok(self.write_guard().remove(name).is_some())
    }
}
