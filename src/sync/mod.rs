//! Keeps the three copies of a tracked file in step: the public file, the
//! config-tracked copy under the sync directory, and the compressed cache fallback.

mod observer;

pub use observer::{ObserverRegistry, TrackedFileObserver};

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::cache::codec::{self, CodecError};
use crate::cache::{CacheBackend, CacheError};
use crate::filesystem::{self, FileSystem, FileSystemError};
use crate::snapshot::{DirectoryStorage, SnapshotStorage};
use crate::storage::models::{ConfigFileRecord, FileStatus, ManagedFile};
use crate::storage::{Database, DatabaseError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Cannot read {uri}: {source}")]
    SourceUnreadable {
        uri: String,
        source: FileSystemError,
    },
    #[error("Cannot copy to {uri}: {source}")]
    CopyFailed {
        uri: String,
        source: FileSystemError,
    },
    #[error("No cached copy of {0}")]
    CacheMiss(String),
    #[error("No file is associated with {0}")]
    NoAssociatedFile(String),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Whether a save or delete runs as part of a configuration import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Normal,
    Importing,
}

/// Result of [`SyncEngine::to_file`].
#[derive(Debug, Clone)]
pub enum ToFile {
    /// A public file was already associated; it was validated, not replaced.
    AlreadyExisted,
    /// A public file was created from the config-tracked copy.
    Created(ManagedFile),
}

/// Records and files already visited by one delete cascade.
#[derive(Debug, Default)]
struct DeletionGuard {
    records: HashSet<String>,
    files: HashSet<String>,
}

impl DeletionGuard {
    fn enter_record(&mut self, id: &str) -> bool {
        self.records.insert(id.to_string())
    }

    fn enter_file(&mut self, id: &str) -> bool {
        self.files.insert(id.to_string())
    }
}

pub struct SyncEngine {
    db: Database,
    fs: Arc<dyn FileSystem>,
    cache: Arc<dyn CacheBackend>,
    observers: ObserverRegistry,
    snapshots: DirectoryStorage,
}

impl SyncEngine {
    pub fn new(
        db: Database,
        fs: Arc<dyn FileSystem>,
        cache: Arc<dyn CacheBackend>,
        observers: ObserverRegistry,
        config_sync_directory: PathBuf,
    ) -> Self {
        Self {
            db,
            fs,
            cache,
            observers,
            snapshots: DirectoryStorage::new(config_sync_directory),
        }
    }

    /// The managed file living at the record's public uri, if any.
    pub fn file_for(&self, record: &ConfigFileRecord) -> Result<Option<ManagedFile>, SyncError> {
        Ok(self.db.get_managed_file_by_uri(&record.uri)?)
    }

    /// Whether a config snapshot of this record exists in the sync directory.
    pub fn has_config(&self, record: &ConfigFileRecord) -> bool {
        self.snapshots.exists(&record.config_name())
    }

    /// Make sure the bytes of `file` exist, restoring them from the cache fallback
    /// when they are gone. Returns whether the bytes are present afterwards.
    pub fn validate_file(&self, record: &ConfigFileRecord, file: &ManagedFile) -> bool {
        if self.fs.exists(&file.uri) {
            return true;
        }

        let Some(data) = self.get_cache(record) else {
            tracing::warn!(id = %record.id, uri = %file.uri, "File is missing and has no cached copy");
            return false;
        };

        let restored = self
            .fs
            .prepare_directory(&filesystem::dirname(&file.uri))
            .and_then(|_| self.fs.write(&file.uri, &data));
        match restored {
            Ok(()) => {
                tracing::info!(id = %record.id, uri = %file.uri, "Restored missing file from cache");
                true
            }
            Err(e) => {
                tracing::warn!(id = %record.id, uri = %file.uri, error = %e, "Failed to restore file from cache");
                false
            }
        }
    }

    /// Promote the config-tracked copy to a public file.
    ///
    /// An already associated public file is only validated, never overwritten.
    pub fn to_file(&self, record: &ConfigFileRecord) -> Result<ToFile, SyncError> {
        if let Some(file) = self.file_for(record)? {
            self.validate_file(record, &file);
            return Ok(ToFile::AlreadyExisted);
        }

        let source = record.config_uri();
        let destination = record.uri.clone();
        if !self.fs.exists(&source) {
            return Err(SyncError::SourceUnreadable {
                uri: source,
                source: FileSystemError::NotFound(record.config_uri()),
            });
        }

        self.fs
            .prepare_directory(&filesystem::dirname(&destination))
            .map_err(|e| SyncError::CopyFailed {
                uri: destination.clone(),
                source: e,
            })?;
        let uri = self
            .fs
            .copy(&source, &destination)
            .map_err(|e| copy_error(&source, &destination, e))?;

        let byte_size = self.fs.size(&uri).map_err(|e| SyncError::SourceUnreadable {
            uri: uri.clone(),
            source: e,
        })?;
        let now = Utc::now();
        let file = ManagedFile {
            id: uuid::Uuid::new_v4().to_string(),
            mime_type: guess_mime(&record.filename),
            uri,
            filename: record.filename.clone(),
            byte_size,
            owner_id: record.owner_id.clone(),
            status: FileStatus::Permanent,
            created_at: now,
            changed_at: now,
        };
        self.db.put_managed_file(&file)?;

        tracing::debug!(id = %record.id, file_id = %file.id, "Created public file from config");
        Ok(ToFile::Created(file))
    }

    /// Copy the public file into the config sync directory. Returns the config uri.
    pub fn to_config(&self, record: &ConfigFileRecord) -> Result<String, SyncError> {
        let file = self
            .file_for(record)?
            .ok_or_else(|| SyncError::NoAssociatedFile(record.id.clone()))?;
        self.validate_file(record, &file);

        let destination = record.config_uri();
        self.fs
            .prepare_directory(&filesystem::dirname(&destination))
            .map_err(|e| SyncError::CopyFailed {
                uri: destination.clone(),
                source: e,
            })?;
        let uri = self
            .fs
            .copy(&file.uri, &destination)
            .map_err(|e| copy_error(&file.uri, &destination, e))?;

        // The config copy supersedes the cache fallback.
        if let Err(e) = self.remove_cache(record) {
            tracing::warn!(id = %record.id, error = %e, "Failed to remove cached copy");
        }
        if !file.is_permanent() {
            self.db
                .set_managed_file_status(&file.id, FileStatus::Permanent)?;
        }

        tracing::debug!(id = %record.id, uri = %uri, "Copied file to config");
        Ok(uri)
    }

    /// Store a compressed copy of the public file in the cache bin.
    pub fn to_cache(&self, record: &ConfigFileRecord) -> Result<(), SyncError> {
        let file = self
            .file_for(record)?
            .ok_or_else(|| SyncError::NoAssociatedFile(record.id.clone()))?;

        let data = self
            .fs
            .read(&file.uri)
            .map_err(|e| SyncError::SourceUnreadable {
                uri: file.uri.clone(),
                source: e,
            })?;
        let token = codec::encode(&data)?;
        self.cache.set(&record.id, token)?;

        tracing::debug!(id = %record.id, bytes = data.len(), "Cached file");
        Ok(())
    }

    /// Raw bytes of the cached copy. Missing and undecodable entries are both a miss.
    pub fn get_cache(&self, record: &ConfigFileRecord) -> Option<Vec<u8>> {
        match self.cached_bytes(record) {
            Ok(data) => Some(data),
            Err(SyncError::CacheMiss(_)) => None,
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "Unusable cache entry");
                None
            }
        }
    }

    fn cached_bytes(&self, record: &ConfigFileRecord) -> Result<Vec<u8>, SyncError> {
        let entry = self
            .cache
            .get(&record.id)?
            .ok_or_else(|| SyncError::CacheMiss(record.id.clone()))?;
        Ok(codec::decode(&entry.data)?)
    }

    /// Drop the cached copy. Requires an associated public file.
    pub fn remove_cache(&self, record: &ConfigFileRecord) -> Result<(), SyncError> {
        if self.file_for(record)?.is_none() {
            return Err(SyncError::NoAssociatedFile(record.id.clone()));
        }
        self.cache.delete(&record.id)?;
        Ok(())
    }

    /// Bytes of the public file, restored from the cache first if they went missing.
    pub fn read_file(&self, record: &ConfigFileRecord) -> Result<(ManagedFile, Vec<u8>), SyncError> {
        let file = self
            .file_for(record)?
            .ok_or_else(|| SyncError::NoAssociatedFile(record.id.clone()))?;
        self.validate_file(record, &file);

        let data = self
            .fs
            .read(&file.uri)
            .map_err(|e| SyncError::SourceUnreadable {
                uri: file.uri.clone(),
                source: e,
            })?;
        Ok((file, data))
    }

    /// Run the save lifecycle and persist the record.
    ///
    /// Transfer failures are logged; only persistence failures are returned.
    pub fn save(&self, record: &mut ConfigFileRecord, mode: SyncMode) -> Result<(), SyncError> {
        if self.file_for(record)?.is_none() {
            if let Err(e) = self.to_file(record) {
                tracing::warn!(id = %record.id, error = %e, "Failed to create public file from config");
            }
        } else if mode == SyncMode::Normal {
            if let Err(e) = self.to_cache(record) {
                tracing::warn!(id = %record.id, error = %e, "Failed to refresh cached copy");
            }
        }

        self.observers.notify_updated(record);

        if let Some(file) = self.file_for(record)? {
            record.changed = Some(file.changed_at.timestamp());
        }

        self.db.put_config_file(record)?;
        tracing::debug!(id = %record.id, ?mode, "Saved config file");
        Ok(())
    }

    /// Run the delete lifecycle for a batch of records and remove them.
    pub fn delete(&self, records: &[ConfigFileRecord], mode: SyncMode) -> Result<(), SyncError> {
        let mut guard = DeletionGuard::default();
        self.delete_records(records, mode, &mut guard)
    }

    /// Delete a managed file and, through the reverse reference, the record tracking it.
    pub fn delete_file(&self, file_id: &str, mode: SyncMode) -> Result<bool, SyncError> {
        let Some(file) = self.db.get_managed_file(file_id)? else {
            return Ok(false);
        };
        let mut guard = DeletionGuard::default();
        guard.enter_file(&file.id);
        self.delete_file_entity(&file, mode, &mut guard)?;
        Ok(true)
    }

    fn delete_records(
        &self,
        records: &[ConfigFileRecord],
        mode: SyncMode,
        guard: &mut DeletionGuard,
    ) -> Result<(), SyncError> {
        for record in records {
            if !guard.enter_record(&record.id) {
                continue;
            }

            if mode == SyncMode::Importing || !self.has_config(record) {
                if let Err(e) = self.fs.delete(&record.config_uri()) {
                    tracing::warn!(id = %record.id, error = %e, "Failed to delete config copy");
                }
                match self.remove_cache(record) {
                    Ok(()) | Err(SyncError::NoAssociatedFile(_)) => {}
                    Err(e) => {
                        tracing::warn!(id = %record.id, error = %e, "Failed to remove cached copy")
                    }
                }
            }

            self.observers.notify_deleted(record);

            // The file entity always goes. With a config snapshot left behind, the
            // next import recreates it from the config copy.
            if let Some(file) = self.file_for(record)? {
                if guard.enter_file(&file.id) {
                    self.delete_file_entity(&file, mode, guard)?;
                }
            }

            self.db.delete_config_file(&record.id)?;
            tracing::debug!(id = %record.id, ?mode, "Deleted config file");
        }
        Ok(())
    }

    fn delete_file_entity(
        &self,
        file: &ManagedFile,
        mode: SyncMode,
        guard: &mut DeletionGuard,
    ) -> Result<(), SyncError> {
        // The tracking record goes first so it can still see its file.
        if let Some(record) = self.db.get_config_file_by_file_id(&file.id)? {
            self.delete_records(&[record], mode, guard)?;
        }

        if let Err(e) = self.fs.delete(&file.uri) {
            tracing::warn!(file_id = %file.id, error = %e, "Failed to delete public file");
        }
        self.db.delete_managed_file(&file.id)?;
        Ok(())
    }
}

fn copy_error(source: &str, destination: &str, e: FileSystemError) -> SyncError {
    match e {
        FileSystemError::NotFound(_) => SyncError::SourceUnreadable {
            uri: source.to_string(),
            source: e,
        },
        e => SyncError::CopyFailed {
            uri: destination.to_string(),
            source: e,
        },
    }
}

pub(crate) fn guess_mime(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
