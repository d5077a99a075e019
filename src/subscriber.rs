//! Hooks into the host's configuration import/export lifecycle.

use std::sync::Arc;

use crate::cache::{CacheError, DatabaseBackend, PersistentCacheBin};
use crate::filesystem::FileSystem;
use crate::snapshot::{SnapshotError, SnapshotStorage};
use crate::storage::models::{ConfigFileRecord, CONFIG_PREFIX, CONFIG_URI};
use crate::storage::{Database, DatabaseError};
use crate::sync::{SyncEngine, SyncError};

/// The cache bin holding tracked file fallbacks.
pub type FileCacheBin = PersistentCacheBin<DatabaseBackend>;

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Per-record outcome counts of a storage transform.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransformSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Outcome of the export transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTransform {
    /// The config sync directory is not writable; files were left alone.
    Skipped,
    Completed(TransformSummary),
}

pub struct ConfigSubscriber {
    db: Database,
    fs: Arc<dyn FileSystem>,
    engine: Arc<SyncEngine>,
    cache: Arc<FileCacheBin>,
}

impl ConfigSubscriber {
    pub fn new(
        db: Database,
        fs: Arc<dyn FileSystem>,
        engine: Arc<SyncEngine>,
        cache: Arc<FileCacheBin>,
    ) -> Self {
        Self {
            db,
            fs,
            engine,
            cache,
        }
    }

    /// A configuration import is starting: fallbacks of the previous state are stale.
    pub fn on_config_import_start(&self) -> Result<u64, SubscriberError> {
        Ok(self.cache.purge_all()?)
    }

    /// Incoming configuration is being staged: make sure every tracked file that
    /// already has a file entity also has its bytes on disk.
    pub fn on_storage_transform_import(
        &self,
        storage: &dyn SnapshotStorage,
    ) -> Result<TransformSummary, SubscriberError> {
        let mut summary = TransformSummary::default();

        for name in storage.list_all(CONFIG_PREFIX)? {
            let Some(record) = self.load_or_construct(storage, &name)? else {
                summary.failed += 1;
                continue;
            };

            if let Some(file) = self.engine.file_for(&record)? {
                if self.engine.validate_file(&record, &file) {
                    summary.processed += 1;
                } else {
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            failed = summary.failed,
            "Validated tracked files for import"
        );
        Ok(summary)
    }

    /// Outgoing configuration is being staged: rebuild the config-tracked files
    /// from the current public files.
    pub fn on_storage_transform_export(
        &self,
        storage: &dyn SnapshotStorage,
    ) -> Result<ExportTransform, SubscriberError> {
        if !self.fs.is_writable("config://") {
            tracing::debug!("Config sync directory is not writable, skipping file export");
            return Ok(ExportTransform::Skipped);
        }

        if self.fs.exists(CONFIG_URI) {
            if let Err(e) = self.fs.delete_recursive(CONFIG_URI) {
                tracing::warn!(error = %e, "Failed to clear config files directory");
            }
        }

        let mut summary = TransformSummary::default();
        for name in storage.list_all(CONFIG_PREFIX)? {
            let id = &name[CONFIG_PREFIX.len()..];
            let Some(record) = self.db.get_config_file(id)? else {
                tracing::warn!(%id, "Exported config file has no record");
                summary.failed += 1;
                continue;
            };

            match self.engine.to_config(&record) {
                Ok(_) => summary.processed += 1,
                Err(e) => {
                    tracing::warn!(%id, error = %e, "Failed to copy file to config");
                    summary.failed += 1;
                }
            }
        }

        // Fallbacks of records that failed to copy are still the only other copy.
        if summary.failed == 0 {
            self.cache.purge_all()?;
        } else {
            tracing::warn!(
                failed = summary.failed,
                "Keeping config file cache bin after failed exports"
            );
        }

        tracing::info!(
            processed = summary.processed,
            failed = summary.failed,
            "Exported tracked files to config"
        );
        Ok(ExportTransform::Completed(summary))
    }

    fn load_or_construct(
        &self,
        storage: &dyn SnapshotStorage,
        name: &str,
    ) -> Result<Option<ConfigFileRecord>, SubscriberError> {
        let id = &name[CONFIG_PREFIX.len()..];
        if let Some(record) = self.db.get_config_file(id)? {
            return Ok(Some(record));
        }

        let snapshot = match storage.read(name) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(None),
            Err(e @ SnapshotError::Malformed { .. }) => {
                tracing::warn!(%name, error = %e, "Skipping unreadable config file snapshot");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_value::<ConfigFileRecord>(snapshot) {
            Ok(record) if record.has_public_uri() => Ok(Some(record)),
            Ok(record) => {
                tracing::warn!(%name, uri = %record.uri, "Skipping config file snapshot outside the public file area");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(%name, error = %e, "Skipping malformed config file snapshot");
                Ok(None)
            }
        }
    }
}
