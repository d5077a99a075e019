//! Full configuration export/import against the config sync directory.
//!
//! Runs the subscriber hooks in the order the host fires them: the export
//! transform before snapshots are written, the import transform before the
//! import starts, and the import start before records are applied.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::snapshot::{DirectoryStorage, MemoryStorage, SnapshotError, SnapshotStorage};
use crate::storage::models::{ConfigFileRecord, CONFIG_PREFIX};
use crate::storage::{Database, DatabaseError};
use crate::subscriber::{ConfigSubscriber, ExportTransform, SubscriberError, TransformSummary};
use crate::sync::{SyncEngine, SyncError, SyncMode};

#[derive(Debug, Error)]
pub enum ConfigSyncError {
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
    #[error(transparent)]
    Subscriber(#[from] SubscriberError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ExportReport {
    pub snapshots_written: usize,
    pub snapshots_removed: usize,
    pub files_exported: usize,
    pub files_failed: usize,
    pub files_skipped: bool,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportReport {
    pub files_validated: usize,
    pub cache_entries_purged: u64,
    pub records_saved: usize,
    pub records_deleted: usize,
    pub records_skipped: usize,
}

pub struct ConfigSync {
    db: Database,
    engine: Arc<SyncEngine>,
    subscriber: Arc<ConfigSubscriber>,
    sync_storage: DirectoryStorage,
}

impl ConfigSync {
    pub fn new(
        db: Database,
        engine: Arc<SyncEngine>,
        subscriber: Arc<ConfigSubscriber>,
        sync_storage: DirectoryStorage,
    ) -> Self {
        Self {
            db,
            engine,
            subscriber,
            sync_storage,
        }
    }

    /// Write a snapshot of every record to the sync directory, with its file.
    pub fn export(&self) -> Result<ExportReport, ConfigSyncError> {
        let staging = MemoryStorage::new();
        for record in self.db.get_all_config_files()? {
            staging.write(&record.config_name(), &snapshot_of(&record)?)?;
        }

        let mut report = ExportReport::default();
        match self.subscriber.on_storage_transform_export(&staging)? {
            ExportTransform::Skipped => report.files_skipped = true,
            ExportTransform::Completed(TransformSummary { processed, failed }) => {
                report.files_exported = processed;
                report.files_failed = failed;
            }
        }

        let mut staged = HashSet::new();
        for (name, snapshot) in staging.entries() {
            self.sync_storage.write(&name, &snapshot)?;
            report.snapshots_written += 1;
            staged.insert(name);
        }

        for stale in self.sync_storage.list_all(CONFIG_PREFIX)? {
            if !staged.contains(&stale) && self.sync_storage.delete(&stale)? {
                report.snapshots_removed += 1;
            }
        }

        tracing::info!(
            written = report.snapshots_written,
            removed = report.snapshots_removed,
            files = report.files_exported,
            "Configuration exported"
        );
        Ok(report)
    }

    /// Apply the snapshots in the sync directory to the active records.
    pub fn import(&self) -> Result<ImportReport, ConfigSyncError> {
        let mut report = ImportReport::default();

        let validated = self
            .subscriber
            .on_storage_transform_import(&self.sync_storage)?;
        report.files_validated = validated.processed;
        report.cache_entries_purged = self.subscriber.on_config_import_start()?;

        let mut incoming_ids = HashSet::new();
        for name in self.sync_storage.list_all(CONFIG_PREFIX)? {
            // Skipped snapshots still keep their active record.
            incoming_ids.insert(name[CONFIG_PREFIX.len()..].to_string());
            let snapshot = match self.sync_storage.read(&name) {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => continue,
                Err(e @ SnapshotError::Malformed { .. }) => {
                    tracing::warn!(%name, error = %e, "Skipping unreadable config file snapshot");
                    report.records_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let mut record: ConfigFileRecord = match serde_json::from_value(snapshot) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(%name, error = %e, "Skipping malformed config file snapshot");
                    report.records_skipped += 1;
                    continue;
                }
            };
            if !record.has_public_uri() {
                tracing::warn!(%name, uri = %record.uri, "Skipping config file snapshot outside the public file area");
                report.records_skipped += 1;
                continue;
            }

            incoming_ids.insert(record.id.clone());
            self.engine.save(&mut record, SyncMode::Importing)?;
            report.records_saved += 1;
        }

        let removed: Vec<ConfigFileRecord> = self
            .db
            .get_all_config_files()?
            .into_iter()
            .filter(|record| !incoming_ids.contains(&record.id))
            .collect();
        report.records_deleted = removed.len();
        self.engine.delete(&removed, SyncMode::Importing)?;

        tracing::info!(
            saved = report.records_saved,
            deleted = report.records_deleted,
            skipped = report.records_skipped,
            "Configuration imported"
        );
        Ok(report)
    }
}

/// Snapshot document of a record, including its calculated dependencies.
fn snapshot_of(record: &ConfigFileRecord) -> Result<serde_json::Value, serde_json::Error> {
    let mut snapshot = serde_json::to_value(record)?;
    if let Some(map) = snapshot.as_object_mut() {
        map.insert(
            "dependencies".to_string(),
            serde_json::to_value(record.dependencies())?,
        );
    }
    Ok(snapshot)
}
