//! Uploading files into tracking and wiring them to the entity that owns them.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::config::UploadConfig;
use crate::filesystem::{FileSystem, FileSystemError};
use crate::storage::models::{
    ConfigFileRecord, DependencyKind, FileStatus, ManagedFile, PUBLIC_URI,
};
use crate::storage::{Database, DatabaseError};
use crate::sync::{guess_mime, SyncEngine, SyncError, SyncMode};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
    #[error("Only files with the following extensions are allowed: {0}")]
    ExtensionNotAllowed(String),
    #[error("File exceeds maximum upload size of {0} bytes")]
    TooLarge(u64),
    #[error("Config file {id} is already tracking {uri}")]
    IdConflict { id: String, uri: String },
    #[error("Config file not found: {0}")]
    NotFound(String),
    #[error("File system error: {0}")]
    FileSystem(#[from] FileSystemError),
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Reference from a record to the configuration entity field that owns it.
#[derive(Debug, Clone)]
pub struct ParentRef {
    pub entity_type: String,
    pub entity_id: String,
    pub field: Option<String>,
}

pub struct Uploader {
    db: Database,
    fs: Arc<dyn FileSystem>,
    engine: Arc<SyncEngine>,
    config: UploadConfig,
}

impl Uploader {
    pub fn new(
        db: Database,
        fs: Arc<dyn FileSystem>,
        engine: Arc<SyncEngine>,
        config: UploadConfig,
    ) -> Self {
        Self {
            db,
            fs,
            engine,
            config,
        }
    }

    /// Store uploaded bytes as a temporary public file and start tracking it.
    pub fn upload(
        &self,
        filename: &str,
        data: &[u8],
        owner_id: Option<&str>,
    ) -> Result<ConfigFileRecord, UploadError> {
        let filename = sanitize_filename(filename)?;
        if !self.config.allows(&filename) {
            return Err(UploadError::ExtensionNotAllowed(
                self.config.allowed_extensions.join(" "),
            ));
        }
        if data.len() as u64 > self.config.max_upload_size {
            return Err(UploadError::TooLarge(self.config.max_upload_size));
        }

        let uri = format!("{PUBLIC_URI}/{filename}");
        self.fs.prepare_directory(PUBLIC_URI)?;
        self.fs.write(&uri, data)?;

        let now = Utc::now();
        let existing = self.db.get_managed_file_by_uri(&uri)?;
        let file = ManagedFile {
            id: existing
                .as_ref()
                .map(|f| f.id.clone())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            uri: uri.clone(),
            filename: filename.clone(),
            mime_type: guess_mime(&filename),
            byte_size: data.len() as u64,
            owner_id: owner_id.map(|o| o.to_string()),
            status: existing
                .as_ref()
                .map(|f| f.status)
                .unwrap_or(FileStatus::Temporary),
            created_at: existing.as_ref().map(|f| f.created_at).unwrap_or(now),
            changed_at: now,
        };
        self.db.put_managed_file(&file)?;

        let mut record = match self.db.get_config_file_by_uri(&uri)? {
            Some(record) => record,
            None => {
                let record = ConfigFileRecord::from_upload(&file);
                if let Some(other) = self.db.get_config_file(&record.id)? {
                    return Err(UploadError::IdConflict {
                        id: record.id,
                        uri: other.uri,
                    });
                }
                record
            }
        };
        self.engine.save(&mut record, SyncMode::Normal)?;

        tracing::debug!(id = %record.id, file_id = %file.id, bytes = data.len(), "Uploaded config file");
        Ok(record)
    }

    /// Attach a record to its parent entity, merge the declared dependents and
    /// make its file permanent.
    pub fn attach(
        &self,
        id: &str,
        parent: &ParentRef,
        dependents: &[(DependencyKind, String)],
    ) -> Result<ConfigFileRecord, UploadError> {
        let mut record = self
            .db
            .get_config_file(id)?
            .ok_or_else(|| UploadError::NotFound(id.to_string()))?;

        for (kind, name) in dependents {
            record.add_dependent(*kind, name);
        }
        record.set_parent(
            &parent.entity_type,
            &parent.entity_id,
            parent.field.as_deref(),
        );
        self.engine.save(&mut record, SyncMode::Normal)?;

        if let Some(file) = self.engine.file_for(&record)? {
            self.db
                .set_managed_file_status(&file.id, FileStatus::Permanent)?;
        }

        tracing::debug!(id = %record.id, parent_type = %parent.entity_type, parent_id = %parent.entity_id, "Attached config file");
        Ok(record)
    }

    /// Mark the record's file temporary so it can be garbage collected.
    pub fn detach(&self, id: &str) -> Result<Option<ManagedFile>, UploadError> {
        let record = self
            .db
            .get_config_file(id)?
            .ok_or_else(|| UploadError::NotFound(id.to_string()))?;

        let Some(file) = self.engine.file_for(&record)? else {
            return Ok(None);
        };
        Ok(self
            .db
            .set_managed_file_status(&file.id, FileStatus::Temporary)?)
    }
}

/// Keep only the last path segment of a client supplied filename.
fn sanitize_filename(filename: &str) -> Result<String, UploadError> {
    let name = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(UploadError::InvalidFilename(filename.to_string()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd.txt").unwrap(), "passwd.txt");
        assert_eq!(sanitize_filename("C:\\tmp\\notes.txt").unwrap(), "notes.txt");
        assert!(sanitize_filename("dir/").is_err());
        assert!(sanitize_filename("..").is_err());
    }
}
