use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{FileStatus, ManagedFile};
use super::tables::*;

impl Database {
    // ========================================================================
    // Managed file operations
    // ========================================================================

    /// Store a managed file entity and update the uri index
    pub fn put_managed_file(&self, file: &ManagedFile) -> Result<(), DatabaseError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");
        debug_assert!(!file.uri.is_empty(), "file uri must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(MANAGED_FILES)?;
            let data = rmp_serde::to_vec_named(file)?;
            table.insert(file.id.as_str(), data.as_slice())?;

            let mut uri_table = write_txn.open_table(MANAGED_FILE_URIS)?;
            uri_table.insert(file.uri.as_str(), file.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a managed file by its UUID
    pub fn get_managed_file(&self, id: &str) -> Result<Option<ManagedFile>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(MANAGED_FILES)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Get the managed file living at `uri`
    pub fn get_managed_file_by_uri(&self, uri: &str) -> Result<Option<ManagedFile>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let uri_table = read_txn.open_table(MANAGED_FILE_URIS)?;

        let id = match uri_table.get(uri)? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let table = read_txn.open_table(MANAGED_FILES)?;
        match table.get(id.as_str())? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Change a managed file's status, bumping its changed time
    pub fn set_managed_file_status(
        &self,
        id: &str,
        status: FileStatus,
    ) -> Result<Option<ManagedFile>, DatabaseError> {
        let Some(mut file) = self.get_managed_file(id)? else {
            return Ok(None);
        };
        file.status = status;
        file.changed_at = chrono::Utc::now();
        self.put_managed_file(&file)?;
        Ok(Some(file))
    }

    /// Delete a managed file by its UUID and clean up the uri index
    pub fn delete_managed_file(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let uri: Option<String> = {
            let table = write_txn.open_table(MANAGED_FILES)?;
            let result = match table.get(id)? {
                Some(data) => {
                    let file: ManagedFile = rmp_serde::from_slice(data.value())?;
                    Some(file.uri)
                }
                None => None,
            };
            result
        };

        let deleted = match uri {
            Some(uri) => {
                {
                    let mut table = write_txn.open_table(MANAGED_FILES)?;
                    table.remove(id)?;
                }
                {
                    let mut uri_table = write_txn.open_table(MANAGED_FILE_URIS)?;
                    let points_here = uri_table
                        .get(uri.as_str())?
                        .map(|v| v.value() == id)
                        .unwrap_or(false);
                    if points_here {
                        uri_table.remove(uri.as_str())?;
                    }
                }
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }

    /// Get all managed files
    pub fn get_all_managed_files(&self) -> Result<Vec<ManagedFile>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(MANAGED_FILES)?;

        let mut files = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            files.push(rmp_serde::from_slice(value.value())?);
        }

        Ok(files)
    }
}
