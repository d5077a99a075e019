use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::ConfigFileRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // Config file record operations
    // ========================================================================

    /// Store a config file record and update the uri index
    pub fn put_config_file(&self, record: &ConfigFileRecord) -> Result<(), DatabaseError> {
        debug_assert!(!record.id.is_empty(), "record id must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(CONFIG_FILES)?;
            let previous_uri = match table.get(record.id.as_str())? {
                Some(data) => {
                    let previous: ConfigFileRecord = rmp_serde::from_slice(data.value())?;
                    Some(previous.uri)
                }
                None => None,
            };

            let data = rmp_serde::to_vec_named(record)?;
            table.insert(record.id.as_str(), data.as_slice())?;

            let mut uri_table = write_txn.open_table(CONFIG_FILE_URIS)?;
            if let Some(previous_uri) = previous_uri.filter(|u| *u != record.uri) {
                uri_table.remove(previous_uri.as_str())?;
            }
            uri_table.insert(record.uri.as_str(), record.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a config file record by its id
    pub fn get_config_file(&self, id: &str) -> Result<Option<ConfigFileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(CONFIG_FILES)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Get the config file record tracking the public file at `uri`
    pub fn get_config_file_by_uri(
        &self,
        uri: &str,
    ) -> Result<Option<ConfigFileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let uri_table = read_txn.open_table(CONFIG_FILE_URIS)?;

        let id = match uri_table.get(uri)? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let table = read_txn.open_table(CONFIG_FILES)?;
        match table.get(id.as_str())? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Get the config file record tracking the managed file `file_id`
    pub fn get_config_file_by_file_id(
        &self,
        file_id: &str,
    ) -> Result<Option<ConfigFileRecord>, DatabaseError> {
        match self.get_managed_file(file_id)? {
            Some(file) => self.get_config_file_by_uri(&file.uri),
            None => Ok(None),
        }
    }

    /// Get all config file records, ordered by id
    pub fn get_all_config_files(&self) -> Result<Vec<ConfigFileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(CONFIG_FILES)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            records.push(rmp_serde::from_slice(value.value())?);
        }

        Ok(records)
    }

    /// Delete a config file record and its uri index entry
    pub fn delete_config_file(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let uri: Option<String> = {
            let table = write_txn.open_table(CONFIG_FILES)?;
            let result = match table.get(id)? {
                Some(data) => {
                    let record: ConfigFileRecord = rmp_serde::from_slice(data.value())?;
                    Some(record.uri)
                }
                None => None,
            };
            result
        };

        let deleted = match uri {
            Some(uri) => {
                {
                    let mut table = write_txn.open_table(CONFIG_FILES)?;
                    table.remove(id)?;
                }
                {
                    let mut uri_table = write_txn.open_table(CONFIG_FILE_URIS)?;
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
}
