use super::{CacheBackend, CacheEntry, CacheError};
use crate::storage::{Database, CACHE_TABLE_PREFIX};

/// Cache bin persisted in a dedicated redb table (`cache_<bin>`).
pub struct DatabaseBackend {
    db: Database,
    table: String,
}

impl DatabaseBackend {
    pub fn new(db: Database, bin: &str) -> Result<Self, CacheError> {
        let table = format!("{CACHE_TABLE_PREFIX}{bin}");
        db.ensure_table(&table)?;
        Ok(Self { db, table })
    }
}

impl CacheBackend for DatabaseBackend {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        match self.db.get_blob(&self.table, key)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, data: String) -> Result<(), CacheError> {
        let entry = CacheEntry {
            data,
            created_at: chrono::Utc::now(),
        };
        let encoded = rmp_serde::to_vec_named(&entry)?;
        self.db.put_blob(&self.table, key, &encoded)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.db.delete_blob(&self.table, key)?;
        Ok(())
    }

    fn clear_all(&self) -> Result<u64, CacheError> {
        Ok(self.db.clear_table(&self.table)?)
    }
}
