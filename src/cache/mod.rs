//! Key/value cache bins holding the compressed fallback copies of tracked files.
//!
//! - [`DatabaseBackend`] stores a bin in its own redb table.
//! - [`PersistentCacheBin`] wraps a backend so routine cache clears leave it intact.
//! - [`codec`] turns raw file bytes into the text token stored in a bin.

pub mod codec;
mod persistent;
mod redb_backend;

pub use persistent::PersistentCacheBin;
pub use redb_backend::DatabaseBackend;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::DatabaseError;

/// Name of the bin holding tracked file fallbacks.
pub const CONFIG_FILE_BIN: &str = "config_file";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache storage error: {0}")]
    Storage(#[from] DatabaseError),
    #[error("Cache entry decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("Cache entry encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

/// A cached value and the time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: String,
    pub created_at: DateTime<Utc>,
}

/// A single cache bin.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;
    fn set(&self, key: &str, data: String) -> Result<(), CacheError>;
    fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Remove every entry in the bin, returning how many were removed.
    fn clear_all(&self) -> Result<u64, CacheError>;
}
