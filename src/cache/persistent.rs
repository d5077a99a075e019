use super::{CacheBackend, CacheEntry, CacheError};

/// A cache bin that survives system-wide cache clears.
///
/// Entries here are the last copy of a tracked file when its public copy is
/// gone, so `clear_all` does nothing. [`PersistentCacheBin::purge_all`] is the
/// only way to empty the bin.
pub struct PersistentCacheBin<B> {
    inner: B,
}

impl<B: CacheBackend> PersistentCacheBin<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    /// Permanently delete every entry in the bin.
    pub fn purge_all(&self) -> Result<u64, CacheError> {
        let purged = self.inner.clear_all()?;
        tracing::info!(entries = purged, "Purged config file cache bin");
        Ok(purged)
    }
}

impl<B: CacheBackend> CacheBackend for PersistentCacheBin<B> {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, data: String) -> Result<(), CacheError> {
        self.inner.set(key, data)
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.delete(key)
    }

    fn clear_all(&self) -> Result<u64, CacheError> {
        tracing::debug!("Ignoring clear of the config file cache bin");
        Ok(0)
    }
}
