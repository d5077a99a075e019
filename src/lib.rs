//! config-file - Tracks uploaded files as configuration objects
//!
//! A tracked file lives in three places that this crate keeps consistent:
//! - the public file area (`public://neo-file/<name>`), backed by a managed file entity
//! - the config sync directory (`config://files/<name>`), exported and imported with config
//! - a compressed fallback in a cache bin that ordinary cache clears never empty
//!
//! Records, file entities and the cache bin share one redb database.

pub mod api;
pub mod cache;
pub mod config;
pub mod config_sync;
pub mod filesystem;
pub mod snapshot;
pub mod storage;
pub mod subscriber;
pub mod sync;
pub mod upload;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use cache::{DatabaseBackend, PersistentCacheBin, CONFIG_FILE_BIN};
use config::Config;
use config_sync::ConfigSync;
use filesystem::{FileSystem, LocalFileSystem};
use snapshot::DirectoryStorage;
use storage::Database;
use subscriber::{ConfigSubscriber, FileCacheBin};
use sync::{ObserverRegistry, SyncEngine};
use upload::Uploader;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub cache: Arc<FileCacheBin>,
    pub engine: Arc<SyncEngine>,
    pub subscriber: Arc<ConfigSubscriber>,
    pub config_sync: ConfigSync,
    pub uploader: Uploader,
}

impl AppState {
    /// Wire every component from `config`, opening the database and file areas.
    pub fn build(config: Config, observers: ObserverRegistry) -> anyhow::Result<Self> {
        let db = Database::open(&config.node.data_dir)?;
        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new(
            &config.storage.public_path,
            &config.storage.config_sync_directory,
        )?);
        let cache = Arc::new(PersistentCacheBin::new(DatabaseBackend::new(
            db.clone(),
            CONFIG_FILE_BIN,
        )?));

        let engine = Arc::new(SyncEngine::new(
            db.clone(),
            Arc::clone(&fs),
            cache.clone(),
            observers,
            config.storage.config_sync_directory.clone(),
        ));
        let subscriber = Arc::new(ConfigSubscriber::new(
            db.clone(),
            Arc::clone(&fs),
            Arc::clone(&engine),
            Arc::clone(&cache),
        ));
        let config_sync = ConfigSync::new(
            db.clone(),
            Arc::clone(&engine),
            Arc::clone(&subscriber),
            DirectoryStorage::new(&config.storage.config_sync_directory),
        );
        let uploader = Uploader::new(
            db.clone(),
            fs,
            Arc::clone(&engine),
            config.upload.clone(),
        );

        Ok(Self {
            config,
            db,
            cache,
            engine,
            subscriber,
            config_sync,
            uploader,
        })
    }
}
