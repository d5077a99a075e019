//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use config_file::config::{Config, NodeConfig, StorageConfig, UploadConfig};
use config_file::storage::models::ConfigFileRecord;
use config_file::sync::ObserverRegistry;
use config_file::AppState;

/// Configuration rooted in `root`.
pub fn config_in(root: &Path) -> Config {
    Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: root.join("data").to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            public_path: root.join("files"),
            config_sync_directory: root.join("sync"),
        },
        upload: UploadConfig {
            max_upload_size: 1024 * 1024,
            ..UploadConfig::default()
        },
        test_mode: true,
    }
}

pub fn state_with(config: Config, observers: ObserverRegistry) -> AppState {
    AppState::build(config, observers).expect("Failed to build state")
}

pub fn test_state() -> (tempfile::TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(config_in(dir.path()), ObserverRegistry::new());
    (dir, state)
}

/// On-disk path of a `public://neo-file/<name>` file.
pub fn public_path(state: &AppState, name: &str) -> PathBuf {
    state.config.storage.public_path.join("neo-file").join(name)
}

/// On-disk path of a `config://files/<name>` file.
pub fn config_path(state: &AppState, name: &str) -> PathBuf {
    state
        .config
        .storage
        .config_sync_directory
        .join("files")
        .join(name)
}

/// On-disk path of a record's snapshot in the config sync directory.
pub fn snapshot_file(state: &AppState, id: &str) -> PathBuf {
    state
        .config
        .storage
        .config_sync_directory
        .join(format!("config_file.config_file.{id}.yml"))
}

/// An unsaved record for `public://neo-file/<filename>`.
pub fn record_for(id: &str, filename: &str) -> ConfigFileRecord {
    ConfigFileRecord {
        id: id.to_string(),
        filename: filename.to_string(),
        uri: format!("public://neo-file/{filename}"),
        owner_id: None,
        parent_type: None,
        parent_id: None,
        parent_field: None,
        changed: None,
        dependents: Default::default(),
    }
}

/// Place bytes at the config-tracked location of `filename`.
pub fn write_config_copy(state: &AppState, filename: &str, data: &[u8]) {
    let path = config_path(state, filename);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, data).unwrap();
}
