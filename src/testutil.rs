//! Shared test helpers for config-file tests.

use std::sync::Arc;

use crate::config::{Config, NodeConfig, StorageConfig, UploadConfig};
use crate::sync::ObserverRegistry;
use crate::AppState;

/// Configuration rooted in a temporary directory.
pub fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: temp_dir.path().join("data").to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            public_path: temp_dir.path().join("files"),
            config_sync_directory: temp_dir.path().join("sync"),
        },
        upload: UploadConfig {
            max_upload_size: 1024 * 1024, // 1MB for tests
            ..UploadConfig::default()
        },
        test_mode: true,
    }
}

/// Create a test AppState with a temporary database and file areas.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with_observers(temp_dir, ObserverRegistry::new())
}

pub fn test_state_with_observers(
    temp_dir: &tempfile::TempDir,
    observers: ObserverRegistry,
) -> Arc<AppState> {
    let state = AppState::build(test_config(temp_dir), observers)
        .expect("Failed to build test state");
    Arc::new(state)
}
