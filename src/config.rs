use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    /// Enables dangerous operations like purging the file cache bin. Must never be true in production.
    pub test_mode: bool,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    /// Directory holding the redb database (records, file entities, cache bin)
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory backing `public://`
    pub public_path: PathBuf,
    /// Configuration sync directory backing `config://`
    pub config_sync_directory: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Lower-cased extensions accepted by the upload endpoint
    pub allowed_extensions: Vec<String>,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: vec!["txt".to_string()],
            max_upload_size: 50 * 1024 * 1024, // 50MB
        }
    }
}

impl UploadConfig {
    pub fn allows(&self, filename: &str) -> bool {
        let Some((_, ext)) = filename.rsplit_once('.') else {
            return false;
        };
        let ext = ext.to_lowercase();
        self.allowed_extensions.iter().any(|allowed| *allowed == ext)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let public_path = std::env::var("PUBLIC_FILES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./files"));

        let config_sync_directory = std::env::var("CONFIG_SYNC_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./config/sync"));

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024);

        let allowed_extensions = std::env::var("ALLOWED_EXTENSIONS")
            .map(|v| parse_extensions(&v))
            .unwrap_or_else(|_| vec!["txt".to_string()]);

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig {
                public_path,
                config_sync_directory,
            },
            upload: UploadConfig {
                allowed_extensions,
                max_upload_size,
            },
            test_mode,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.config_sync_directory.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "CONFIG_SYNC_DIRECTORY cannot be empty".to_string(),
            ));
        }

        if self.storage.public_path == self.storage.config_sync_directory {
            return Err(ConfigError::ValidationError(
                "PUBLIC_FILES_PATH and CONFIG_SYNC_DIRECTORY must differ".to_string(),
            ));
        }

        if self.upload.allowed_extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "ALLOWED_EXTENSIONS must name at least one extension".to_string(),
            ));
        }

        if self.upload.max_upload_size == 0 {
            tracing::warn!("MAX_UPLOAD_SIZE is 0; every upload will be rejected");
        }

        Ok(())
    }
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
