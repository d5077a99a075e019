use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use super::{FileSystem, FileSystemError};

/// Local filesystem mapping each uri scheme onto a base directory.
pub struct LocalFileSystem {
    roots: HashMap<String, PathBuf>,
}

impl LocalFileSystem {
    /// `public://` maps to `public_path`, `config://` to the config sync directory.
    pub fn new<P: AsRef<Path>, C: AsRef<Path>>(
        public_path: P,
        config_sync_directory: C,
    ) -> Result<Self, std::io::Error> {
        let public_path = public_path.as_ref().to_path_buf();
        let config_path = config_sync_directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&public_path)?;
        std::fs::create_dir_all(&config_path)?;

        let mut roots = HashMap::new();
        roots.insert("public".to_string(), public_path);
        roots.insert("config".to_string(), config_path);
        Ok(Self { roots })
    }
}

impl FileSystem for LocalFileSystem {
    fn resolve(&self, uri: &str) -> Result<PathBuf, FileSystemError> {
        let (scheme, target) = uri
            .split_once("://")
            .ok_or_else(|| FileSystemError::InvalidUri(uri.to_string()))?;
        let root = self
            .roots
            .get(scheme)
            .ok_or_else(|| FileSystemError::InvalidUri(uri.to_string()))?;

        let target = Path::new(target);
        if target
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(FileSystemError::InvalidUri(uri.to_string()));
        }

        Ok(root.join(target))
    }

    fn exists(&self, uri: &str) -> bool {
        self.resolve(uri).map(|p| p.exists()).unwrap_or(false)
    }

    fn read(&self, uri: &str) -> Result<Vec<u8>, FileSystemError> {
        let path = self.resolve(uri)?;
        if !path.is_file() {
            return Err(FileSystemError::NotFound(uri.to_string()));
        }
        Ok(std::fs::read(&path)?)
    }

    fn size(&self, uri: &str) -> Result<u64, FileSystemError> {
        let path = self.resolve(uri)?;
        if !path.is_file() {
            return Err(FileSystemError::NotFound(uri.to_string()));
        }
        Ok(std::fs::metadata(&path)?.len())
    }

    fn write(&self, uri: &str, data: &[u8]) -> Result<(), FileSystemError> {
        let path = self.resolve(uri)?;
        std::fs::write(&path, data)?;
        Ok(())
    }

    fn copy(&self, source: &str, destination: &str) -> Result<String, FileSystemError> {
        let from = self.resolve(source)?;
        let to = self.resolve(destination)?;
        if !from.is_file() {
            return Err(FileSystemError::NotFound(source.to_string()));
        }
        std::fs::copy(&from, &to)?;
        Ok(destination.to_string())
    }

    fn delete(&self, uri: &str) -> Result<(), FileSystemError> {
        let path = self.resolve(uri)?;
        if path.is_file() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn delete_recursive(&self, uri: &str) -> Result<(), FileSystemError> {
        let path = self.resolve(uri)?;
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn prepare_directory(&self, uri: &str) -> Result<(), FileSystemError> {
        let path = self.resolve(uri)?;
        std::fs::create_dir_all(&path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o775))?;
        }

        Ok(())
    }

    fn is_writable(&self, uri: &str) -> bool {
        let Ok(dir) = self.resolve(uri) else {
            return false;
        };
        if !dir.is_dir() {
            return false;
        }

        // Permission bits alone don't say whether this process may write here.
        let marker = dir.join(format!(".writable-{}", uuid::Uuid::new_v4()));
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&marker)
        {
            Ok(_) => {
                if let Err(e) = std::fs::remove_file(&marker) {
                    tracing::warn!(path = %marker.display(), error = %e, "Failed to remove write check file");
                }
                true
            }
            Err(_) => false,
        }
    }
}
