mod local;

pub use local::LocalFileSystem;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileSystemError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Invalid uri: {0}")]
    InvalidUri(String),
}

/// Blocking, URI-addressed access to the file areas (`public://`, `config://`).
pub trait FileSystem: Send + Sync {
    /// Local path backing `uri`.
    fn resolve(&self, uri: &str) -> Result<PathBuf, FileSystemError>;
    fn exists(&self, uri: &str) -> bool;
    fn read(&self, uri: &str) -> Result<Vec<u8>, FileSystemError>;
    /// Size in bytes of the file at `uri`.
    fn size(&self, uri: &str) -> Result<u64, FileSystemError>;
    /// Write `data` to `uri`, replacing any existing file. The parent directory must exist.
    fn write(&self, uri: &str, data: &[u8]) -> Result<(), FileSystemError>;
    /// Copy `source` over `destination`, replacing it. Returns the destination uri.
    fn copy(&self, source: &str, destination: &str) -> Result<String, FileSystemError>;
    /// Delete a single file. Deleting a missing file is not an error.
    fn delete(&self, uri: &str) -> Result<(), FileSystemError>;
    /// Delete a directory and everything below it.
    fn delete_recursive(&self, uri: &str) -> Result<(), FileSystemError>;
    /// Create the directory if missing and normalize its permissions. Idempotent.
    fn prepare_directory(&self, uri: &str) -> Result<(), FileSystemError>;
    /// Whether this process can create files in the directory at `uri`.
    fn is_writable(&self, uri: &str) -> bool;
}

/// Parent directory of a `scheme://path` uri.
pub fn dirname(uri: &str) -> String {
    let (scheme, target) = match uri.split_once("://") {
        Some((scheme, target)) => (Some(scheme), target),
        None => (None, uri),
    };
    let parent = target.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
    match scheme {
        Some(scheme) => format!("{scheme}://{parent}"),
        None => parent.to_string(),
    }
}

/// Last path segment of a uri.
pub fn basename(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirname_keeps_scheme() {
        assert_eq!(dirname("public://neo-file/a.txt"), "public://neo-file");
        assert_eq!(dirname("config://a.txt"), "config://");
        assert_eq!(dirname("dir/a.txt"), "dir");
    }

    #[test]
    fn basename_takes_last_segment() {
        assert_eq!(basename("public://neo-file/a.txt"), "a.txt");
        assert_eq!(basename("a.txt"), "a.txt");
    }
}
