//! Error types for the file tree ordering system.

use crate::types::ItemId;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Filesystem-level failures, typed by cause
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Is a directory: {}", .0.display())]
    IsDirectory(PathBuf),

    #[error("File exists: {}", .0.display())]
    FileExists(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Classify an I/O error raised while operating on `path`
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::AlreadyExists => StorageError::FileExists(path.to_path_buf()),
            std::io::ErrorKind::IsADirectory => StorageError::IsDirectory(path.to_path_buf()),
            _ => StorageError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    StorageError(#[from] StorageError),

    #[error("Malformed order metadata in {}: {source}", .path.display())]
    MetadataDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode order metadata: {0}")]
    MetadataEncode(#[source] serde_json::Error),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Node not found: {0}")]
    NodeNotFound(ItemId),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
