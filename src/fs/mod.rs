//! Filesystem Layer
//!
//! The contract the tree model and the order store consume for every disk access.
//! All operations are asynchronous and fail with a typed [`StorageError`].

mod local;

pub use local::LocalFileSystem;

use crate::error::StorageError;
use crate::types::EntryKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Snapshot of one filesystem entry, optionally with its children
#[derive(Debug, Clone)]
pub struct FileStat {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    /// `None` when children were not requested or the entry is a file
    pub children: Option<Vec<FileStat>>,
}

impl FileStat {
    /// Final path component, or the full path for roots
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }
}

/// How deep a `stat` call reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatOptions {
    /// Read the direct children of a directory
    pub resolve_children: bool,
    /// Read children of children as well (implies `resolve_children`)
    pub recursive: bool,
}

impl StatOptions {
    pub fn entry_only() -> Self {
        Self::default()
    }

    pub fn with_children() -> Self {
        Self {
            resolve_children: true,
            recursive: false,
        }
    }

    pub fn recursive() -> Self {
        Self {
            resolve_children: true,
            recursive: true,
        }
    }
}

/// Write behaviour for `write_file`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub create: bool,
    pub overwrite: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            create: true,
            overwrite: true,
        }
    }
}

/// Filesystem contract
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn stat(&self, path: &Path, options: StatOptions) -> Result<FileStat, StorageError>;

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Replace the whole content of `path`; readers never observe a partial write
    async fn write_file(
        &self,
        path: &Path,
        bytes: &[u8],
        options: WriteOptions,
    ) -> Result<(), StorageError>;

    async fn create_file(&self, path: &Path) -> Result<(), StorageError>;

    async fn create_dir(&self, path: &Path) -> Result<(), StorageError>;

    async fn exists(&self, path: &Path) -> bool;

    /// Fails with `FileExists` when `dst` exists and `overwrite` is false
    async fn move_to(
        &self,
        src: &Path,
        dst: &Path,
        overwrite: bool,
    ) -> Result<FileStat, StorageError>;

    /// Fails with `FileExists` when `dst` exists
    async fn copy_to(&self, src: &Path, dst: &Path) -> Result<FileStat, StorageError>;

    async fn delete(&self, path: &Path) -> Result<(), StorageError>;
}
