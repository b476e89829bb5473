//! Local disk implementation of the filesystem contract on top of `tokio::fs`.

use super::{FileStat, FileSystem, StatOptions, WriteOptions};
use crate::error::StorageError;
use crate::types::EntryKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Filesystem backed by the local disk
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

fn to_utc(time: std::io::Result<std::time::SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

fn stat_entry(path: PathBuf, options: StatOptions) -> BoxFuture<'static, Result<FileStat, StorageError>> {
    async move {
        // links are reported as themselves and never followed
        let metadata = tokio::fs::symlink_metadata(&path)
            .await
            .map_err(|e| StorageError::from_io(&path, e))?;
        let kind = EntryKind::from_file_type(metadata.file_type());

        let children = if kind.is_directory() && (options.resolve_children || options.recursive) {
            let mut entries = tokio::fs::read_dir(&path)
                .await
                .map_err(|e| StorageError::from_io(&path, e))?;
            let mut child_paths = Vec::new();
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::from_io(&path, e))?
            {
                child_paths.push(entry.path());
            }
            // read_dir order is platform dependent
            child_paths.sort();

            let child_options = if options.recursive {
                options
            } else {
                StatOptions::entry_only()
            };
            let mut children = Vec::with_capacity(child_paths.len());
            for child in child_paths {
                children.push(stat_entry(child, child_options).await?);
            }
            Some(children)
        } else {
            None
        };

        Ok(FileStat {
            path,
            kind,
            created: to_utc(metadata.created()),
            modified: to_utc(metadata.modified()),
            children,
        })
    }
    .boxed()
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

async fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::from_io(parent, e))?;
        }
    }
    Ok(())
}

fn copy_tree_blocking(src: &Path, dst: &Path) -> Result<(), StorageError> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            match e.into_io_error() {
                Some(io) => StorageError::from_io(&path, io),
                None => StorageError::Io {
                    path,
                    source: std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"),
                },
            }
        })?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| StorageError::from_io(&target, e))?;
        } else if entry.file_type().is_symlink() {
            copy_link_blocking(entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| StorageError::from_io(&target, e))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_link_blocking(src: &Path, dst: &Path) -> Result<(), StorageError> {
    let target = std::fs::read_link(src).map_err(|e| StorageError::from_io(src, e))?;
    std::os::unix::fs::symlink(&target, dst).map_err(|e| StorageError::from_io(dst, e))
}

#[cfg(not(unix))]
fn copy_link_blocking(src: &Path, dst: &Path) -> Result<(), StorageError> {
    std::fs::copy(src, dst)
        .map(|_| ())
        .map_err(|e| StorageError::from_io(dst, e))
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn stat(&self, path: &Path, options: StatOptions) -> Result<FileStat, StorageError> {
        stat_entry(path.to_path_buf(), options).await
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::from_io(path, e))
    }

    async fn write_file(
        &self,
        path: &Path,
        bytes: &[u8],
        options: WriteOptions,
    ) -> Result<(), StorageError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => return Err(StorageError::IsDirectory(path.to_path_buf())),
            Ok(_) if !options.overwrite => return Err(StorageError::FileExists(path.to_path_buf())),
            Ok(_) => {}
            Err(_) if !options.create => return Err(StorageError::NotFound(path.to_path_buf())),
            Err(_) => {}
        }

        ensure_parent(path).await?;
        let temp = temp_sibling(path);
        tokio::fs::write(&temp, bytes)
            .await
            .map_err(|e| StorageError::from_io(&temp, e))?;
        tokio::fs::rename(&temp, path)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
        Ok(())
    }

    async fn create_file(&self, path: &Path) -> Result<(), StorageError> {
        ensure_parent(path).await?;
        tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        Ok(())
    }

    async fn create_dir(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::from_io(path, e))
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::symlink_metadata(path).await.is_ok()
    }

    async fn move_to(
        &self,
        src: &Path,
        dst: &Path,
        overwrite: bool,
    ) -> Result<FileStat, StorageError> {
        if !self.exists(src).await {
            return Err(StorageError::NotFound(src.to_path_buf()));
        }
        if self.exists(dst).await {
            if !overwrite {
                return Err(StorageError::FileExists(dst.to_path_buf()));
            }
            self.delete(dst).await?;
        }
        ensure_parent(dst).await?;
        tokio::fs::rename(src, dst)
            .await
            .map_err(|e| StorageError::from_io(dst, e))?;
        self.stat(dst, StatOptions::entry_only()).await
    }

    async fn copy_to(&self, src: &Path, dst: &Path) -> Result<FileStat, StorageError> {
        if self.exists(dst).await {
            return Err(StorageError::FileExists(dst.to_path_buf()));
        }
        let source = self.stat(src, StatOptions::entry_only()).await?;
        ensure_parent(dst).await?;
        if source.kind.is_symlink() {
            let (from, to) = (src.to_path_buf(), dst.to_path_buf());
            tokio::task::spawn_blocking(move || copy_link_blocking(&from, &to))
                .await
                .map_err(|e| StorageError::Io {
                    path: dst.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                })??;
        } else if source.is_directory() {
            let (from, to) = (src.to_path_buf(), dst.to_path_buf());
            tokio::task::spawn_blocking(move || copy_tree_blocking(&from, &to))
                .await
                .map_err(|e| StorageError::Io {
                    path: dst.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                })??;
        } else {
            tokio::fs::copy(src, dst)
                .await
                .map_err(|e| StorageError::from_io(dst, e))?;
        }
        self.stat(dst, StatOptions::entry_only()).await
    }

    async fn delete(&self, path: &Path) -> Result<(), StorageError> {
        let metadata = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        }
        .map_err(|e| StorageError::from_io(path, e))
    }
}
