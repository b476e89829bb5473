//! Shared fixtures: a temp workspace, a temp metadata root and a filesystem that
//! counts mutating calls.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use treeorder::error::StorageError;
use treeorder::fs::{FileStat, FileSystem, LocalFileSystem, StatOptions, WriteOptions};
use treeorder::order::{CustomOrderProvider, CustomOrderStore, OrderStoreConfig};
use treeorder::tree::{ExcludeNames, FileTree, TreeOptions};
use treeorder::types::ItemId;

/// Local filesystem that counts writes, moves, copies and deletes
#[derive(Default)]
pub struct RecordingFileSystem {
    inner: LocalFileSystem,
    writes: AtomicUsize,
    moves: AtomicUsize,
    copies: AtomicUsize,
    deletes: AtomicUsize,
}

impl RecordingFileSystem {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn moves(&self) -> usize {
        self.moves.load(Ordering::SeqCst)
    }

    pub fn copies(&self) -> usize {
        self.copies.load(Ordering::SeqCst)
    }

    /// Moves plus copies
    pub fn transfers(&self) -> usize {
        self.moves() + self.copies()
    }
}

#[async_trait]
impl FileSystem for RecordingFileSystem {
    async fn stat(&self, path: &Path, options: StatOptions) -> Result<FileStat, StorageError> {
        self.inner.stat(path, options).await
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        self.inner.read_file(path).await
    }

    async fn write_file(
        &self,
        path: &Path,
        bytes: &[u8],
        options: WriteOptions,
    ) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write_file(path, bytes, options).await
    }

    async fn create_file(&self, path: &Path) -> Result<(), StorageError> {
        self.inner.create_file(path).await
    }

    async fn create_dir(&self, path: &Path) -> Result<(), StorageError> {
        self.inner.create_dir(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path).await
    }

    async fn move_to(
        &self,
        src: &Path,
        dst: &Path,
        overwrite: bool,
    ) -> Result<FileStat, StorageError> {
        self.moves.fetch_add(1, Ordering::SeqCst);
        self.inner.move_to(src, dst, overwrite).await
    }

    async fn copy_to(&self, src: &Path, dst: &Path) -> Result<FileStat, StorageError> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        self.inner.copy_to(src, dst).await
    }

    async fn delete(&self, path: &Path) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(path).await
    }
}

pub struct Fixture {
    pub workspace: TempDir,
    pub metadata: TempDir,
    pub fs: Arc<RecordingFileSystem>,
    pub store: Arc<CustomOrderStore>,
}

impl Fixture {
    pub fn empty() -> Self {
        let workspace = TempDir::new().unwrap();
        let metadata = TempDir::new().unwrap();
        let fs = Arc::new(RecordingFileSystem::default());
        let store = Arc::new(
            CustomOrderStore::new(fs.clone(), OrderStoreConfig::new(metadata.path().to_path_buf()))
                .with_name_filter(Arc::new(ExcludeNames::new([".git"]))),
        );
        Self {
            workspace,
            metadata,
            fs,
            store,
        }
    }

    /// `root/{folder1/{sub/, a.txt, b.txt}, folder2/, file1, file2, file3, .git/}`
    pub fn scenario() -> Self {
        let fixture = Self::empty();
        let root = fixture.root();
        for name in ["file3", "file1", "file2"] {
            std::fs::write(root.join(name), name).unwrap();
        }
        std::fs::create_dir_all(root.join("folder1").join("sub")).unwrap();
        std::fs::write(root.join("folder1").join("a.txt"), "a").unwrap();
        std::fs::write(root.join("folder1").join("b.txt"), "b").unwrap();
        std::fs::create_dir(root.join("folder2")).unwrap();
        std::fs::create_dir(root.join(".git")).unwrap();
        fixture
    }

    pub fn root(&self) -> &Path {
        self.workspace.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    pub fn id(&self, relative: &str) -> ItemId {
        if relative.is_empty() {
            return ItemId::from_path(self.root());
        }
        ItemId::from_path(&self.path(relative))
    }

    pub fn dyn_fs(&self) -> Arc<dyn FileSystem> {
        self.fs.clone()
    }

    pub async fn open_tree(&self) -> FileTree {
        let provider = CustomOrderProvider::new(
            self.store.clone(),
            Arc::new(ExcludeNames::new([".git"])),
        );
        FileTree::open(
            self.dyn_fs(),
            Arc::new(provider),
            self.root(),
            TreeOptions::default(),
        )
        .await
        .unwrap()
    }

    /// Order record as persisted, read straight from disk
    pub fn metadata_on_disk(&self, directory: &Path) -> Option<Vec<String>> {
        let path = self.store.metadata_path(directory);
        let bytes = std::fs::read(path).ok()?;
        Some(serde_json::from_slice(&bytes).unwrap())
    }
}

pub fn names(tree: &FileTree, id: &ItemId) -> Vec<String> {
    tree.children(id)
        .iter()
        .map(|c| tree.get(c).unwrap().name.clone())
        .collect()
}

pub fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Let spawned timer tasks run after the clock moved
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
