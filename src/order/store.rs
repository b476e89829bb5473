//! Custom Order Store
//!
//! Per-directory custom ordering of child names. Each directory's order record is
//! persisted as a JSON array under a hash-sharded metadata root and cached in
//! memory until it has gone unused for the configured time-to-live.

use crate::concurrency::DirectoryLockManager;
use crate::error::{ApiError, StorageError};
use crate::fs::{FileStat, FileSystem, StatOptions, WriteOptions};
use crate::order::paths::metadata_path;
use crate::order::record::{self, ChangeKind};
use crate::tree::{compare_entries, default_compare, FileItem, NameFilter};
use crate::types::{EntryKind, ItemId};
use parking_lot::Mutex;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default inactivity window before a cached record is evicted
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Store configuration
#[derive(Debug, Clone)]
pub struct OrderStoreConfig {
    /// Root of the sharded metadata tree
    pub metadata_root: PathBuf,
    /// Inactivity window before eviction
    pub cache_ttl: Duration,
    /// Spaces per indent level in metadata files
    pub json_indent: usize,
}

impl OrderStoreConfig {
    pub fn new(metadata_root: PathBuf) -> Self {
        Self {
            metadata_root,
            cache_ttl: DEFAULT_CACHE_TTL,
            json_indent: 2,
        }
    }
}

/// What a batch change applies to
#[derive(Debug, Clone, Copy)]
pub enum BatchTarget<'a> {
    /// Sibling items; their names are the batch names
    Items(&'a [FileItem]),
    /// A directory, for changes that carry no names
    Parent(&'a Path),
    /// A directory and explicit names
    Named {
        directory: &'a Path,
        names: &'a [String],
    },
}

struct CacheEntry {
    order: Vec<String>,
    positions: HashMap<String, usize>,
    deadline: Instant,
    timer: Option<JoinHandle<()>>,
}

impl CacheEntry {
    fn set_order(&mut self, order: Vec<String>) {
        self.positions = positions_of(&order);
        self.order = order;
    }
}

impl Drop for CacheEntry {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

fn positions_of(order: &[String]) -> HashMap<String, usize> {
    order
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}

type Cache = Mutex<HashMap<ItemId, CacheEntry>>;

enum Expiry {
    Sleep(Instant),
    Done,
}

fn next_expiry(cache: &Weak<Cache>, locks: &DirectoryLockManager, id: &ItemId) -> Expiry {
    let Some(cache) = cache.upgrade() else {
        return Expiry::Done;
    };
    {
        let mut guard = cache.lock();
        let deadline = match guard.get(id) {
            Some(entry) => entry.deadline,
            None => return Expiry::Done,
        };
        if deadline > Instant::now() {
            return Expiry::Sleep(deadline);
        }
        if let Some(mut entry) = guard.remove(id) {
            // this task is the timer being dropped; aborting ourselves is pointless
            entry.timer = None;
        }
    }
    locks.release(id);
    debug!(dir = %id, "Evicted order record from cache");
    Expiry::Done
}

async fn run_expiry(cache: Weak<Cache>, locks: Arc<DirectoryLockManager>, id: ItemId) {
    while let Expiry::Sleep(deadline) = next_expiry(&cache, &locks, &id) {
        tokio::time::sleep_until(deadline).await;
    }
}

pub struct CustomOrderStore {
    fs: Arc<dyn FileSystem>,
    config: OrderStoreConfig,
    cache: Arc<Cache>,
    locks: Arc<DirectoryLockManager>,
    filter: Option<Arc<dyn NameFilter>>,
}

impl CustomOrderStore {
    pub fn new(fs: Arc<dyn FileSystem>, config: OrderStoreConfig) -> Self {
        Self {
            fs,
            config,
            cache: Arc::new(Mutex::new(HashMap::new())),
            locks: Arc::new(DirectoryLockManager::new()),
            filter: None,
        }
    }

    /// Hide names from default orders the store derives by reading a directory itself
    ///
    /// Use the same filter as the tree, so records created outside a tree
    /// resolution match the children the tree shows.
    pub fn with_name_filter(mut self, filter: Arc<dyn NameFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn config(&self) -> &OrderStoreConfig {
        &self.config
    }

    /// Location of a directory's metadata file
    pub fn metadata_path(&self, directory: &Path) -> PathBuf {
        metadata_path(&self.config.metadata_root, &ItemId::from_path(directory))
    }

    /// Compare two siblings by their parent's cached order record
    ///
    /// Without a cached record the default ordering applies. A name missing from
    /// the record sorts after any name that is present.
    pub fn compare(&self, a: &FileItem, b: &FileItem) -> Ordering {
        let Some(parent) = a.parent.as_ref() else {
            return default_compare(a, b);
        };
        if b.parent.as_ref() != Some(parent) {
            return default_compare(a, b);
        }

        let mut cache = self.cache.lock();
        let Some(entry) = cache.get_mut(parent) else {
            return default_compare(a, b);
        };
        entry.deadline = Instant::now() + self.config.cache_ttl;

        match (entry.positions.get(&a.name), entry.positions.get(&b.name)) {
            (Some(ia), Some(ib)) => ia.cmp(ib),
            (Some(_), None) => {
                warn!(dir = %parent, name = %b.name, "Name missing from order record");
                Ordering::Less
            }
            (None, Some(_)) => {
                warn!(dir = %parent, name = %a.name, "Name missing from order record");
                Ordering::Greater
            }
            (None, None) => default_compare(a, b),
        }
    }

    /// Directories that currently have a lock entry
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    pub fn is_cached(&self, directory: &Path) -> bool {
        self.cache.lock().contains_key(&ItemId::from_path(directory))
    }

    /// Cached order without touching disk or the eviction deadline
    pub fn cached_order(&self, directory: &Path) -> Option<Vec<String>> {
        self.cache
            .lock()
            .get(&ItemId::from_path(directory))
            .map(|e| e.order.clone())
    }

    /// Drop the in-memory copy of a record; the metadata file is kept
    pub fn evict(&self, directory: &Path) -> bool {
        let removed = self.cache.lock().remove(&ItemId::from_path(directory)).is_some();
        self.locks.release_idle();
        removed
    }

    /// Ensure a directory's record is cached and return it
    ///
    /// A directory without a metadata file gets one written from the default order
    /// of its current children.
    pub async fn load_metadata(&self, directory: &Path) -> Result<Vec<String>, ApiError> {
        let id = ItemId::from_path(directory);
        let lock = self.locks.get_lock(&id);
        let _guard = lock.lock().await;
        self.ensure_loaded(directory, &id, None).await
    }

    /// Apply a single-item change to the order record of `item`'s parent
    pub async fn update_metadata(
        &self,
        kind: ChangeKind,
        item: &FileItem,
        index: Option<usize>,
        other: Option<usize>,
    ) -> Result<(), ApiError> {
        record::check_single(kind, index, other)?;
        let directory = match (&item.parent, item.path.parent()) {
            (Some(_), Some(dir)) => dir,
            _ => {
                return Err(ApiError::InvalidOperation(format!(
                    "{} has no parent and therefore no order record",
                    item.id
                )))
            }
        };

        let id = ItemId::from_path(directory);
        let lock = self.locks.get_lock(&id);
        let _guard = lock.lock().await;

        let order = self.ensure_loaded(directory, &id, None).await?;
        if let Some(next) = record::apply_single(&order, kind, &item.name, index, other)? {
            self.commit(directory, &id, next).await?;
        }
        Ok(())
    }

    /// Apply a batch change with one write at the end
    ///
    /// Indices refer to positions in the record as it was before the call.
    pub async fn update_metadata_lot(
        &self,
        kind: ChangeKind,
        target: BatchTarget<'_>,
        indices: &[usize],
        destination: Option<usize>,
    ) -> Result<(), ApiError> {
        let (directory, names): (&Path, Vec<String>) = match target {
            BatchTarget::Items(items) => {
                let directory = shared_parent(items)?;
                (directory, items.iter().map(|i| i.name.clone()).collect())
            }
            BatchTarget::Parent(directory) => (directory, Vec::new()),
            BatchTarget::Named { directory, names } => (directory, names.to_vec()),
        };
        record::check_batch(kind, names.len(), indices, destination)?;

        let id = ItemId::from_path(directory);
        let lock = self.locks.get_lock(&id);
        let _guard = lock.lock().await;

        let order = self.ensure_loaded(directory, &id, None).await?;
        if let Some(next) = record::apply_batch(&order, kind, &names, indices, destination)? {
            self.commit(directory, &id, next).await?;
        }
        Ok(())
    }

    /// Carry metadata along when a directory is moved or copied
    ///
    /// Call after the filesystem operation. The directory's own metadata file and
    /// those of its descendants are moved (or copied) to the locations derived from
    /// `destination`. Returns how many metadata files were carried.
    pub async fn update_directory_metadata(
        &self,
        old_directory: &Path,
        destination: &Path,
        is_move: bool,
    ) -> Result<usize, ApiError> {
        let mut relative_dirs = vec![PathBuf::new()];
        match self.fs.stat(destination, StatOptions::recursive()).await {
            Ok(stat) => collect_relative_dirs(&stat, destination, &mut relative_dirs),
            // only a missing destination is tolerated; anything deeper would orphan records
            Err(StorageError::NotFound(missing)) if missing == destination => {}
            Err(e) => return Err(e.into()),
        }

        let mut carried = 0;
        for relative in relative_dirs {
            let (from, to) = (old_directory.join(&relative), destination.join(&relative));
            if self.carry_metadata(&from, &to, is_move).await? {
                carried += 1;
            }
        }
        if carried > 0 {
            info!(
                from = %old_directory.display(),
                to = %destination.display(),
                carried,
                is_move,
                "Carried order metadata"
            );
        }
        Ok(carried)
    }

    /// Reconcile a record with the child names currently on disk
    ///
    /// Returns whether the record changed (and was written).
    pub async fn sync_metadata_in_cache_with_disk(
        &self,
        directory: &Path,
        actual: &[String],
    ) -> Result<bool, ApiError> {
        let id = ItemId::from_path(directory);
        let lock = self.locks.get_lock(&id);
        let _guard = lock.lock().await;

        let order = self.ensure_loaded(directory, &id, None).await?;
        self.reconcile_locked(directory, &id, &order, actual).await
    }

    /// Reconcile against freshly read children, creating the record from them if needed
    pub(crate) async fn sync_with_children(
        &self,
        directory: &Path,
        children: &[FileStat],
    ) -> Result<bool, ApiError> {
        let id = ItemId::from_path(directory);
        let lock = self.locks.get_lock(&id);
        let _guard = lock.lock().await;

        let order = self.ensure_loaded(directory, &id, Some(children)).await?;
        let actual: Vec<String> = children.iter().map(FileStat::name).collect();
        self.reconcile_locked(directory, &id, &order, &actual).await
    }

    /// Remove a deleted directory's metadata file and cached record
    pub async fn delete_directory_metadata(&self, directory: &Path) -> Result<bool, ApiError> {
        let id = ItemId::from_path(directory);
        let lock = self.locks.get_lock(&id);
        let _guard = lock.lock().await;

        self.cache.lock().remove(&id);
        let path = self.metadata_path(directory);
        match self.fs.delete(&path).await {
            Ok(()) => {
                debug!(dir = %id, "Deleted order metadata");
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn reconcile_locked(
        &self,
        directory: &Path,
        id: &ItemId,
        order: &[String],
        actual: &[String],
    ) -> Result<bool, ApiError> {
        match record::reconcile(order, actual) {
            Some(next) => {
                debug!(dir = %id, before = order.len(), after = next.len(), "Reconciled order record");
                self.commit(directory, id, next).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn carry_metadata(&self, from: &Path, to: &Path, is_move: bool) -> Result<bool, ApiError> {
        let from_id = ItemId::from_path(from);
        let to_id = ItemId::from_path(to);
        let from_path = metadata_path(&self.config.metadata_root, &from_id);
        if !self.fs.exists(&from_path).await {
            return Ok(false);
        }
        let to_path = metadata_path(&self.config.metadata_root, &to_id);
        let lock = self.locks.get_lock(&to_id);
        let _guard = lock.lock().await;

        if is_move {
            self.fs.move_to(&from_path, &to_path, true).await?;
            self.cache.lock().remove(&from_id);
        } else {
            let bytes = self.fs.read_file(&from_path).await?;
            self.fs
                .write_file(&to_path, &bytes, WriteOptions::default())
                .await?;
        }
        // whatever was cached for the destination predates the carried file
        self.cache.lock().remove(&to_id);
        Ok(true)
    }

    /// Caller holds the directory lock
    async fn ensure_loaded(
        &self,
        directory: &Path,
        id: &ItemId,
        children: Option<&[FileStat]>,
    ) -> Result<Vec<String>, ApiError> {
        if let Some(order) = self.touch(id) {
            return Ok(order);
        }

        let path = metadata_path(&self.config.metadata_root, id);
        let order = match self.fs.read_file(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<String>>(&bytes)
                .map_err(|source| ApiError::MetadataDecode { path: path.clone(), source })?,
            Err(e) if e.is_not_found() => {
                let order = self.default_order(directory, children).await?;
                self.persist(&path, &order).await?;
                debug!(dir = %id, entries = order.len(), "Created order record from default order");
                order
            }
            Err(e) => return Err(e.into()),
        };

        debug!(dir = %id, entries = order.len(), "Loaded order record");
        self.insert(id.clone(), order.clone());
        Ok(order)
    }

    async fn default_order(
        &self,
        directory: &Path,
        children: Option<&[FileStat]>,
    ) -> Result<Vec<String>, ApiError> {
        let owned: Vec<FileStat>;
        let children: &[FileStat] = match children {
            Some(children) => children,
            None => {
                let stat = self.fs.stat(directory, StatOptions::with_children()).await?;
                owned = stat
                    .children
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|c| self.filter.as_ref().map_or(true, |f| f.accepts(&c.name())))
                    .collect();
                &owned
            }
        };
        let mut entries: Vec<(EntryKind, String)> =
            children.iter().map(|c| (c.kind, c.name())).collect();
        entries.sort_by(|a, b| compare_entries(a.0, &a.1, b.0, &b.1));
        Ok(entries.into_iter().map(|(_, name)| name).collect())
    }

    async fn commit(&self, directory: &Path, id: &ItemId, order: Vec<String>) -> Result<(), ApiError> {
        let path = metadata_path(&self.config.metadata_root, id);
        self.persist(&path, &order).await?;
        debug!(dir = %directory.display(), entries = order.len(), "Persisted order record");
        self.insert(id.clone(), order);
        Ok(())
    }

    async fn persist(&self, path: &Path, order: &[String]) -> Result<(), ApiError> {
        let indent = vec![b' '; self.config.json_indent];
        let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
        let mut buffer = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        order
            .serialize(&mut serializer)
            .map_err(ApiError::MetadataEncode)?;
        self.fs
            .write_file(path, &buffer, WriteOptions::default())
            .await?;
        Ok(())
    }

    /// Refresh the deadline of a cached record and return it
    fn touch(&self, id: &ItemId) -> Option<Vec<String>> {
        let mut cache = self.cache.lock();
        let entry = cache.get_mut(id)?;
        entry.deadline = Instant::now() + self.config.cache_ttl;
        Some(entry.order.clone())
    }

    fn insert(&self, id: ItemId, order: Vec<String>) {
        let deadline = Instant::now() + self.config.cache_ttl;
        let mut cache = self.cache.lock();
        if let Some(entry) = cache.get_mut(&id) {
            entry.set_order(order);
            entry.deadline = deadline;
            return;
        }

        let timer = match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(run_expiry(
                Arc::downgrade(&self.cache),
                self.locks.clone(),
                id.clone(),
            ))),
            Err(_) => {
                debug!(dir = %id, "No runtime available; cached record will not expire");
                None
            }
        };
        cache.insert(
            id,
            CacheEntry {
                positions: positions_of(&order),
                order,
                deadline,
                timer,
            },
        );
    }
}

impl Drop for CustomOrderStore {
    fn drop(&mut self) {
        self.cache.lock().clear();
    }
}

fn shared_parent(items: &[FileItem]) -> Result<&Path, ApiError> {
    let first = items
        .first()
        .ok_or_else(|| ApiError::InvalidOperation("batch change without items".to_string()))?;
    if first.parent.is_none() {
        return Err(ApiError::InvalidOperation(format!(
            "{} has no parent and therefore no order record",
            first.id
        )));
    }
    if items.iter().any(|i| i.parent != first.parent) {
        return Err(ApiError::InvalidOperation(
            "batch items must share one parent".to_string(),
        ));
    }
    first
        .path
        .parent()
        .ok_or_else(|| ApiError::InvalidOperation(format!("{} has no parent path", first.id)))
}

fn collect_relative_dirs(stat: &FileStat, base: &Path, out: &mut Vec<PathBuf>) {
    for child in stat.children.iter().flatten() {
        if child.is_directory() {
            if let Ok(relative) = child.path.strip_prefix(base) {
                out.push(relative.to_path_buf());
            }
            collect_relative_dirs(child, base, out);
        }
    }
}
