//! Per-directory locking for order record mutations
//!
//! Every mutation of an order record is a load, mutate, persist sequence that
//! suspends on filesystem I/O. Holding the directory's lock across that sequence
//! keeps two logical operations from interleaving on the same record, while
//! operations on different directories proceed independently.

use crate::types::ItemId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-directory lock manager
pub struct DirectoryLockManager {
    /// Map from directory identity to its async lock
    locks: RwLock<HashMap<ItemId, Arc<Mutex<()>>>>,
}

impl DirectoryLockManager {
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the lock for a directory
    pub fn get_lock(&self, directory: &ItemId) -> Arc<Mutex<()>> {
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(directory) {
                return lock.clone();
            }
        }

        let mut map = self.locks.write();
        // another caller may have created it between the two guards
        map.entry(directory.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop locks nobody currently holds a handle to
    pub fn release_idle(&self) {
        self.locks.write().retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Drop one directory's lock if nobody holds a handle to it
    pub fn release(&self, directory: &ItemId) {
        let mut map = self.locks.write();
        if map.get(directory).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(directory);
        }
    }

    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.read().is_empty()
    }
}

impl Default for DirectoryLockManager {
    fn default() -> Self {
        Self::new()
    }
}
