//! Children provider that orders a tree by the custom order store.

use crate::error::ApiError;
use crate::fs::FileStat;
use crate::order::CustomOrderStore;
use crate::tree::{ChildrenProvider, FileItem, NameFilter};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;

/// Sorts children by their directory's order record
///
/// Each directory resolution first reconciles the record with the children just
/// read, creating the record from the default order when none exists yet.
pub struct CustomOrderProvider {
    store: Arc<CustomOrderStore>,
    filter: Arc<dyn NameFilter>,
}

impl CustomOrderProvider {
    pub fn new(store: Arc<CustomOrderStore>, filter: Arc<dyn NameFilter>) -> Self {
        Self { store, filter }
    }

    pub fn store(&self) -> &Arc<CustomOrderStore> {
        &self.store
    }
}

#[async_trait]
impl ChildrenProvider for CustomOrderProvider {
    fn accepts(&self, stat: &FileStat) -> bool {
        self.filter.accepts(&stat.name())
    }

    fn compare(&self, a: &FileItem, b: &FileItem) -> Ordering {
        self.store.compare(a, b)
    }

    async fn prepare(&self, directory: &FileStat, children: &[FileStat]) -> Result<(), ApiError> {
        self.store.sync_with_children(&directory.path, children).await?;
        Ok(())
    }
}
