//! Children providers: the filter, ordering and preparation hook a tree resolves with.

use crate::error::ApiError;
use crate::fs::FileStat;
use crate::tree::compare::default_compare;
use crate::tree::FileItem;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

/// Decides which entry names appear in the tree
pub trait NameFilter: Send + Sync {
    fn accepts(&self, name: &str) -> bool;
}

impl<F> NameFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn accepts(&self, name: &str) -> bool {
        self(name)
    }
}

/// Hides entries whose name matches exactly
#[derive(Debug, Clone, Default)]
pub struct ExcludeNames {
    names: HashSet<String>,
}

impl ExcludeNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl NameFilter for ExcludeNames {
    fn accepts(&self, name: &str) -> bool {
        !self.names.contains(name)
    }
}

/// Capability set a tree is constructed with
///
/// `prepare` runs once per directory resolution, after filtering and before the
/// children are sorted, so an implementation can bring whatever state `compare`
/// reads up to date with the children just read from disk.
#[async_trait]
pub trait ChildrenProvider: Send + Sync {
    fn accepts(&self, stat: &FileStat) -> bool;

    fn compare(&self, a: &FileItem, b: &FileItem) -> Ordering;

    async fn prepare(&self, _directory: &FileStat, _children: &[FileStat]) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Name filter plus the default comparator
pub struct DefaultChildrenProvider {
    filter: Arc<dyn NameFilter>,
}

impl DefaultChildrenProvider {
    pub fn new(filter: Arc<dyn NameFilter>) -> Self {
        Self { filter }
    }
}

impl Default for DefaultChildrenProvider {
    fn default() -> Self {
        Self::new(Arc::new(ExcludeNames::default()))
    }
}

#[async_trait]
impl ChildrenProvider for DefaultChildrenProvider {
    fn accepts(&self, stat: &FileStat) -> bool {
        self.filter.accepts(&stat.name())
    }

    fn compare(&self, a: &FileItem, b: &FileItem) -> Ordering {
        default_compare(a, b)
    }
}
