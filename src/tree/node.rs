//! Tree node mirroring one filesystem entry

use crate::fs::FileStat;
use crate::types::{EntryKind, ItemId};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// In-memory node of a [`FileTree`](crate::tree::FileTree)
///
/// `parent` and `children` are identities resolved through the owning tree.
/// A directory's `children` is either empty and unresolved, or the full ordered
/// child set as of the last resolution.
#[derive(Debug, Clone)]
pub struct FileItem {
    pub id: ItemId,
    pub path: PathBuf,
    pub name: String,
    pub kind: EntryKind,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub parent: Option<ItemId>,
    pub(crate) children: Vec<ItemId>,
    pub(crate) resolved: bool,
}

impl FileItem {
    /// Build an unresolved node from a snapshot, ignoring any children it carries
    pub fn from_stat(stat: &FileStat, parent: Option<ItemId>) -> Self {
        Self {
            id: ItemId::from_path(&stat.path),
            path: stat.path.clone(),
            name: stat.name(),
            kind: stat.kind,
            created: stat.created,
            modified: stat.modified,
            parent,
            children: Vec::new(),
            // files have nothing to resolve
            resolved: !stat.is_directory(),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    pub fn is_file(&self) -> bool {
        !self.is_directory()
    }

    /// Directory-ness, not emptiness
    pub fn has_children(&self) -> bool {
        self.is_directory()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn children(&self) -> &[ItemId] {
        &self.children
    }
}

impl PartialEq for FileItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FileItem {}
