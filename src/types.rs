//! Core types for the file tree ordering system.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Hash: Generic 256-bit hash value
pub type Hash = [u8; 32];

/// ItemId: canonical, path-derived identity of a tree entry.
///
/// Identity is lexical. It is never resolved against disk, so two ids are equal
/// exactly when their normalised paths are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Derive the id for a filesystem location
    pub fn from_path(path: &Path) -> Self {
        let simplified = dunce::simplified(path);
        let mut canonical = simplified.to_string_lossy().replace('\\', "/");
        while canonical.len() > 1 && canonical.ends_with('/') {
            canonical.pop();
        }
        ItemId(canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The location this id was derived from
    pub fn to_path(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Path> for ItemId {
    fn from(path: &Path) -> Self {
        ItemId::from_path(path)
    }
}

/// Entry kind of a filesystem node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
    /// A link itself, never its target; sorts and moves like a file
    Symlink,
}

impl EntryKind {
    pub fn is_directory(self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    pub fn is_symlink(self) -> bool {
        matches!(self, EntryKind::Symlink)
    }

    pub(crate) fn from_file_type(file_type: std::fs::FileType) -> Self {
        if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }
}
