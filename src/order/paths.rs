//! Metadata file locations
//!
//! A directory's order record lives at `root/<h[0..2]>/<h[2..]>.json`, where `h` is
//! the hex blake3 hash of the directory's identity. The location is a pure function
//! of the identity, so no index of directories is kept.

use crate::types::{Hash, ItemId};
use std::path::{Path, PathBuf};

/// Hash a directory identity
pub fn hash_identity(id: &ItemId) -> Hash {
    *blake3::hash(id.as_str().as_bytes()).as_bytes()
}

/// Metadata file path for a directory identity under `root`
pub fn metadata_path(root: &Path, id: &ItemId) -> PathBuf {
    let hex = hex::encode(hash_identity(id));
    let (shard, rest) = hex.split_at(2);
    root.join(shard).join(format!("{}.json", rest))
}
