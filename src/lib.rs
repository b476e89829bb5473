//! treeorder: persistent custom ordering for lazily resolved file trees
//!
//! A file tree model mirrors a filesystem subtree on demand. Each directory may
//! carry a custom child order, persisted as hash-sharded JSON metadata and cached
//! with timed eviction. A drag controller turns pointer gestures into filesystem
//! moves and copies plus the matching order changes.

pub mod concurrency;
pub mod config;
pub mod drag;
pub mod error;
pub mod fs;
pub mod logging;
pub mod order;
pub mod tooling;
pub mod tree;
pub mod types;
