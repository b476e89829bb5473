//! Custom Ordering
//!
//! Persistent per-directory child order: the record mutation rules, the metadata
//! file layout, the cached store and the tree provider built on it.

pub mod paths;
pub mod provider;
pub mod record;
pub mod store;

pub use paths::{hash_identity, metadata_path};
pub use provider::CustomOrderProvider;
pub use record::ChangeKind;
pub use store::{BatchTarget, CustomOrderStore, OrderStoreConfig, DEFAULT_CACHE_TTL};
