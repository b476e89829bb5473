//! Tree Model
//!
//! Lazily resolved mirror of a filesystem subtree: nodes, the default ordering,
//! children providers and the render index consumed by drag interactions.

pub mod compare;
pub mod model;
pub mod node;
pub mod provider;
pub mod render;

pub use compare::{compare_entries, compare_names, default_compare};
pub use model::{FileTree, TreeOptions};
pub use node::FileItem;
pub use provider::{ChildrenProvider, DefaultChildrenProvider, ExcludeNames, NameFilter};
pub use render::{FlatTreeView, RenderGeometry};
