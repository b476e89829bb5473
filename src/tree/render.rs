//! Render index: the visible rows of a tree and their pixel geometry.

use crate::tree::FileTree;
use crate::types::ItemId;
use std::collections::{HashMap, HashSet};

/// Pixel-offset queries a drag controller needs from whatever renders the tree
pub trait RenderGeometry {
    fn row_count(&self) -> usize;

    fn item_at(&self, index: usize) -> Option<&ItemId>;

    fn item_index(&self, id: &ItemId) -> Option<usize>;

    /// Top edge of a row, in content pixels
    fn item_top(&self, index: usize) -> f64;

    fn item_height(&self, index: usize) -> f64;

    /// Row under a vertical content offset
    fn index_at_offset(&self, y: f64) -> Option<usize>;

    fn is_expanded(&self, id: &ItemId) -> bool;
}

/// Flattened expanded portion of a tree, one uniform-height row per visible item
///
/// The tree root itself is not rendered; its children are the top-level rows.
#[derive(Debug, Clone)]
pub struct FlatTreeView {
    rows: Vec<ItemId>,
    index: HashMap<ItemId, usize>,
    expanded: HashSet<ItemId>,
    row_height: f64,
}

impl FlatTreeView {
    pub fn new(row_height: f64) -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
            expanded: HashSet::new(),
            row_height,
        }
    }

    /// Mark a directory expanded; call `rebuild` once its children are resolved
    pub fn expand(&mut self, id: ItemId) {
        self.expanded.insert(id);
    }

    /// Returns whether the directory was expanded
    pub fn collapse(&mut self, id: &ItemId) -> bool {
        self.expanded.remove(id)
    }

    pub fn rows(&self) -> &[ItemId] {
        &self.rows
    }

    /// Recompute rows from the tree's current resolved state
    pub fn rebuild(&mut self, tree: &FileTree) {
        self.rows.clear();
        let mut stack: Vec<&ItemId> = tree.children(tree.root_id()).iter().rev().collect();
        while let Some(id) = stack.pop() {
            self.rows.push(id.clone());
            if self.expanded.contains(id) {
                stack.extend(tree.children(id).iter().rev());
            }
        }
        self.index = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        // items that disappeared from the tree cannot stay expanded
        self.expanded.retain(|id| tree.get(id).is_some());
    }
}

impl RenderGeometry for FlatTreeView {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn item_at(&self, index: usize) -> Option<&ItemId> {
        self.rows.get(index)
    }

    fn item_index(&self, id: &ItemId) -> Option<usize> {
        self.index.get(id).copied()
    }

    fn item_top(&self, index: usize) -> f64 {
        index as f64 * self.row_height
    }

    fn item_height(&self, _index: usize) -> f64 {
        self.row_height
    }

    fn index_at_offset(&self, y: f64) -> Option<usize> {
        if y < 0.0 || self.row_height <= 0.0 {
            return None;
        }
        let index = (y / self.row_height).floor() as usize;
        (index < self.rows.len()).then_some(index)
    }

    fn is_expanded(&self, id: &ItemId) -> bool {
        self.expanded.contains(id)
    }
}
