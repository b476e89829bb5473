//! File tree model
//!
//! A lazily resolved mirror of a filesystem subtree. Nodes live in an arena keyed
//! by [`ItemId`]; a node owns its ordered child ids and refers to its parent by id.

use crate::error::ApiError;
use crate::fs::{FileStat, FileSystem, StatOptions};
use crate::tree::provider::ChildrenProvider;
use crate::tree::FileItem;
use crate::types::ItemId;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Resolution options fixed at tree construction
#[derive(Debug, Clone, Copy)]
pub struct TreeOptions {
    /// Stat depth used by `refresh_children`
    pub refresh: StatOptions,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            refresh: StatOptions::with_children(),
        }
    }
}

pub struct FileTree {
    nodes: HashMap<ItemId, FileItem>,
    root: ItemId,
    fs: Arc<dyn FileSystem>,
    provider: Arc<dyn ChildrenProvider>,
    options: TreeOptions,
}

/// Resolve a snapshot into staged nodes, parents before children
///
/// Nothing is committed here, so a failure part way through leaves the tree as it was.
fn resolve_staged<'a>(
    provider: &'a dyn ChildrenProvider,
    stat: FileStat,
    parent: Option<ItemId>,
    out: &'a mut Vec<FileItem>,
) -> BoxFuture<'a, Result<ItemId, ApiError>> {
    async move {
        let mut node = FileItem::from_stat(&stat, parent);
        let id = node.id.clone();

        let Some(children) = stat.children.filter(|_| node.is_directory()) else {
            out.push(node);
            return Ok(id);
        };

        let children: Vec<FileStat> = children.into_iter().filter(|c| provider.accepts(c)).collect();
        let directory = FileStat {
            children: None,
            ..stat
        };
        provider.prepare(&directory, &children).await?;

        let mut staged: Vec<(FileItem, FileStat)> = children
            .into_iter()
            .map(|c| (FileItem::from_stat(&c, Some(id.clone())), c))
            .collect();
        staged.sort_by(|a, b| provider.compare(&a.0, &b.0));

        node.children = staged.iter().map(|(item, _)| item.id.clone()).collect();
        node.resolved = true;
        out.push(node);

        for (_, child) in staged {
            resolve_staged(provider, child, Some(id.clone()), out).await?;
        }
        Ok(id)
    }
    .boxed()
}

impl FileTree {
    /// Stat `root` one level deep and resolve it into a tree
    pub async fn open(
        fs: Arc<dyn FileSystem>,
        provider: Arc<dyn ChildrenProvider>,
        root: &Path,
        options: TreeOptions,
    ) -> Result<Self, ApiError> {
        let stat = fs.stat(root, options.refresh).await?;
        Self::resolve(fs, provider, stat, options).await
    }

    /// Build a tree from a snapshot, resolving every level the snapshot carries
    pub async fn resolve(
        fs: Arc<dyn FileSystem>,
        provider: Arc<dyn ChildrenProvider>,
        stat: FileStat,
        options: TreeOptions,
    ) -> Result<Self, ApiError> {
        let mut staged = Vec::new();
        let root = resolve_staged(provider.as_ref(), stat, None, &mut staged).await?;
        let nodes = staged.into_iter().map(|n| (n.id.clone(), n)).collect();
        Ok(Self {
            nodes,
            root,
            fs,
            provider,
            options,
        })
    }

    pub fn root_id(&self) -> &ItemId {
        &self.root
    }

    pub fn get(&self, id: &ItemId) -> Option<&FileItem> {
        self.nodes.get(id)
    }

    pub fn get_or_error(&self, id: &ItemId) -> Result<&FileItem, ApiError> {
        self.get(id).ok_or_else(|| ApiError::NodeNotFound(id.clone()))
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&FileItem> {
        self.nodes.get(&ItemId::from_path(path))
    }

    pub fn children(&self, id: &ItemId) -> &[ItemId] {
        self.nodes.get(id).map(|n| n.children()).unwrap_or(&[])
    }

    pub fn parent(&self, id: &ItemId) -> Option<&ItemId> {
        self.nodes.get(id).and_then(|n| n.parent.as_ref())
    }

    /// Topmost ancestor reachable from `id`
    pub fn root(&self, id: &ItemId) -> Option<&ItemId> {
        let mut current = self.nodes.get(id)?;
        while let Some(parent) = current.parent.as_ref().and_then(|p| self.nodes.get(p)) {
            current = parent;
        }
        Some(&current.id)
    }

    pub fn is_root(&self, id: &ItemId) -> bool {
        self.nodes.get(id).map(|n| n.is_root()).unwrap_or(false)
    }

    /// True when `ancestor` lies strictly above `id`
    pub fn is_descendant_of(&self, id: &ItemId, ancestor: &ItemId) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pull the children of an unresolved directory from disk
    ///
    /// A resolved node returns immediately without touching disk. On failure the
    /// node keeps its prior state.
    pub async fn refresh_children(&mut self, id: &ItemId) -> Result<(), ApiError> {
        let node = self.get_or_error(id)?;
        if node.resolved {
            return Ok(());
        }
        let path = node.path.clone();
        let parent = node.parent.clone();

        let stat = self.fs.stat(&path, self.options.refresh).await?;
        let mut staged = Vec::new();
        resolve_staged(self.provider.as_ref(), stat, parent, &mut staged).await?;

        self.remove_descendants(id);
        debug!(dir = %id, nodes = staged.len(), "Refreshed children");
        for node in staged {
            self.nodes.insert(node.id.clone(), node);
        }
        Ok(())
    }

    /// Drop a directory's children and mark it unresolved; disk is untouched
    pub fn forget_children(&mut self, id: &ItemId) {
        self.remove_descendants(id);
        if let Some(node) = self.nodes.get_mut(id) {
            if node.is_directory() {
                node.children.clear();
                node.resolved = false;
            }
        }
    }

    /// Forget then refresh, picking up whatever changed on disk
    ///
    /// Child directories that were resolved and still exist keep their subtrees.
    pub async fn reload_children(&mut self, id: &ItemId) -> Result<(), ApiError> {
        if !self.nodes.contains_key(id) {
            return Err(ApiError::NodeNotFound(id.clone()));
        }
        let snapshot: HashMap<ItemId, FileItem> = self
            .snapshot_subtree(id)
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();
        self.forget_children(id);
        if let Err(e) = self.refresh_children(id).await {
            self.nodes.extend(snapshot);
            return Err(e);
        }
        self.restore_resolved_children(id, &snapshot);
        Ok(())
    }

    /// Re-apply the provider's ordering to a resolved directory
    pub fn resort_children(&mut self, id: &ItemId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let mut ids = node.children.clone();
        ids.sort_by(|a, b| match (self.nodes.get(a), self.nodes.get(b)) {
            (Some(a), Some(b)) => self.provider.compare(a, b),
            _ => std::cmp::Ordering::Equal,
        });
        if let Some(node) = self.nodes.get_mut(id) {
            node.children = ids;
        }
    }

    fn restore_resolved_children(&mut self, id: &ItemId, snapshot: &HashMap<ItemId, FileItem>) {
        for child in self.children(id).to_vec() {
            let Some(old) = snapshot.get(&child) else {
                continue;
            };
            let fresh_dir = self
                .nodes
                .get(&child)
                .map(|n| n.is_directory() && !n.resolved)
                .unwrap_or(false);
            if !(fresh_dir && old.is_directory() && old.resolved) {
                continue;
            }
            let mut stack = vec![child];
            while let Some(current) = stack.pop() {
                if let Some(node) = snapshot.get(&current) {
                    stack.extend(node.children.iter().cloned());
                    self.nodes.insert(current, node.clone());
                }
            }
        }
    }

    fn snapshot_subtree(&self, id: &ItemId) -> Vec<FileItem> {
        let mut out = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.iter().cloned());
                out.push(node.clone());
            }
        }
        out
    }

    fn remove_descendants(&mut self, id: &ItemId) {
        let mut stack: Vec<ItemId> = self.children(id).to_vec();
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
    }
}
