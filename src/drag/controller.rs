//! Drag Reorder Controller
//!
//! Interprets pointer drag events against the rendered tree. Hovering a collapsed
//! directory schedules an expand; near a row edge (custom sort mode only) the drag
//! switches to row insertion. Releasing issues the filesystem move or copy and the
//! matching order record changes.

use crate::drag::policy::{DragDropPolicy, DropEffect, Modifiers};
use crate::error::ApiError;
use crate::fs::FileSystem;
use crate::order::{BatchTarget, ChangeKind, CustomOrderStore};
use crate::tree::{FileItem, FileTree, RenderGeometry};
use crate::types::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_EXPAND_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_INSERTION_THRESHOLD: f64 = 10.0;

/// Active sort mode of the tree being dragged over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    Default,
    #[default]
    Custom,
}

#[derive(Debug, Clone, Copy)]
pub struct DragSettings {
    /// Hover time on a collapsed directory before it expands
    pub expand_delay: Duration,
    /// Distance from a row edge, in pixels, that switches to row insertion
    pub insertion_threshold: f64,
    pub sort_mode: SortMode,
}

impl Default for DragSettings {
    fn default() -> Self {
        Self {
            expand_delay: DEFAULT_EXPAND_DELAY,
            insertion_threshold: DEFAULT_INSERTION_THRESHOLD,
            sort_mode: SortMode::Custom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Position in content pixels
    pub position: Point,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn at(y: f64, modifiers: Modifiers) -> Self {
        Self {
            position: Point { x: 0.0, y },
            modifiers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

/// Where the insertion marker is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertionMarker {
    pub row: usize,
    pub position: InsertPosition,
    /// Vertical offset of the marker line
    pub y: f64,
}

/// Result of one drag-over event
#[derive(Debug, Clone, PartialEq)]
pub struct DropFeedback {
    pub droppable: bool,
    pub effect: DropEffect,
    /// Hovered item; `None` during row insertion
    pub target: Option<ItemId>,
    pub insertion: Option<InsertionMarker>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragPhase {
    Idle,
    Hovering(ItemId),
    RowInsertion(InsertionMarker),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropRejection {
    NothingDragged,
    NoTarget,
    OntoSelf,
    IntoDescendant,
    OntoParent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    Reordered {
        directory: ItemId,
        items: Vec<ItemId>,
    },
    Moved {
        destination: ItemId,
        items: Vec<ItemId>,
    },
    Copied {
        destination: ItemId,
        items: Vec<ItemId>,
    },
    Rejected(DropRejection),
}

/// Actions the controller asks the host to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Expand(ItemId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Anchor {
    FirstChild,
    After(ItemId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Placement {
    Append,
    At(Anchor),
}

struct PendingExpand {
    target: ItemId,
    handle: JoinHandle<()>,
}

struct LastOver {
    position: Point,
    modifiers: Modifiers,
    feedback: DropFeedback,
}

pub struct DragReorderController {
    fs: Arc<dyn FileSystem>,
    store: Arc<CustomOrderStore>,
    policy: Arc<dyn DragDropPolicy>,
    settings: DragSettings,
    dragged: Vec<ItemId>,
    phase: DragPhase,
    pending_expand: Option<PendingExpand>,
    last_over: Option<LastOver>,
    events: mpsc::UnboundedSender<ControllerEvent>,
}

impl DragReorderController {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        store: Arc<CustomOrderStore>,
        policy: Arc<dyn DragDropPolicy>,
        settings: DragSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            fs,
            store,
            policy,
            settings,
            dragged: Vec::new(),
            phase: DragPhase::Idle,
            pending_expand: None,
            last_over: None,
            events,
        };
        (controller, receiver)
    }

    pub fn phase(&self) -> &DragPhase {
        &self.phase
    }

    pub fn dragged(&self) -> &[ItemId] {
        &self.dragged
    }

    pub fn has_pending_expand(&self) -> bool {
        self.pending_expand.is_some()
    }

    pub fn settings(&self) -> &DragSettings {
        &self.settings
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) {
        self.settings.sort_mode = mode;
        self.invalidate_feedback();
    }

    /// Begin a gesture; returns how many of `items` may be dragged
    ///
    /// Items whose ancestor is also selected travel with that ancestor and are dropped
    /// from the selection.
    pub fn drag_start(&mut self, tree: &FileTree, items: Vec<ItemId>) -> usize {
        self.drag_end();
        let draggable: Vec<ItemId> = items
            .into_iter()
            .filter(|id| tree.get(id).map(|i| self.policy.can_drag(i)).unwrap_or(false))
            .collect();
        let mut seen = HashSet::new();
        self.dragged = draggable
            .iter()
            .filter(|id| !draggable.iter().any(|other| tree.is_descendant_of(id, other)))
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect();
        debug!(count = self.dragged.len(), "Drag started");
        self.dragged.len()
    }

    /// Forget the cached drag-over result, e.g. after the rendered rows changed
    pub fn invalidate_feedback(&mut self) {
        self.last_over = None;
    }

    pub fn drag_over(
        &mut self,
        tree: &FileTree,
        view: &dyn RenderGeometry,
        event: PointerEvent,
    ) -> DropFeedback {
        if let Some(last) = &self.last_over {
            if last.position == event.position && last.modifiers == event.modifiers {
                return last.feedback.clone();
            }
        }
        let feedback = self.compute_over(tree, view, &event);
        self.last_over = Some(LastOver {
            position: event.position,
            modifiers: event.modifiers,
            feedback: feedback.clone(),
        });
        feedback
    }

    /// Pointer left the tree
    pub fn drag_leave(&mut self) {
        self.cancel_pending_expand();
        self.phase = DragPhase::Idle;
        self.last_over = None;
    }

    /// Gesture finished without a drop
    pub fn drag_end(&mut self) {
        self.drag_leave();
        self.dragged.clear();
    }

    /// Release the pointer: perform the drop the current phase describes
    pub async fn drop_at(
        &mut self,
        tree: &mut FileTree,
        view: &dyn RenderGeometry,
        event: PointerEvent,
    ) -> Result<DropOutcome, ApiError> {
        let feedback = self.drag_over(tree, view, event);
        self.cancel_pending_expand();
        let phase = std::mem::replace(&mut self.phase, DragPhase::Idle);
        let dragged = std::mem::take(&mut self.dragged);
        self.last_over = None;

        let outcome = match phase {
            DragPhase::RowInsertion(marker) => {
                self.drop_between_rows(tree, view, &dragged, marker, feedback.effect)
                    .await?
            }
            DragPhase::Hovering(target) => {
                self.drop_into(tree, &dragged, &target, feedback.effect).await?
            }
            DragPhase::Idle => DropOutcome::Rejected(DropRejection::NothingDragged),
        };
        match &outcome {
            DropOutcome::Rejected(reason) => info!(?reason, "Drop rejected"),
            outcome => info!(?outcome, "Drop completed"),
        }
        Ok(outcome)
    }

    fn compute_over(
        &mut self,
        tree: &FileTree,
        view: &dyn RenderGeometry,
        event: &PointerEvent,
    ) -> DropFeedback {
        let effect = self.policy.drop_effect(event.modifiers);
        if self.dragged.is_empty() {
            self.drag_leave();
            return DropFeedback {
                droppable: false,
                effect,
                target: None,
                insertion: None,
            };
        }

        let y = event.position.y;
        let row = view.index_at_offset(y);

        if self.settings.sort_mode == SortMode::Custom {
            if let Some(marker) = row.and_then(|r| self.insertion_marker(view, r, y)) {
                self.cancel_pending_expand();
                let droppable = insertion_destination(tree, view, &marker)
                    .map(|(dir, _)| check_drop(tree, &self.dragged, None, &dir, false, effect).is_ok())
                    .unwrap_or(false);
                self.phase = DragPhase::RowInsertion(marker);
                return DropFeedback {
                    droppable,
                    effect,
                    target: None,
                    insertion: Some(marker),
                };
            }
        }

        // empty space below the last row belongs to the root
        let target = row
            .and_then(|r| view.item_at(r))
            .unwrap_or_else(|| tree.root_id())
            .clone();

        if !matches!(&self.phase, DragPhase::Hovering(current) if *current == target) {
            self.cancel_pending_expand();
        }
        self.phase = DragPhase::Hovering(target.clone());

        if let Some(item) = tree.get(&target) {
            let expandable = item.is_directory()
                && !item.is_root()
                && !view.is_expanded(&target)
                && self.policy.can_expand_on_hover(item);
            if expandable && self.pending_expand.is_none() {
                self.schedule_expand(target.clone());
            }
        }

        let droppable = plain_destination(tree, &target)
            .map(|dir| check_drop(tree, &self.dragged, Some(&target), &dir, true, effect).is_ok())
            .unwrap_or(false);
        DropFeedback {
            droppable,
            effect,
            target: Some(target),
            insertion: None,
        }
    }

    fn insertion_marker(&self, view: &dyn RenderGeometry, row: usize, y: f64) -> Option<InsertionMarker> {
        let top = view.item_top(row);
        let bottom = top + view.item_height(row);
        let threshold = self.settings.insertion_threshold;
        if y - top <= threshold {
            Some(InsertionMarker {
                row,
                position: InsertPosition::Before,
                y: top,
            })
        } else if bottom - y <= threshold {
            Some(InsertionMarker {
                row,
                position: InsertPosition::After,
                y: bottom,
            })
        } else {
            None
        }
    }

    fn schedule_expand(&mut self, target: ItemId) {
        self.cancel_pending_expand();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(dir = %target, "No runtime available; hover expand skipped");
            return;
        };
        let events = self.events.clone();
        // the delay counts from the hover, not from when the task first runs
        let deadline = tokio::time::Instant::now() + self.settings.expand_delay;
        let id = target.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // the host may have gone away; nothing to expand then
            let _ = events.send(ControllerEvent::Expand(id));
        });
        self.pending_expand = Some(PendingExpand { target, handle });
    }

    fn cancel_pending_expand(&mut self) {
        if let Some(pending) = self.pending_expand.take() {
            pending.handle.abort();
            debug!(dir = %pending.target, "Canceled pending expand");
        }
    }

    async fn drop_into(
        &self,
        tree: &mut FileTree,
        dragged: &[ItemId],
        target: &ItemId,
        effect: DropEffect,
    ) -> Result<DropOutcome, ApiError> {
        let Some(destination) = plain_destination(tree, target) else {
            return Ok(DropOutcome::Rejected(DropRejection::NoTarget));
        };
        if let Err(reason) = check_drop(tree, dragged, Some(target), &destination, true, effect) {
            return Ok(DropOutcome::Rejected(reason));
        }
        self.transfer(tree, dragged, &destination, Placement::Append, effect)
            .await
    }

    async fn drop_between_rows(
        &self,
        tree: &mut FileTree,
        view: &dyn RenderGeometry,
        dragged: &[ItemId],
        marker: InsertionMarker,
        effect: DropEffect,
    ) -> Result<DropOutcome, ApiError> {
        let Some((destination, anchor)) = insertion_destination(tree, view, &marker) else {
            return Ok(DropOutcome::Rejected(DropRejection::NoTarget));
        };
        if let Err(reason) = check_drop(tree, dragged, None, &destination, false, effect) {
            return Ok(DropOutcome::Rejected(reason));
        }

        let all_local = effect == DropEffect::Move
            && dragged.iter().all(|d| tree.parent(d) == Some(&destination));
        if all_local {
            self.reorder(tree, dragged, &destination, &anchor).await
        } else {
            self.transfer(tree, dragged, &destination, Placement::At(anchor), effect)
                .await
        }
    }

    /// Reorder siblings within one directory; no filesystem change
    async fn reorder(
        &self,
        tree: &mut FileTree,
        dragged: &[ItemId],
        directory: &ItemId,
        anchor: &Anchor,
    ) -> Result<DropOutcome, ApiError> {
        let dir_path = tree.get_or_error(directory)?.path.clone();
        let order = self.store.load_metadata(&dir_path).await?;

        let mut indices = Vec::with_capacity(dragged.len());
        for id in dragged {
            let name = &tree.get_or_error(id)?.name;
            match order.iter().position(|n| n == name) {
                Some(i) => indices.push(i),
                None => warn!(dir = %directory, name = %name, "Dragged item missing from order record"),
            }
        }
        let destination = match anchor {
            Anchor::FirstChild => 0,
            Anchor::After(id) => {
                let name = &tree.get_or_error(id)?.name;
                order
                    .iter()
                    .position(|n| n == name)
                    .map(|p| p + 1)
                    .unwrap_or(order.len())
            }
        };

        self.store
            .update_metadata_lot(
                ChangeKind::Move,
                BatchTarget::Parent(&dir_path),
                &indices,
                Some(destination),
            )
            .await?;
        tree.resort_children(directory);
        Ok(DropOutcome::Reordered {
            directory: directory.clone(),
            items: dragged.to_vec(),
        })
    }

    /// Move or copy items into `destination`, then update order records to match
    async fn transfer(
        &self,
        tree: &mut FileTree,
        dragged: &[ItemId],
        destination: &ItemId,
        placement: Placement,
        effect: DropEffect,
    ) -> Result<DropOutcome, ApiError> {
        let dest_path = tree.get_or_error(destination)?.path.clone();
        let sources: Vec<FileItem> = dragged.iter().filter_map(|d| tree.get(d).cloned()).collect();
        let is_move = effect == DropEffect::Move;

        // records must exist before the filesystem changes, or their creation
        // would already include the transferred names
        let dest_order = self.store.load_metadata(&dest_path).await?;
        let mut source_dirs: BTreeMap<PathBuf, ItemId> = BTreeMap::new();
        if is_move {
            for item in &sources {
                if let (Some(parent), Some(dir)) = (&item.parent, item.path.parent()) {
                    source_dirs.insert(dir.to_path_buf(), parent.clone());
                }
            }
            for dir in source_dirs.keys() {
                self.store.load_metadata(dir).await?;
            }
        }

        let mut transferred: Vec<&FileItem> = Vec::with_capacity(sources.len());
        let mut failure = None;
        for item in &sources {
            if is_move && item.parent.as_ref() == Some(destination) {
                transferred.push(item);
                continue;
            }
            let target = dest_path.join(&item.name);
            let result = if is_move {
                self.fs.move_to(&item.path, &target, false).await
            } else {
                self.fs.copy_to(&item.path, &target).await
            };
            match result {
                Ok(_) => {
                    if item.is_directory() {
                        self.store
                            .update_directory_metadata(&item.path, &target, is_move)
                            .await?;
                    }
                    transferred.push(item);
                }
                Err(e) => {
                    warn!(item = %item.id, target = %target.display(), error = %e, "Transfer failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        // items already in the destination are removed and re-added at the new spot
        let local: HashSet<&str> = transferred
            .iter()
            .filter(|i| is_move && i.parent.as_ref() == Some(destination))
            .map(|i| i.name.as_str())
            .collect();
        let retained = |names: &[String]| names.iter().filter(|n| !local.contains(n.as_str())).count();
        let insert_at = match &placement {
            Placement::Append => retained(dest_order.as_slice()),
            Placement::At(Anchor::FirstChild) => 0,
            Placement::At(Anchor::After(anchor)) => {
                let anchor_name = tree.get(anchor).map(|a| a.name.as_str()).unwrap_or_default();
                match dest_order.iter().position(|n| n == anchor_name) {
                    Some(p) => retained(&dest_order[..=p]),
                    None => retained(dest_order.as_slice()),
                }
            }
        };

        if is_move {
            for dir in source_dirs.keys() {
                let names: HashSet<&str> = transferred
                    .iter()
                    .filter(|i| i.path.parent() == Some(dir.as_path()))
                    .map(|i| i.name.as_str())
                    .collect();
                if names.is_empty() {
                    continue;
                }
                let order = self.store.load_metadata(dir).await?;
                let indices: Vec<usize> = order
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| names.contains(n.as_str()))
                    .map(|(i, _)| i)
                    .collect();
                self.store
                    .update_metadata_lot(ChangeKind::Remove, BatchTarget::Parent(dir), &indices, None)
                    .await?;
            }
        }

        let names: Vec<String> = transferred.iter().map(|i| i.name.clone()).collect();
        if !names.is_empty() {
            let indices = vec![insert_at; names.len()];
            self.store
                .update_metadata_lot(
                    ChangeKind::Add,
                    BatchTarget::Named {
                        directory: &dest_path,
                        names: &names,
                    },
                    &indices,
                    None,
                )
                .await?;
        }

        let mut affected: Vec<ItemId> = source_dirs.into_values().collect();
        affected.push(destination.clone());
        affected.sort();
        affected.dedup();
        for dir in &affected {
            if tree.get(dir).map(|d| d.is_resolved()).unwrap_or(false) {
                tree.reload_children(dir).await?;
            }
        }

        if let Some(e) = failure {
            return Err(e.into());
        }

        let items = names
            .iter()
            .map(|n| ItemId::from_path(&dest_path.join(n)))
            .collect();
        Ok(if is_move {
            DropOutcome::Moved {
                destination: destination.clone(),
                items,
            }
        } else {
            DropOutcome::Copied {
                destination: destination.clone(),
                items,
            }
        })
    }
}

impl Drop for DragReorderController {
    fn drop(&mut self) {
        self.cancel_pending_expand();
    }
}

/// Directory a plain drop onto `target` lands in
fn plain_destination(tree: &FileTree, target: &ItemId) -> Option<ItemId> {
    let item = tree.get(target)?;
    if item.is_directory() {
        Some(target.clone())
    } else {
        item.parent.clone()
    }
}

/// Directory and anchor for an insertion marker
///
/// The anchor is the row above the marker. An expanded directory directly above
/// the marker receives the items as its first children; a marker above the first
/// row inserts at the top of the root.
fn insertion_destination(
    tree: &FileTree,
    view: &dyn RenderGeometry,
    marker: &InsertionMarker,
) -> Option<(ItemId, Anchor)> {
    let anchor_row = match marker.position {
        InsertPosition::Before => marker.row.checked_sub(1),
        InsertPosition::After => Some(marker.row),
    };
    let Some(anchor_row) = anchor_row else {
        return Some((tree.root_id().clone(), Anchor::FirstChild));
    };
    let anchor = view.item_at(anchor_row)?;
    let item = tree.get(anchor)?;
    if item.is_directory() && view.is_expanded(anchor) {
        return Some((anchor.clone(), Anchor::FirstChild));
    }
    Some((item.parent.clone()?, Anchor::After(anchor.clone())))
}

/// Reject drops onto the item itself, into its own subtree, or (plain move) onto its parent
fn check_drop(
    tree: &FileTree,
    dragged: &[ItemId],
    target: Option<&ItemId>,
    destination: &ItemId,
    plain: bool,
    effect: DropEffect,
) -> Result<(), DropRejection> {
    if dragged.is_empty() {
        return Err(DropRejection::NothingDragged);
    }
    for item in dragged {
        if Some(item) == target || item == destination {
            return Err(DropRejection::OntoSelf);
        }
        if tree.is_descendant_of(destination, item) {
            return Err(DropRejection::IntoDescendant);
        }
        if plain && effect == DropEffect::Move && tree.parent(item) == Some(destination) {
            return Err(DropRejection::OntoParent);
        }
    }
    Ok(())
}
