//! Drag and drop: copy-or-move policy and the reorder controller.

pub mod controller;
pub mod policy;

pub use controller::{
    ControllerEvent, DragPhase, DragReorderController, DragSettings, DropFeedback, DropOutcome,
    DropRejection, InsertPosition, InsertionMarker, Point, PointerEvent, SortMode,
    DEFAULT_EXPAND_DELAY, DEFAULT_INSERTION_THRESHOLD,
};
pub use policy::{DefaultDragDropPolicy, DragDropPolicy, DropEffect, Modifiers, Platform};
