//! Drag and drop policy: copy-versus-move intent and per-item permissions.

use crate::tree::FileItem;
use serde::{Deserialize, Serialize};

/// Platform family, for modifier conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }
}

/// Modifier keys held during a pointer event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn alt() -> Self {
        Self {
            alt: true,
            ..Self::default()
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropEffect {
    Move,
    Copy,
}

/// Which drags are allowed and what a drop does
pub trait DragDropPolicy: Send + Sync {
    /// Copy only when the platform's copy modifier is held
    fn drop_effect(&self, modifiers: Modifiers) -> DropEffect;

    fn can_drag(&self, item: &FileItem) -> bool {
        !item.is_root()
    }

    fn can_expand_on_hover(&self, item: &FileItem) -> bool {
        item.is_directory()
    }
}

/// `Alt` copies on macOS, `Ctrl` copies elsewhere
#[derive(Debug, Clone, Copy)]
pub struct DefaultDragDropPolicy {
    platform: Platform,
}

impl DefaultDragDropPolicy {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl Default for DefaultDragDropPolicy {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

impl DragDropPolicy for DefaultDragDropPolicy {
    fn drop_effect(&self, modifiers: Modifiers) -> DropEffect {
        let copy = match self.platform {
            Platform::MacOs => modifiers.alt,
            Platform::Other => modifiers.ctrl,
        };
        if copy {
            DropEffect::Copy
        } else {
            DropEffect::Move
        }
    }
}
