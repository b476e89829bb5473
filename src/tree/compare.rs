//! Default ordering of sibling entries: directories first, then by name.

use crate::tree::FileItem;
use crate::types::EntryKind;
use std::cmp::Ordering;

/// Whether names compare case-insensitively on this platform
pub const CASE_INSENSITIVE_NAMES: bool = cfg!(any(target_os = "windows", target_os = "macos"));

/// Compare two names with the platform's case rule
///
/// Names that are equal under the rule compare `Equal`; sorting stays stable.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    if CASE_INSENSITIVE_NAMES {
        a.to_lowercase().cmp(&b.to_lowercase())
    } else {
        a.cmp(b)
    }
}

/// Directories before files, then ascending by name
pub fn compare_entries(a_kind: EntryKind, a_name: &str, b_kind: EntryKind, b_name: &str) -> Ordering {
    match (a_kind.is_directory(), b_kind.is_directory()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => compare_names(a_name, b_name),
    }
}

pub fn default_compare(a: &FileItem, b: &FileItem) -> Ordering {
    compare_entries(a.kind, &a.name, b.kind, &b.name)
}
