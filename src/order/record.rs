//! Order record mutations
//!
//! Pure functions over one directory's ordered child names. Each returns the next
//! order, or `None` when the record would not change, so the store can skip writes.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Kind of change applied to an order record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Add,
    Remove,
    Update,
    Swap,
    Move,
}

fn invalid(message: impl Into<String>) -> ApiError {
    ApiError::InvalidOperation(message.into())
}

/// Argument checks for the single-item form that need no record
pub fn check_single(kind: ChangeKind, index: Option<usize>, other: Option<usize>) -> Result<(), ApiError> {
    match kind {
        ChangeKind::Add | ChangeKind::Update if index.is_none() => {
            Err(invalid(format!("{:?} requires an index", kind)))
        }
        ChangeKind::Swap if index.is_none() || other.is_none() => {
            Err(invalid("Swap requires two indices"))
        }
        ChangeKind::Move => Err(invalid("Move is only supported as a batch change")),
        _ => Ok(()),
    }
}

/// Argument checks for the batch form that need no record
pub fn check_batch(
    kind: ChangeKind,
    name_count: usize,
    indices: &[usize],
    destination: Option<usize>,
) -> Result<(), ApiError> {
    match kind {
        ChangeKind::Swap => Err(invalid(
            "Swap is not supported as a batch change; use the single-item form",
        )),
        ChangeKind::Add | ChangeKind::Update if name_count != indices.len() => Err(invalid(format!(
            "{:?} needs one index per item ({} items, {} indices)",
            kind,
            name_count,
            indices.len()
        ))),
        ChangeKind::Move if destination.is_none() => Err(invalid("Move requires a destination")),
        _ => Ok(()),
    }
}

fn check_index(order: &[String], index: usize) -> Result<(), ApiError> {
    if index >= order.len() {
        return Err(invalid(format!(
            "index {} out of range for order of length {}",
            index,
            order.len()
        )));
    }
    Ok(())
}

/// Apply a single-item change for `name`
pub fn apply_single(
    order: &[String],
    kind: ChangeKind,
    name: &str,
    index: Option<usize>,
    other: Option<usize>,
) -> Result<Option<Vec<String>>, ApiError> {
    check_single(kind, index, other)?;
    let mut next = order.to_vec();
    match (kind, index, other) {
        (ChangeKind::Add, Some(i), _) => {
            if i > next.len() {
                return Err(invalid(format!(
                    "insert index {} out of range for order of length {}",
                    i,
                    next.len()
                )));
            }
            next.insert(i, name.to_string());
        }
        (ChangeKind::Remove, Some(i), _) => {
            check_index(order, i)?;
            next.remove(i);
        }
        (ChangeKind::Remove, None, _) => match next.iter().position(|n| n == name) {
            Some(i) => {
                next.remove(i);
            }
            None => return Ok(None),
        },
        (ChangeKind::Update, Some(i), _) => {
            check_index(order, i)?;
            if next[i] == name {
                return Ok(None);
            }
            next[i] = name.to_string();
        }
        (ChangeKind::Swap, Some(i), Some(j)) => {
            check_index(order, i)?;
            check_index(order, j)?;
            if i == j {
                return Ok(None);
            }
            next.swap(i, j);
        }
        _ => return Err(invalid(format!("unsupported change {:?}", kind))),
    }
    Ok(Some(next))
}

/// Apply a batch change
///
/// Every index refers to a position in `order` as it was before the call.
/// Batch `Add` skips names the record already holds.
pub fn apply_batch(
    order: &[String],
    kind: ChangeKind,
    names: &[String],
    indices: &[usize],
    destination: Option<usize>,
) -> Result<Option<Vec<String>>, ApiError> {
    check_batch(kind, names.len(), indices, destination)?;
    if indices.is_empty() {
        return Ok(None);
    }

    let next = match kind {
        ChangeKind::Add => {
            if let Some(&i) = indices.iter().find(|&&i| i > order.len()) {
                return Err(invalid(format!(
                    "insert index {} out of range for order of length {}",
                    i,
                    order.len()
                )));
            }
            // a name already in the record keeps its place; no duplicates
            let mut present: HashSet<&str> = order.iter().map(String::as_str).collect();
            let mut next = Vec::with_capacity(order.len() + names.len());
            for position in 0..=order.len() {
                for (name, _) in names.iter().zip(indices).filter(|(_, i)| **i == position) {
                    if present.insert(name.as_str()) {
                        next.push(name.clone());
                    }
                }
                if let Some(existing) = order.get(position) {
                    next.push(existing.clone());
                }
            }
            next
        }
        ChangeKind::Update => {
            let mut next = order.to_vec();
            for (name, &i) in names.iter().zip(indices) {
                check_index(order, i)?;
                next[i] = name.clone();
            }
            next
        }
        ChangeKind::Remove => {
            let removed = checked_set(order, indices)?;
            order
                .iter()
                .enumerate()
                .filter(|(i, _)| !removed.contains(i))
                .map(|(_, n)| n.clone())
                .collect()
        }
        ChangeKind::Move => {
            let moved = checked_set(order, indices)?;
            let destination = destination.unwrap_or(order.len());
            if destination > order.len() {
                return Err(invalid(format!(
                    "move destination {} out of range for order of length {}",
                    destination,
                    order.len()
                )));
            }
            let mut next: Vec<String> = Vec::with_capacity(order.len());
            let mut inserted = false;
            for (i, name) in order.iter().enumerate() {
                if i == destination {
                    next.extend(moved.iter().map(|&m| order[m].clone()));
                    inserted = true;
                }
                if !moved.contains(&i) {
                    next.push(name.clone());
                }
            }
            if !inserted {
                next.extend(moved.iter().map(|&m| order[m].clone()));
            }
            next
        }
        ChangeKind::Swap => return Err(invalid("Swap is not supported as a batch change")),
    };

    Ok((next.as_slice() != order).then_some(next))
}

fn checked_set(order: &[String], indices: &[usize]) -> Result<BTreeSet<usize>, ApiError> {
    for &i in indices {
        check_index(order, i)?;
    }
    Ok(indices.iter().copied().collect())
}

/// Reconcile a record with the names currently on disk
///
/// Names gone from disk are dropped; new names are appended in disk order after
/// the retained custom order.
pub fn reconcile(order: &[String], actual: &[String]) -> Option<Vec<String>> {
    let present: HashSet<&str> = actual.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(actual.len());
    let mut next = Vec::with_capacity(actual.len());
    for name in order.iter().chain(actual) {
        if present.contains(name.as_str()) && seen.insert(name.as_str()) {
            next.push(name.clone());
        }
    }
    (next.as_slice() != order).then_some(next)
}
