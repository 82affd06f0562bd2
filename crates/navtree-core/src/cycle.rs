//! # Cycle Detector
//!
//! Decides whether giving `candidate` the parent `new_parent` would make
//! `candidate` its own ancestor.
//!
//! The walk starts at `new_parent` and follows `parent_id` upward. It is
//! bounded by the live node count and by a visited set, so it terminates
//! even when stored data already contains a loop.

use crate::repository::MenuRepository;
use crate::{MenuError, MenuId};
use std::collections::BTreeSet;

/// Check whether `new_parent` is `candidate` or one of its descendants.
///
/// A chain that reaches a missing or soft-deleted node ends there. A chain
/// that loops without passing through `candidate` is logged and reported as
/// no cycle: the loop predates this assignment.
pub fn would_cycle(
    repo: &dyn MenuRepository,
    candidate: MenuId,
    new_parent: MenuId,
) -> Result<bool, MenuError> {
    if candidate == new_parent {
        return Ok(true);
    }

    let limit = repo.live_count()?.saturating_add(1);
    let mut visited = BTreeSet::new();
    let mut cursor = Some(new_parent);
    let mut steps = 0usize;

    while let Some(id) = cursor {
        if id == candidate {
            return Ok(true);
        }
        if !visited.insert(id) || steps >= limit {
            tracing::warn!(
                start = new_parent.0,
                at = id.0,
                "ancestor chain loops; stored parent links are corrupt"
            );
            return Ok(false);
        }
        steps += 1;
        cursor = repo.find(id)?.and_then(|n| n.parent_id);
    }

    Ok(false)
}

// =============================================================================
// TESTS
// =============================================================================
