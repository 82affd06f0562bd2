//! # Tree Assembler
//!
//! Converts a flat, possibly filtered node list into a forest of
//! [`TreeView`]s.
//!
//! ## Algorithm
//!
//! 1. Index nodes by id.
//! 2. Compute each node's depth by walking `parent_id` inside the input
//!    (memoized; a chain that revisits a node is treated as depth 0).
//! 3. Visit nodes in descending depth, so a child's subtree is complete
//!    before it is attached to its parent.
//! 4. Sort every children list and the root list by `order`, stable on ties.
//!
//! `children_count` and `risk_flags` are computed against the same input,
//! so a filtered query reports values consistent with the filtered view.
//! Ancestors missing from the input are never synthesized: a node whose
//! parent is absent is emitted at the top level.

use crate::inspection::{RiskIndex, RiskType};
use crate::{MenuError, MenuId, MenuKind, MenuNode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

// =============================================================================
// FILTER
// =============================================================================

/// Whether a node has a non-empty permission key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionBind {
    Bound,
    Unbound,
}

impl FromStr for PermissionBind {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bound" => Ok(Self::Bound),
            "unbound" => Ok(Self::Unbound),
            other => Err(MenuError::Validation(format!(
                "permission_bind must be bound or unbound, got {other}"
            ))),
        }
    }
}

/// Filter applied to live nodes before tree assembly.
///
/// Every `None` field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuFilter {
    /// Trimmed, case-insensitive substring of name, code, path or
    /// permission key.
    pub keyword: Option<String>,
    pub kind: Option<MenuKind>,
    pub group_id: Option<String>,
    pub enabled: Option<bool>,
    pub visible: Option<bool>,
    pub permission_bind: Option<PermissionBind>,
}

impl MenuFilter {
    /// Check whether a node passes every filter.
    #[must_use]
    pub fn matches(&self, node: &MenuNode) -> bool {
        if let Some(keyword) = self.keyword_needle()
            && !keyword_hit(node, &keyword)
        {
            return false;
        }
        self.kind.is_none_or(|k| node.kind == k)
            && self
                .group_id
                .as_deref()
                .is_none_or(|g| node.group_id.as_deref() == Some(g))
            && self.enabled.is_none_or(|e| node.enabled == e)
            && self.visible.is_none_or(|v| node.visible == v)
            && self.permission_bind.is_none_or(|b| match b {
                PermissionBind::Bound => node.has_permission(),
                PermissionBind::Unbound => !node.has_permission(),
            })
    }

    fn keyword_needle(&self) -> Option<String> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_lowercase)
    }
}

fn keyword_hit(node: &MenuNode, needle: &str) -> bool {
    let hit = |s: &str| s.to_lowercase().contains(needle);
    hit(&node.name)
        || hit(&node.code)
        || node.path.as_deref().is_some_and(hit)
        || node.permission_key.as_deref().is_some_and(hit)
}

// =============================================================================
// TREE VIEW
// =============================================================================

/// A node with its derived fields and assembled children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeView {
    #[serde(flatten)]
    pub node: MenuNode,
    /// Direct children present in the same input.
    pub children_count: usize,
    pub risk_flags: Vec<RiskType>,
    pub children: Vec<TreeView>,
}

impl TreeView {
    /// Total number of nodes in this subtree, including self.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeView::size).sum::<usize>()
    }
}

// =============================================================================
// ASSEMBLY
// =============================================================================

/// Assemble a flat node list into a forest.
#[must_use]
pub fn build_tree(nodes: &[MenuNode]) -> Vec<TreeView> {
    let risks = RiskIndex::build(nodes);
    let index: BTreeMap<MenuId, &MenuNode> = nodes.iter().map(|n| (n.id, n)).collect();
    let depths = compute_depths(&index);

    let mut pending: BTreeMap<MenuId, TreeView> = nodes
        .iter()
        .map(|n| {
            (
                n.id,
                TreeView {
                    node: n.clone(),
                    children_count: 0,
                    risk_flags: risks.flags_for(n),
                    children: Vec::new(),
                },
            )
        })
        .collect();

    // Stable: equal depths keep input order.
    let mut visit: Vec<MenuId> = nodes.iter().map(|n| n.id).collect();
    visit.sort_by_key(|id| std::cmp::Reverse(depths.get(id).copied().unwrap_or(0)));

    let mut roots = Vec::new();
    for id in visit {
        let Some(mut view) = pending.remove(&id) else {
            // Duplicate id in the input; first occurrence wins.
            continue;
        };
        view.children.sort_by_key(|c| c.node.order);
        view.children_count = view.children.len();

        let parent = view.node.parent_id.filter(|p| *p != id);
        match parent.and_then(|p| pending.get_mut(&p)) {
            Some(p) => p.children.push(view),
            None => roots.push(view),
        }
    }

    roots.sort_by_key(|r| r.node.order);
    roots
}

/// Depth of every indexed node, counting only parents inside the index.
fn compute_depths(index: &BTreeMap<MenuId, &MenuNode>) -> BTreeMap<MenuId, usize> {
    let mut memo: BTreeMap<MenuId, usize> = BTreeMap::new();

    for &start in index.keys() {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut cursor = Some(start);
        let mut base = 0;
        let mut cyclic = false;

        while let Some(id) = cursor {
            if let Some(&d) = memo.get(&id) {
                base = d + 1;
                break;
            }
            if !seen.insert(id) {
                cyclic = true;
                break;
            }
            chain.push(id);
            cursor = index
                .get(&id)
                .and_then(|n| n.parent_id)
                .filter(|p| index.contains_key(p));
        }

        for (offset, id) in chain.into_iter().rev().enumerate() {
            memo.insert(id, if cyclic { 0 } else { base + offset });
        }
    }

    memo
}

// =============================================================================
// TESTS
// =============================================================================
