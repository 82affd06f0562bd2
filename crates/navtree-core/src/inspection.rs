//! # Inspection Engine
//!
//! Whole-tree risk analysis. Risks are discoverable structural issues that
//! are not enforced at write time for pre-existing data:
//!
//! 1. `UNBOUND_PERMISSION`: a node with an absent or empty permission key.
//! 2. `ROUTE_CONFLICT`: a non-empty `path` or `route_name` shared by more
//!    than one node. A node colliding on both gets the flag twice.
//! 3. `ORDER_CONFLICT`: siblings (root counts as one parent) sharing an
//!    `order` value.
//!
//! Per-node flags and the whole-tree report both read one [`RiskIndex`], so
//! they agree for the same ambient node set.

use crate::{MenuId, MenuNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// RISK TYPES
// =============================================================================

/// The three risk categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskType {
    UnboundPermission,
    RouteConflict,
    OrderConflict,
}

impl RiskType {
    /// Wire name of the risk.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnboundPermission => "UNBOUND_PERMISSION",
            Self::RouteConflict => "ROUTE_CONFLICT",
            Self::OrderConflict => "ORDER_CONFLICT",
        }
    }
}

/// One entry of an inspection report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskItem {
    pub menu_id: MenuId,
    pub menu_name: String,
    pub menu_code: String,
    pub risk_type: RiskType,
    pub description: String,
}

impl RiskItem {
    fn new(node: &MenuNode, risk_type: RiskType, description: String) -> Self {
        Self {
            menu_id: node.id,
            menu_name: node.name.clone(),
            menu_code: node.code.clone(),
            risk_type,
            description,
        }
    }
}

// =============================================================================
// RISK INDEX
// =============================================================================

/// Nodes grouped by every key a risk rule looks at.
#[derive(Debug)]
pub struct RiskIndex<'a> {
    /// Ordered by id.
    nodes: Vec<&'a MenuNode>,
    by_path: BTreeMap<&'a str, Vec<&'a MenuNode>>,
    by_route_name: BTreeMap<&'a str, Vec<&'a MenuNode>>,
    /// `None` parent is the root bucket.
    by_order: BTreeMap<(Option<MenuId>, i64), Vec<&'a MenuNode>>,
}

impl<'a> RiskIndex<'a> {
    /// Group the ambient node set once.
    #[must_use]
    pub fn build(nodes: &'a [MenuNode]) -> Self {
        let mut sorted: Vec<&MenuNode> = nodes.iter().collect();
        sorted.sort_by_key(|n| n.id);

        let mut by_path: BTreeMap<&str, Vec<&MenuNode>> = BTreeMap::new();
        let mut by_route_name: BTreeMap<&str, Vec<&MenuNode>> = BTreeMap::new();
        let mut by_order: BTreeMap<(Option<MenuId>, i64), Vec<&MenuNode>> = BTreeMap::new();

        for node in &sorted {
            if let Some(path) = non_empty(node.path.as_deref()) {
                by_path.entry(path).or_default().push(node);
            }
            if let Some(route) = non_empty(node.route_name.as_deref()) {
                by_route_name.entry(route).or_default().push(node);
            }
            by_order
                .entry((node.parent_id, node.order))
                .or_default()
                .push(node);
        }

        Self {
            nodes: sorted,
            by_path,
            by_route_name,
            by_order,
        }
    }

    /// Flags of a single node, in rule order.
    ///
    /// The node is judged against the indexed set; a node absent from the
    /// set only ever collides with members of it.
    #[must_use]
    pub fn flags_for(&self, node: &MenuNode) -> Vec<RiskType> {
        let mut flags = Vec::new();
        if !node.has_permission() {
            flags.push(RiskType::UnboundPermission);
        }
        if let Some(path) = non_empty(node.path.as_deref())
            && collides(self.by_path.get(path), node.id)
        {
            flags.push(RiskType::RouteConflict);
        }
        if let Some(route) = non_empty(node.route_name.as_deref())
            && collides(self.by_route_name.get(route), node.id)
        {
            flags.push(RiskType::RouteConflict);
        }
        if collides(self.by_order.get(&(node.parent_id, node.order)), node.id) {
            flags.push(RiskType::OrderConflict);
        }
        flags
    }

    /// Full risk report: unbound pass, then path groups, route-name groups
    /// and order groups. Groups come in key order, members by id.
    #[must_use]
    pub fn inspect(&self) -> Vec<RiskItem> {
        let mut items = Vec::new();

        for node in self.nodes.iter().filter(|n| !n.has_permission()) {
            items.push(RiskItem::new(
                node,
                RiskType::UnboundPermission,
                "No permission key is bound".to_string(),
            ));
        }

        for (path, group) in self.by_path.iter().filter(|(_, g)| g.len() > 1) {
            for node in group {
                items.push(RiskItem::new(
                    node,
                    RiskType::RouteConflict,
                    format!("Path {} is shared by {} menus", path, group.len()),
                ));
            }
        }

        for (route, group) in self.by_route_name.iter().filter(|(_, g)| g.len() > 1) {
            for node in group {
                items.push(RiskItem::new(
                    node,
                    RiskType::RouteConflict,
                    format!("Route name {} is shared by {} menus", route, group.len()),
                ));
            }
        }

        for ((_, order), group) in self.by_order.iter().filter(|(_, g)| g.len() > 1) {
            for node in group {
                items.push(RiskItem::new(
                    node,
                    RiskType::OrderConflict,
                    format!("Order {} is shared by {} siblings", order, group.len()),
                ));
            }
        }

        items
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// A group collides for `id` if it holds any other member.
fn collides(group: Option<&Vec<&MenuNode>>, id: MenuId) -> bool {
    group.is_some_and(|g| g.iter().any(|n| n.id != id))
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Aggregate counts over live nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuStats {
    pub total: usize,
    pub enabled: usize,
    /// Nodes with `visible == false`.
    pub hidden: usize,
    pub unbound_permission: usize,
}

impl MenuStats {
    /// Count over a node set.
    #[must_use]
    pub fn collect(nodes: &[MenuNode]) -> Self {
        nodes.iter().fold(Self::default(), |mut s, n| {
            s.total += 1;
            s.enabled += usize::from(n.enabled);
            s.hidden += usize::from(!n.visible);
            s.unbound_permission += usize::from(!n.has_permission());
            s
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
