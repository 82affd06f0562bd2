//! # Read Queries
//!
//! Read paths of [`MenuEngine`]. None of them write, and each reflects the
//! repository's result set as-is at the time of the call.

use crate::audit::{AuditPage, AuditQuery, AuditSummary};
use crate::inspection::{MenuStats, RiskIndex, RiskItem, RiskType};
use crate::mutation::MenuEngine;
use crate::tree::{MenuFilter, TreeView, build_tree};
use crate::{MenuError, MenuId, MenuNode};
use serde::Serialize;

/// A single node with its derived fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuView {
    #[serde(flatten)]
    pub node: MenuNode,
    /// Live direct children in the whole tree.
    pub children_count: usize,
    /// Flags against every live node.
    pub risk_flags: Vec<RiskType>,
}

/// [`MenuView`] plus the most recent audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuDetail {
    #[serde(flatten)]
    pub view: MenuView,
    pub last_audit: Option<AuditSummary>,
}

impl MenuEngine {
    /// Fetch one menu with derived fields and its latest audit summary.
    pub fn get_menu(&self, id: MenuId) -> Result<MenuDetail, MenuError> {
        let node = self.repo.find(id)?.ok_or(MenuError::MenuNotFound(id))?;
        let view = self.describe(node)?;
        let last_audit = match self.audit.latest_for(id) {
            Ok(record) => record.as_ref().map(AuditSummary::from),
            Err(e) => {
                tracing::warn!(menu_id = id.0, error = %e, "failed to read audit summary");
                None
            }
        };
        Ok(MenuDetail { view, last_audit })
    }

    /// Attach live child count and risk flags to a node.
    pub fn describe(&self, node: MenuNode) -> Result<MenuView, MenuError> {
        let all = self.repo.live_nodes()?;
        let risk_flags = RiskIndex::build(&all).flags_for(&node);
        let children_count = self.repo.count_children(node.id)?;
        Ok(MenuView {
            node,
            children_count,
            risk_flags,
        })
    }

    /// Filtered live nodes assembled into a forest.
    pub fn get_tree(&self, filter: &MenuFilter) -> Result<Vec<TreeView>, MenuError> {
        let nodes = self.repo.find_all(filter)?;
        Ok(build_tree(&nodes))
    }

    /// Risk report over every live node.
    pub fn inspect(&self) -> Result<Vec<RiskItem>, MenuError> {
        let nodes = self.repo.live_nodes()?;
        Ok(RiskIndex::build(&nodes).inspect())
    }

    /// Aggregate counts over live nodes.
    pub fn stats(&self) -> Result<MenuStats, MenuError> {
        Ok(MenuStats::collect(&self.repo.live_nodes()?))
    }

    /// Audit records, newest first.
    pub fn audit_log(&self, query: &AuditQuery) -> Result<AuditPage, MenuError> {
        self.audit.query(query)
    }
}
