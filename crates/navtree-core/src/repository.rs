//! # Storage Ports
//!
//! The engine is written against two narrow traits instead of a storage
//! engine:
//!
//! - [`MenuRepository`]: lookups over live menu rows plus an atomic batch
//!   `commit`.
//! - [`AuditLog`]: append-only audit records with filtered, paginated reads.
//!
//! Adapters live in [`crate::storage`]: `MemoryStore` / `MemoryAuditLog`
//! (BTreeMap-backed) and `RedbStore` (disk-backed, ACID).

use crate::audit::{AuditPage, AuditQuery, AuditRecord, NewAuditRecord};
use crate::tree::MenuFilter;
use crate::{MenuError, MenuId, MenuNode};
use chrono::{DateTime, Utc};

// =============================================================================
// WRITES
// =============================================================================

/// One row change inside a [`MenuRepository::commit`] batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuWrite {
    /// Persist a new row. The id must come from `allocate_id`.
    Insert(MenuNode),
    /// Replace a live row.
    Update(MenuNode),
    /// Set the soft-delete marker on a live row and release its code.
    SoftDelete {
        id: MenuId,
        at: DateTime<Utc>,
        by: Option<String>,
    },
}

// =============================================================================
// MENU REPOSITORY
// =============================================================================

/// CRUD and query primitives over persisted menu rows.
///
/// Every lookup returns live rows only; soft-deleted rows are invisible.
/// Lists are ordered by id (creation order) unless stated otherwise.
pub trait MenuRepository: Send + Sync {
    /// Lookup a live node by id.
    fn find(&self, id: MenuId) -> Result<Option<MenuNode>, MenuError>;

    /// Lookup a live node by its unique code.
    fn find_by_code(&self, code: &str) -> Result<Option<MenuNode>, MenuError>;

    /// Every live node, ordered by id.
    fn live_nodes(&self) -> Result<Vec<MenuNode>, MenuError>;

    /// Reserve a fresh id. Ids are never reused, even if the reserving
    /// operation later fails validation.
    fn allocate_id(&mut self) -> Result<MenuId, MenuError>;

    /// Apply a batch of writes atomically: every write lands or none does.
    fn commit(&mut self, writes: Vec<MenuWrite>) -> Result<(), MenuError>;

    /// Live nodes whose `path` equals `path`. May return several rows when
    /// duplicates already exist.
    fn find_by_path(&self, path: &str) -> Result<Vec<MenuNode>, MenuError> {
        Ok(self
            .live_nodes()?
            .into_iter()
            .filter(|n| n.path.as_deref() == Some(path))
            .collect())
    }

    /// Live nodes whose `route_name` equals `route_name`.
    fn find_by_route_name(&self, route_name: &str) -> Result<Vec<MenuNode>, MenuError> {
        Ok(self
            .live_nodes()?
            .into_iter()
            .filter(|n| n.route_name.as_deref() == Some(route_name))
            .collect())
    }

    /// Live direct children of `parent`; `None` selects the root bucket.
    fn find_children(&self, parent: Option<MenuId>) -> Result<Vec<MenuNode>, MenuError> {
        Ok(self
            .live_nodes()?
            .into_iter()
            .filter(|n| n.parent_id == parent)
            .collect())
    }

    /// Number of live direct children of `parent`.
    fn count_children(&self, parent: MenuId) -> Result<usize, MenuError> {
        Ok(self.find_children(Some(parent))?.len())
    }

    /// Number of live nodes.
    fn live_count(&self) -> Result<usize, MenuError> {
        Ok(self.live_nodes()?.len())
    }

    /// Live nodes matching `filter`, ordered by `order` then id.
    fn find_all(&self, filter: &MenuFilter) -> Result<Vec<MenuNode>, MenuError> {
        let mut nodes: Vec<MenuNode> = self
            .live_nodes()?
            .into_iter()
            .filter(|n| filter.matches(n))
            .collect();
        nodes.sort_by_key(|n| (n.order, n.id));
        Ok(nodes)
    }
}

// =============================================================================
// AUDIT LOG
// =============================================================================

/// Append-only store of audit records.
pub trait AuditLog: Send + Sync {
    /// Persist a record and return it with its assigned id.
    fn append(&mut self, record: NewAuditRecord) -> Result<AuditRecord, MenuError>;

    /// Filtered records, newest first, one page at a time.
    fn query(&self, query: &AuditQuery) -> Result<AuditPage, MenuError>;

    /// The most recent record for a menu, if any.
    fn latest_for(&self, menu: MenuId) -> Result<Option<AuditRecord>, MenuError> {
        let page = self.query(&AuditQuery {
            page_size: 1,
            ..AuditQuery::for_menu(menu)
        })?;
        Ok(page.records.into_iter().next())
    }
}
