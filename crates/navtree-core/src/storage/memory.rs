//! # In-Memory Adapters
//!
//! BTreeMap-backed implementations of the storage ports. Used by tests,
//! the benchmark and the `memory` backend of the server.
//!
//! `commit` stages every write on a copy of the tables and swaps the copy
//! in only when the whole batch applied cleanly.

use crate::audit::{AuditPage, AuditQuery, AuditRecord, NewAuditRecord};
use crate::repository::{AuditLog, MenuRepository, MenuWrite};
use crate::{AuditId, MenuError, MenuId, MenuNode};
use std::collections::BTreeMap;

// =============================================================================
// MENU STORE
// =============================================================================

/// In-memory menu rows with a live-code index.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// All rows, soft-deleted ones included.
    rows: BTreeMap<MenuId, MenuNode>,
    /// Live code -> id.
    codes: BTreeMap<String, MenuId>,
    /// Last id handed out.
    last_id: u64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows, soft-deleted included.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn apply(&mut self, write: MenuWrite) -> Result<(), MenuError> {
        match write {
            MenuWrite::Insert(node) => {
                if self.rows.contains_key(&node.id) {
                    return Err(MenuError::Validation(format!(
                        "menu id {} already exists",
                        node.id
                    )));
                }
                if node.is_live() {
                    if self.codes.contains_key(&node.code) {
                        return Err(MenuError::CodeExists(node.code));
                    }
                    self.codes.insert(node.code.clone(), node.id);
                }
                self.last_id = self.last_id.max(node.id.0);
                self.rows.insert(node.id, node);
            }
            MenuWrite::Update(node) => {
                let current = self
                    .rows
                    .get(&node.id)
                    .filter(|n| n.is_live())
                    .ok_or(MenuError::MenuNotFound(node.id))?;
                if current.code != node.code {
                    if self.codes.contains_key(&node.code) {
                        return Err(MenuError::CodeExists(node.code));
                    }
                    let old = current.code.clone();
                    self.codes.remove(&old);
                    self.codes.insert(node.code.clone(), node.id);
                }
                self.rows.insert(node.id, node);
            }
            MenuWrite::SoftDelete { id, at, by } => {
                let row = self
                    .rows
                    .get_mut(&id)
                    .filter(|n| n.is_live())
                    .ok_or(MenuError::MenuNotFound(id))?;
                row.deleted_at = Some(at);
                row.updated_at = at;
                row.updated_by = by;
                let code = row.code.clone();
                self.codes.remove(&code);
            }
        }
        Ok(())
    }
}

impl MenuRepository for MemoryStore {
    fn find(&self, id: MenuId) -> Result<Option<MenuNode>, MenuError> {
        Ok(self.rows.get(&id).filter(|n| n.is_live()).cloned())
    }

    fn find_by_code(&self, code: &str) -> Result<Option<MenuNode>, MenuError> {
        match self.codes.get(code) {
            Some(id) => self.find(*id),
            None => Ok(None),
        }
    }

    fn live_nodes(&self) -> Result<Vec<MenuNode>, MenuError> {
        Ok(self.rows.values().filter(|n| n.is_live()).cloned().collect())
    }

    fn allocate_id(&mut self) -> Result<MenuId, MenuError> {
        self.last_id = self.last_id.saturating_add(1);
        Ok(MenuId(self.last_id))
    }

    fn commit(&mut self, writes: Vec<MenuWrite>) -> Result<(), MenuError> {
        let mut staged = self.clone();
        for write in writes {
            staged.apply(write)?;
        }
        *self = staged;
        Ok(())
    }

    fn live_count(&self) -> Result<usize, MenuError> {
        Ok(self.codes.len())
    }
}

// =============================================================================
// AUDIT LOG
// =============================================================================

/// In-memory append-only audit log.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLog {
    records: Vec<AuditRecord>,
}

impl MemoryAuditLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&mut self, record: NewAuditRecord) -> Result<AuditRecord, MenuError> {
        let id = AuditId(self.records.len() as u64 + 1);
        let stored = record.into_record(id);
        self.records.push(stored.clone());
        Ok(stored)
    }

    fn query(&self, query: &AuditQuery) -> Result<AuditPage, MenuError> {
        Ok(query.paginate(self.records.iter().cloned()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
