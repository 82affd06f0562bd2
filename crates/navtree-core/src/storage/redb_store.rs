//! # redb-backed Menu Storage
//!
//! A disk-backed store using the redb embedded database, providing:
//! - ACID transactions (one write transaction per `commit`)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! One `RedbStore` serves as both [`MenuRepository`] and [`AuditLog`].
//! Clones share the same database handle and keep no state of their own,
//! so id counters live in the `metadata` table.

use crate::audit::{AuditPage, AuditQuery, AuditRecord, NewAuditRecord};
use crate::repository::{AuditLog, MenuRepository, MenuWrite};
use crate::{AuditId, MenuError, MenuId, MenuNode};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::Arc;

/// Table for menus: MenuId(u64) -> postcard-encoded MenuNode
const MENUS: TableDefinition<u64, &[u8]> = TableDefinition::new("menus");

/// Table for the live-code index: code -> MenuId(u64)
const MENU_CODES: TableDefinition<&str, u64> = TableDefinition::new("menu_codes");

/// Table for audit records: AuditId(u64) -> JSON-encoded AuditRecord
///
/// JSON rather than postcard: snapshots hold `serde_json::Value`s, which
/// need a self-describing format to decode.
const AUDIT_LOG: TableDefinition<u64, &[u8]> = TableDefinition::new("audit_log");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_MENU_ID: &str = "next_menu_id";
const NEXT_AUDIT_ID: &str = "next_audit_id";

/// A disk-backed menu repository and audit log.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a menu database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MenuError> {
        let db = Database::create(path.as_ref()).map_err(|e| MenuError::Storage(e.to_string()))?;

        // Initialize tables if they don't exist
        let write_txn = db
            .begin_write()
            .map_err(|e| MenuError::Storage(e.to_string()))?;
        {
            let _ = write_txn
                .open_table(MENUS)
                .map_err(|e| MenuError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(MENU_CODES)
                .map_err(|e| MenuError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(AUDIT_LOG)
                .map_err(|e| MenuError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| MenuError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| MenuError::Storage(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), "opened menu database");
        Ok(Self { db: Arc::new(db) })
    }

    /// Reserve the next value of a metadata counter.
    fn next_counter(&self, key: &str) -> Result<u64, MenuError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| MenuError::Storage(e.to_string()))?;
        let next = {
            let mut meta = write_txn
                .open_table(METADATA)
                .map_err(|e| MenuError::Storage(e.to_string()))?;
            let current = meta
                .get(key)
                .map_err(|e| MenuError::Storage(e.to_string()))?
                .map(|v| v.value())
                .unwrap_or(0);
            let next = current.saturating_add(1);
            meta.insert(key, next)
                .map_err(|e| MenuError::Storage(e.to_string()))?;
            next
        };
        write_txn
            .commit()
            .map_err(|e| MenuError::Storage(e.to_string()))?;
        Ok(next)
    }
}

fn decode_menu(bytes: &[u8]) -> Result<MenuNode, MenuError> {
    postcard::from_bytes(bytes).map_err(|e| MenuError::Serialization(e.to_string()))
}

fn encode_menu(node: &MenuNode) -> Result<Vec<u8>, MenuError> {
    postcard::to_allocvec(node).map_err(|e| MenuError::Serialization(e.to_string()))
}

fn load_menu(
    menus: &impl ReadableTable<u64, &'static [u8]>,
    id: MenuId,
) -> Result<Option<MenuNode>, MenuError> {
    let row = menus
        .get(id.0)
        .map_err(|e| MenuError::Storage(e.to_string()))?;
    match row {
        Some(bytes) => decode_menu(bytes.value()).map(Some),
        None => Ok(None),
    }
}

// =============================================================================
// MENU REPOSITORY IMPLEMENTATION
// =============================================================================

impl MenuRepository for RedbStore {
    fn find(&self, id: MenuId) -> Result<Option<MenuNode>, MenuError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MenuError::Storage(e.to_string()))?;
        let menus = read_txn
            .open_table(MENUS)
            .map_err(|e| MenuError::Storage(e.to_string()))?;
        let row = menus
            .get(id.0)
            .map_err(|e| MenuError::Storage(e.to_string()))?;
        match row {
            Some(bytes) => Ok(Some(decode_menu(bytes.value())?).filter(MenuNode::is_live)),
            None => Ok(None),
        }
    }

    fn find_by_code(&self, code: &str) -> Result<Option<MenuNode>, MenuError> {
        let id = {
            let read_txn = self
                .db
                .begin_read()
                .map_err(|e| MenuError::Storage(e.to_string()))?;
            let codes = read_txn
                .open_table(MENU_CODES)
                .map_err(|e| MenuError::Storage(e.to_string()))?;
            codes
                .get(code)
                .map_err(|e| MenuError::Storage(e.to_string()))?
                .map(|v| MenuId(v.value()))
        };
        match id {
            Some(id) => self.find(id),
            None => Ok(None),
        }
    }

    fn live_nodes(&self) -> Result<Vec<MenuNode>, MenuError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MenuError::Storage(e.to_string()))?;
        let menus = read_txn
            .open_table(MENUS)
            .map_err(|e| MenuError::Storage(e.to_string()))?;

        let mut nodes = Vec::new();
        for entry in menus
            .iter()
            .map_err(|e| MenuError::Storage(e.to_string()))?
        {
            let (_, value) = entry.map_err(|e| MenuError::Storage(e.to_string()))?;
            let node = decode_menu(value.value())?;
            if node.is_live() {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    fn live_count(&self) -> Result<usize, MenuError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MenuError::Storage(e.to_string()))?;
        let codes = read_txn
            .open_table(MENU_CODES)
            .map_err(|e| MenuError::Storage(e.to_string()))?;
        let len = codes
            .len()
            .map_err(|e| MenuError::Storage(e.to_string()))?;
        Ok(len as usize)
    }

    fn allocate_id(&mut self) -> Result<MenuId, MenuError> {
        self.next_counter(NEXT_MENU_ID).map(MenuId)
    }

    fn commit(&mut self, writes: Vec<MenuWrite>) -> Result<(), MenuError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| MenuError::Storage(e.to_string()))?;

        // Any early return drops the transaction, which aborts it.
        {
            let mut menus = write_txn
                .open_table(MENUS)
                .map_err(|e| MenuError::Storage(e.to_string()))?;
            let mut codes = write_txn
                .open_table(MENU_CODES)
                .map_err(|e| MenuError::Storage(e.to_string()))?;

            for write in writes {
                match write {
                    MenuWrite::Insert(node) => {
                        if load_menu(&menus, node.id)?.is_some() {
                            return Err(MenuError::Validation(format!(
                                "menu id {} already exists",
                                node.id
                            )));
                        }
                        if node.is_live() {
                            let taken = codes
                                .get(node.code.as_str())
                                .map_err(|e| MenuError::Storage(e.to_string()))?
                                .is_some();
                            if taken {
                                return Err(MenuError::CodeExists(node.code));
                            }
                            codes
                                .insert(node.code.as_str(), node.id.0)
                                .map_err(|e| MenuError::Storage(e.to_string()))?;
                        }
                        let bytes = encode_menu(&node)?;
                        menus
                            .insert(node.id.0, bytes.as_slice())
                            .map_err(|e| MenuError::Storage(e.to_string()))?;
                    }
                    MenuWrite::Update(node) => {
                        let current = load_menu(&menus, node.id)?
                            .filter(MenuNode::is_live)
                            .ok_or(MenuError::MenuNotFound(node.id))?;
                        if current.code != node.code {
                            let taken = codes
                                .get(node.code.as_str())
                                .map_err(|e| MenuError::Storage(e.to_string()))?
                                .is_some();
                            if taken {
                                return Err(MenuError::CodeExists(node.code));
                            }
                            codes
                                .remove(current.code.as_str())
                                .map_err(|e| MenuError::Storage(e.to_string()))?;
                            codes
                                .insert(node.code.as_str(), node.id.0)
                                .map_err(|e| MenuError::Storage(e.to_string()))?;
                        }
                        let bytes = encode_menu(&node)?;
                        menus
                            .insert(node.id.0, bytes.as_slice())
                            .map_err(|e| MenuError::Storage(e.to_string()))?;
                    }
                    MenuWrite::SoftDelete { id, at, by } => {
                        let mut row = load_menu(&menus, id)?
                            .filter(MenuNode::is_live)
                            .ok_or(MenuError::MenuNotFound(id))?;
                        row.deleted_at = Some(at);
                        row.updated_at = at;
                        row.updated_by = by;
                        codes
                            .remove(row.code.as_str())
                            .map_err(|e| MenuError::Storage(e.to_string()))?;
                        let bytes = encode_menu(&row)?;
                        menus
                            .insert(id.0, bytes.as_slice())
                            .map_err(|e| MenuError::Storage(e.to_string()))?;
                    }
                }
            }
        }

        write_txn
            .commit()
            .map_err(|e| MenuError::Storage(e.to_string()))
    }
}

// =============================================================================
// AUDIT LOG IMPLEMENTATION
// =============================================================================

impl AuditLog for RedbStore {
    fn append(&mut self, record: NewAuditRecord) -> Result<AuditRecord, MenuError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| MenuError::Storage(e.to_string()))?;
        let stored = {
            let mut meta = write_txn
                .open_table(METADATA)
                .map_err(|e| MenuError::Storage(e.to_string()))?;
            let id = meta
                .get(NEXT_AUDIT_ID)
                .map_err(|e| MenuError::Storage(e.to_string()))?
                .map(|v| v.value())
                .unwrap_or(0)
                .saturating_add(1);
            meta.insert(NEXT_AUDIT_ID, id)
                .map_err(|e| MenuError::Storage(e.to_string()))?;
            let stored = record.into_record(AuditId(id));

            let bytes = serde_json::to_vec(&stored)
                .map_err(|e| MenuError::Serialization(e.to_string()))?;
            let mut audits = write_txn
                .open_table(AUDIT_LOG)
                .map_err(|e| MenuError::Storage(e.to_string()))?;
            audits
                .insert(id, bytes.as_slice())
                .map_err(|e| MenuError::Storage(e.to_string()))?;
            stored
        };
        write_txn
            .commit()
            .map_err(|e| MenuError::Storage(e.to_string()))?;
        Ok(stored)
    }

    fn query(&self, query: &AuditQuery) -> Result<AuditPage, MenuError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MenuError::Storage(e.to_string()))?;
        let audits = read_txn
            .open_table(AUDIT_LOG)
            .map_err(|e| MenuError::Storage(e.to_string()))?;

        let mut records = Vec::new();
        for entry in audits
            .iter()
            .map_err(|e| MenuError::Storage(e.to_string()))?
        {
            let (_, value) = entry.map_err(|e| MenuError::Storage(e.to_string()))?;
            let record: AuditRecord = serde_json::from_slice(value.value())
                .map_err(|e| MenuError::Serialization(e.to_string()))?;
            if query.matches(&record) {
                records.push(record);
            }
        }
        Ok(query.paginate(records))
    }
}

// =============================================================================
// TESTS
// =============================================================================
