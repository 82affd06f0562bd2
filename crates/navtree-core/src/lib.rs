//! # navtree-core
//!
//! The menu hierarchy engine for Navtree.
//!
//! This crate owns the navigation tree of a management console: nodes,
//! their parent/child structure, sibling ordering, permission binding,
//! the risk inspection report and the audit trail of every change.
//!
//! ## Layout
//!
//! - `types` holds the menu node, actor and error types
//! - `repository` defines the storage seams; `storage` implements them
//!   in memory and on top of redb
//! - `mutation` validates and applies every write through [`MenuEngine`]
//! - `query`, `tree` and `inspection` serve the read side
//! - `audit` builds snapshots, field diffs and paged audit queries
//! - `sync` seeds a tree from a nested definition file
//!
//! ## Constraints
//!
//! - Every write is a single storage transaction
//! - Audit failures never fail the write they describe
//! - No async, no network dependencies

// =============================================================================
// MODULES
// =============================================================================

pub mod audit;
pub mod cycle;
pub mod inspection;
pub mod mutation;
pub mod permission;
pub mod primitives;
pub mod query;
pub mod repository;
pub mod storage;
pub mod sync;
pub mod tree;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Actor, AuditId, ErrorCategory, MenuError, MenuId, MenuKind, MenuNode, OpenMode,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use mutation::{
    CreateMenu, DeleteImpact, MenuEngine, MenuPatch, PermissionBinding, ReorderEntry,
    ReorderItemError, ReorderOutcome,
};
pub use query::{MenuDetail, MenuView};
pub use tree::{MenuFilter, PermissionBind, TreeView, build_tree};

// =============================================================================
// RE-EXPORTS: Audit, Inspection, Storage
// =============================================================================

pub use audit::{
    AuditOperation, AuditPage, AuditQuery, AuditRecord, AuditSummary, FieldDiff, NewAuditRecord,
    Snapshot,
};
pub use inspection::{MenuStats, RiskIndex, RiskItem, RiskType};
pub use permission::{DerivedPermissions, PermissionProvisioner};
pub use repository::{AuditLog, MenuRepository, MenuWrite};
pub use storage::{MemoryAuditLog, MemoryStore, RedbStore};
pub use sync::{MenuDefinition, SyncFailure, SyncReport, parse_definitions, sync_definitions};
