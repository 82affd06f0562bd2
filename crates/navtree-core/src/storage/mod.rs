//! # Storage Adapters
//!
//! Implementations of the [`crate::repository`] ports:
//! - `MemoryStore` / `MemoryAuditLog`: volatile, BTreeMap-backed
//! - `RedbStore`: persistent, ACID, one handle for both ports

mod memory;
mod redb_store;

pub use memory::{MemoryAuditLog, MemoryStore};
pub use redb_store::RedbStore;
