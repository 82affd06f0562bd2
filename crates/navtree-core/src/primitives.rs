//! # Engine Primitives
//!
//! Fixed runtime constants for the navtree engine.
//!
//! These values are compiled into the binary and are immutable at runtime.

/// Prefix of permission keys derived from a menu code (`menu:<code>`).
pub const PERMISSION_KEY_PREFIX: &str = "menu:";

/// Remark attached to the audit records of cascaded deletes.
pub const CASCADE_REMARK: &str = "cascade";

/// Remark attached to audit records written by definition sync.
pub const SYNC_REMARK: &str = "sync";

// =============================================================================
// PAGINATION
// =============================================================================

/// Page size used when a query does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Upper bound on a requested page size.
pub const MAX_PAGE_SIZE: usize = 100;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for `name` and `code`.
pub const MAX_NAME_LENGTH: usize = 128;

/// Maximum length for `path`, `route_name`, `component_key`,
/// `permission_key` and `icon`.
pub const MAX_FIELD_LENGTH: usize = 255;

/// Maximum length for `external_url`.
pub const MAX_URL_LENGTH: usize = 1024;

/// Maximum number of entries in a single reorder batch.
pub const MAX_REORDER_BATCH: usize = 1000;
