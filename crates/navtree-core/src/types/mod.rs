//! # Core Type Definitions
//!
//! This module contains the data model of the menu hierarchy:
//! - Identifiers (`MenuId`, `AuditId`)
//! - Menu attributes (`MenuKind`, `OpenMode`, `MenuNode`)
//! - Mutation attribution (`Actor`)
//! - Error types (`MenuError`, `ErrorCategory`)
//!
//! ## Optional Fields
//!
//! Every optional attribute is an `Option`. `None` means "unset" and is kept
//! distinct from `Some(String::new())`: required-field checks, risk flags and
//! audit diffs all depend on that difference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier of a menu node.
///
/// Allocated from a monotonically increasing counter owned by the store,
/// so the natural ordering of ids is creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MenuId(pub u64);

impl fmt::Display for MenuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AuditId(pub u64);

// =============================================================================
// MENU KIND
// =============================================================================

/// The kind of a menu node. Required fields depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuKind {
    /// Container for other menus. No extra required fields.
    Directory,
    /// Routed page. Requires `path`.
    Page,
    /// Link to an external site. Requires `external_url` and `open_mode`.
    External,
    /// In-page action, used for permission scoping only.
    Button,
}

impl MenuKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Page => "page",
            Self::External => "external",
            Self::Button => "button",
        }
    }
}

impl FromStr for MenuKind {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "directory" => Ok(Self::Directory),
            "page" => Ok(Self::Page),
            "external" => Ok(Self::External),
            "button" => Ok(Self::Button),
            other => Err(MenuError::InvalidKind(other.to_string())),
        }
    }
}

impl fmt::Display for MenuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// OPEN MODE
// =============================================================================

/// How an external menu is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// New browser tab.
    New,
    /// Embedded frame inside the console.
    Iframe,
    /// Same tab, replacing the console.
    Same,
}

impl OpenMode {
    /// Wire name of the open mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Iframe => "iframe",
            Self::Same => "same",
        }
    }
}

impl FromStr for OpenMode {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "iframe" => Ok(Self::Iframe),
            "same" => Ok(Self::Same),
            other => Err(MenuError::InvalidOpenMode(other.to_string())),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// MENU NODE
// =============================================================================

/// One entry in the navigation hierarchy.
///
/// Rows are never physically removed: deletion sets `deleted_at`, and every
/// repository lookup skips soft-deleted rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuNode {
    pub id: MenuId,
    pub name: String,
    /// Unique among live nodes, case-sensitive.
    pub code: String,
    #[serde(rename = "type")]
    pub kind: MenuKind,
    /// A child with a group must share the group of a grouped parent.
    pub group_id: Option<String>,
    /// `None` for root nodes.
    pub parent_id: Option<MenuId>,
    pub path: Option<String>,
    pub route_name: Option<String>,
    pub component_key: Option<String>,
    pub external_url: Option<String>,
    pub open_mode: Option<OpenMode>,
    pub permission_key: Option<String>,
    pub icon: Option<String>,
    pub visible: bool,
    pub enabled: bool,
    pub show_in_nav: bool,
    pub cacheable: bool,
    /// Sibling-scoped ordering value.
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MenuNode {
    /// Check whether the node is live (not soft-deleted).
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Check whether a non-empty permission key is bound.
    #[must_use]
    pub fn has_permission(&self) -> bool {
        self.permission_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Stamp the node as modified by `actor` at `at`.
    pub fn touch(&mut self, actor: &Actor, at: DateTime<Utc>) {
        self.updated_at = at;
        self.updated_by.clone_from(&actor.id);
    }

    /// Check the kind-specific required fields.
    ///
    /// | kind      | required            |
    /// |-----------|---------------------|
    /// | directory | -                   |
    /// | page      | path                |
    /// | external  | external_url, open_mode |
    /// | button    | -                   |
    pub fn check_required_fields(&self) -> Result<(), MenuError> {
        if self.name.trim().is_empty() {
            return Err(MenuError::MissingField {
                kind: self.kind,
                field: "name",
            });
        }
        if self.code.trim().is_empty() {
            return Err(MenuError::MissingField {
                kind: self.kind,
                field: "code",
            });
        }
        let missing = |value: Option<&str>| value.is_none_or(str::is_empty);
        match self.kind {
            MenuKind::Directory | MenuKind::Button => Ok(()),
            MenuKind::Page => {
                if missing(self.path.as_deref()) {
                    return Err(MenuError::MissingField {
                        kind: self.kind,
                        field: "path",
                    });
                }
                Ok(())
            }
            MenuKind::External => {
                if missing(self.external_url.as_deref()) {
                    return Err(MenuError::MissingField {
                        kind: self.kind,
                        field: "external_url",
                    });
                }
                if self.open_mode.is_none() {
                    return Err(MenuError::MissingField {
                        kind: self.kind,
                        field: "open_mode",
                    });
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// ACTOR
// =============================================================================

/// Who performed a mutation. Stamped onto rows and audit records.
///
/// Passed explicitly to every mutation. A system-initiated mutation uses
/// [`Actor::system`], which carries neither id nor name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl Actor {
    /// The anonymous system actor.
    #[must_use]
    pub fn system() -> Self {
        Self::default()
    }

    /// A named user.
    #[must_use]
    pub fn user(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: Some(id.into()),
            name,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Coarse error taxonomy, mapped to protocol status codes by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    ValidationFailed,
    PreconditionFailed,
    Internal,
}

/// Errors that can occur in the menu engine.
///
/// Validation and conflict errors are raised before any write, so they never
/// leave partial state behind.
#[derive(Debug, Error)]
pub enum MenuError {
    /// The subject menu does not exist (or is soft-deleted).
    #[error("Menu not found: {0}")]
    MenuNotFound(MenuId),

    /// The referenced parent does not exist (or is soft-deleted).
    #[error("Parent menu not found: {0}")]
    ParentNotFound(MenuId),

    /// Another live menu already uses this code.
    #[error("Menu code already exists: {0}")]
    CodeExists(String),

    /// Another live menu already uses this path or route name.
    #[error("Route conflict on {field}: {value}")]
    RouteConflict { field: &'static str, value: String },

    /// Two entries of one reorder batch request the same order.
    #[error("Sibling order conflict: {order}")]
    OrderConflict { order: i64 },

    /// Assigning the parent would make the menu its own ancestor.
    #[error("Cycle detected: {parent} cannot become the parent of {id}")]
    CycleDetected { id: MenuId, parent: MenuId },

    /// The menu's group differs from its parent's group.
    #[error("Group constraint violated: group {group} differs from parent group {parent_group}")]
    GroupConstraint { group: String, parent_group: String },

    /// Delete without cascade on a menu that still has live children.
    #[error("Menu has {0} children; delete with cascade to remove them")]
    HasChildren(usize),

    /// A field required by the menu kind is missing.
    #[error("Field {field} is required for {kind} menus")]
    MissingField { kind: MenuKind, field: &'static str },

    /// Unknown menu kind.
    #[error("Invalid menu type: {0}")]
    InvalidKind(String),

    /// Open mode is not one of new/iframe/same.
    #[error("Invalid open mode: {0} (expected new, iframe or same)")]
    InvalidOpenMode(String),

    /// Unknown audit operation name in a query.
    #[error("Invalid audit operation: {0}")]
    InvalidOperation(String),

    /// A reorder batch with no entries.
    #[error("Reorder batch is empty")]
    EmptyBatch,

    /// A reorder batch spanning more than one parent.
    #[error("Menus in a reorder batch must share one parent")]
    MixedParents,

    /// Any other malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Storage engine failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File or socket failure outside the storage engine.
    #[error("IO error: {0}")]
    Io(String),
}

impl MenuError {
    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MenuNotFound(_) => "MENU_NOT_FOUND",
            Self::ParentNotFound(_) => "MENU_PARENT_NOT_FOUND",
            Self::CodeExists(_) => "MENU_CODE_EXISTS",
            Self::RouteConflict { .. } => "MENU_ROUTE_CONFLICT",
            Self::OrderConflict { .. } => "MENU_ORDER_CONFLICT",
            Self::CycleDetected { .. } => "MENU_CYCLE_DETECTED",
            Self::GroupConstraint { .. } => "MENU_GROUP_CONSTRAINT",
            Self::HasChildren(_) => "MENU_HAS_CHILDREN",
            Self::MissingField { .. } => "MENU_FIELD_REQUIRED",
            Self::InvalidKind(_) => "MENU_TYPE_INVALID",
            Self::InvalidOpenMode(_) => "MENU_OPEN_MODE_INVALID",
            Self::InvalidOperation(_) => "AUDIT_OPERATION_INVALID",
            Self::EmptyBatch => "MENU_BATCH_EMPTY",
            Self::MixedParents => "MENU_MIXED_PARENTS",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Error category of the variant.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::MenuNotFound(_) | Self::ParentNotFound(_) => ErrorCategory::NotFound,
            Self::CodeExists(_)
            | Self::RouteConflict { .. }
            | Self::OrderConflict { .. }
            | Self::CycleDetected { .. }
            | Self::GroupConstraint { .. } => ErrorCategory::Conflict,
            Self::HasChildren(_) => ErrorCategory::PreconditionFailed,
            Self::MissingField { .. }
            | Self::InvalidKind(_)
            | Self::InvalidOpenMode(_)
            | Self::InvalidOperation(_)
            | Self::EmptyBatch
            | Self::MixedParents
            | Self::Validation(_) => ErrorCategory::ValidationFailed,
            Self::Storage(_) | Self::Serialization(_) | Self::Io(_) => ErrorCategory::Internal,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: MenuKind) -> MenuNode {
        let now = Utc::now();
        MenuNode {
            id: MenuId(1),
            name: "Users".to_string(),
            code: "users".to_string(),
            kind,
            group_id: None,
            parent_id: None,
            path: None,
            route_name: None,
            component_key: None,
            external_url: None,
            open_mode: None,
            permission_key: None,
            icon: None,
            visible: true,
            enabled: true,
            show_in_nav: true,
            cacheable: false,
            order: 0,
            created_at: now,
            created_by: None,
            updated_at: now,
            updated_by: None,
            deleted_at: None,
        }
    }

    #[test]
    fn kind_round_trips_through_wire_name() {
        for kind in [
            MenuKind::Directory,
            MenuKind::Page,
            MenuKind::External,
            MenuKind::Button,
        ] {
            assert_eq!(kind.as_str().parse::<MenuKind>().expect("parse"), kind);
        }
        assert!(matches!(
            "folder".parse::<MenuKind>(),
            Err(MenuError::InvalidKind(_))
        ));
    }

    #[test]
    fn open_mode_rejects_unknown_value() {
        assert_eq!("iframe".parse::<OpenMode>().expect("parse"), OpenMode::Iframe);
        let err = "popup".parse::<OpenMode>().expect_err("must fail");
        assert_eq!(err.code(), "MENU_OPEN_MODE_INVALID");
        assert_eq!(err.category(), ErrorCategory::ValidationFailed);
    }

    #[test]
    fn page_requires_path() {
        let mut page = node(MenuKind::Page);
        assert!(matches!(
            page.check_required_fields(),
            Err(MenuError::MissingField { field: "path", .. })
        ));

        page.path = Some(String::new());
        assert!(page.check_required_fields().is_err());

        page.path = Some("/users".to_string());
        assert!(page.check_required_fields().is_ok());
    }

    #[test]
    fn external_requires_url_and_open_mode() {
        let mut ext = node(MenuKind::External);
        assert!(matches!(
            ext.check_required_fields(),
            Err(MenuError::MissingField {
                field: "external_url",
                ..
            })
        ));

        ext.external_url = Some("https://example.com".to_string());
        assert!(matches!(
            ext.check_required_fields(),
            Err(MenuError::MissingField {
                field: "open_mode",
                ..
            })
        ));

        ext.open_mode = Some(OpenMode::New);
        assert!(ext.check_required_fields().is_ok());
    }

    #[test]
    fn directory_and_button_need_only_name_and_code() {
        assert!(node(MenuKind::Directory).check_required_fields().is_ok());
        assert!(node(MenuKind::Button).check_required_fields().is_ok());

        let mut nameless = node(MenuKind::Button);
        nameless.name = "  ".to_string();
        assert!(nameless.check_required_fields().is_err());
    }

    #[test]
    fn empty_permission_key_counts_as_unbound() {
        let mut n = node(MenuKind::Directory);
        assert!(!n.has_permission());
        n.permission_key = Some(String::new());
        assert!(!n.has_permission());
        n.permission_key = Some("menu:users".to_string());
        assert!(n.has_permission());
    }

    #[test]
    fn error_categories_follow_taxonomy() {
        assert_eq!(
            MenuError::MenuNotFound(MenuId(1)).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            MenuError::CycleDetected {
                id: MenuId(1),
                parent: MenuId(2)
            }
            .category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            MenuError::HasChildren(2).category(),
            ErrorCategory::PreconditionFailed
        );
        assert_eq!(
            MenuError::Storage("disk".into()).category(),
            ErrorCategory::Internal
        );
    }
}
