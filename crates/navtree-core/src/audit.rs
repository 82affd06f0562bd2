//! # Audit Records
//!
//! Every structural mutation leaves one immutable [`AuditRecord`] behind.
//!
//! - `create` / `delete` carry the full snapshot of the node.
//! - Every other operation carries only the fields that changed, produced
//!   by [`diff`]. An empty diff means no record is written.
//!
//! Appending is best-effort: [`record`] logs a failed append through
//! `tracing` and returns, so the triggering mutation still succeeds.

use crate::primitives::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::repository::AuditLog;
use crate::{Actor, AuditId, MenuError, MenuId, MenuNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Partial or full JSON view of a node, keyed by field name.
pub type Snapshot = Map<String, Value>;

// =============================================================================
// OPERATION
// =============================================================================

/// The kind of mutation an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    Create,
    Update,
    Delete,
    Move,
    Reorder,
    BindPermission,
    Enable,
    Disable,
    Show,
    Hide,
}

impl AuditOperation {
    /// Wire name of the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Move => "move",
            Self::Reorder => "reorder",
            Self::BindPermission => "bind_permission",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Show => "show",
            Self::Hide => "hide",
        }
    }
}

impl FromStr for AuditOperation {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "move" => Ok(Self::Move),
            "reorder" => Ok(Self::Reorder),
            "bind_permission" => Ok(Self::BindPermission),
            "enable" => Ok(Self::Enable),
            "disable" => Ok(Self::Disable),
            "show" => Ok(Self::Show),
            "hide" => Ok(Self::Hide),
            other => Err(MenuError::InvalidOperation(other.to_string())),
        }
    }
}

impl fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// A persisted audit record. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,
    pub menu_id: MenuId,
    pub operation: AuditOperation,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub changed_fields: Vec<String>,
    pub before: Option<Snapshot>,
    pub after: Option<Snapshot>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An audit record before the log assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditRecord {
    pub menu_id: MenuId,
    pub operation: AuditOperation,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub changed_fields: Vec<String>,
    pub before: Option<Snapshot>,
    pub after: Option<Snapshot>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewAuditRecord {
    /// Start a record for `menu_id` attributed to `actor`.
    #[must_use]
    pub fn new(menu_id: MenuId, operation: AuditOperation, actor: &Actor, at: DateTime<Utc>) -> Self {
        Self {
            menu_id,
            operation,
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            changed_fields: Vec::new(),
            before: None,
            after: None,
            remark: None,
            created_at: at,
        }
    }

    /// Attach a field diff.
    #[must_use]
    pub fn with_diff(mut self, diff: FieldDiff) -> Self {
        self.changed_fields = diff.changed_fields;
        self.before = Some(diff.before);
        self.after = Some(diff.after);
        self
    }

    /// Attach a full before-snapshot (delete).
    #[must_use]
    pub fn with_before(mut self, before: Snapshot) -> Self {
        self.before = Some(before);
        self
    }

    /// Attach a full after-snapshot (create).
    #[must_use]
    pub fn with_after(mut self, after: Snapshot) -> Self {
        self.after = Some(after);
        self
    }

    /// Attach a free-text remark.
    #[must_use]
    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    /// Finish the record with the id assigned by the log.
    #[must_use]
    pub fn into_record(self, id: AuditId) -> AuditRecord {
        AuditRecord {
            id,
            menu_id: self.menu_id,
            operation: self.operation,
            actor_id: self.actor_id,
            actor_name: self.actor_name,
            changed_fields: self.changed_fields,
            before: self.before,
            after: self.after,
            remark: self.remark,
            created_at: self.created_at,
        }
    }
}

/// Who last touched a menu, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub operation: AuditOperation,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub at: DateTime<Utc>,
}

impl From<&AuditRecord> for AuditSummary {
    fn from(record: &AuditRecord) -> Self {
        Self {
            operation: record.operation,
            actor_id: record.actor_id.clone(),
            actor_name: record.actor_name.clone(),
            at: record.created_at,
        }
    }
}

// =============================================================================
// SNAPSHOT AND DIFF
// =============================================================================

/// Field names in snapshot order.
const SNAPSHOT_FIELDS: [&str; 18] = [
    "id",
    "name",
    "code",
    "type",
    "group_id",
    "parent_id",
    "path",
    "route_name",
    "component_key",
    "external_url",
    "open_mode",
    "permission_key",
    "icon",
    "visible",
    "enabled",
    "show_in_nav",
    "cacheable",
    "order",
];

/// Full JSON view of a node. Unset optionals are omitted.
#[must_use]
pub fn snapshot(node: &MenuNode) -> Snapshot {
    let mut map = Map::new();
    let mut put = |key: &str, value: Option<Value>| {
        if let Some(v) = value {
            map.insert(key.to_string(), v);
        }
    };
    let text = |s: &Option<String>| s.as_ref().map(|v| Value::String(v.clone()));

    put("id", Some(Value::from(node.id.0)));
    put("name", Some(Value::String(node.name.clone())));
    put("code", Some(Value::String(node.code.clone())));
    put("type", Some(Value::String(node.kind.as_str().to_string())));
    put("group_id", text(&node.group_id));
    put("parent_id", node.parent_id.map(|p| Value::from(p.0)));
    put("path", text(&node.path));
    put("route_name", text(&node.route_name));
    put("component_key", text(&node.component_key));
    put("external_url", text(&node.external_url));
    put(
        "open_mode",
        node.open_mode.map(|m| Value::String(m.as_str().to_string())),
    );
    put("permission_key", text(&node.permission_key));
    put("icon", text(&node.icon));
    put("visible", Some(Value::Bool(node.visible)));
    put("enabled", Some(Value::Bool(node.enabled)));
    put("show_in_nav", Some(Value::Bool(node.show_in_nav)));
    put("cacheable", Some(Value::Bool(node.cacheable)));
    put("order", Some(Value::from(node.order)));
    map
}

/// Changed fields between two versions of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiff {
    pub changed_fields: Vec<String>,
    pub before: Snapshot,
    pub after: Snapshot,
}

/// Compare two versions of a node field by field.
///
/// Returns `None` when nothing changed. A field that became unset appears
/// as `null` in the after-map (and vice versa). Bookkeeping fields such as
/// timestamps never count as changes.
#[must_use]
pub fn diff(before: &MenuNode, after: &MenuNode) -> Option<FieldDiff> {
    let old = snapshot(before);
    let new = snapshot(after);
    let mut out = FieldDiff {
        changed_fields: Vec::new(),
        before: Map::new(),
        after: Map::new(),
    };
    for field in SNAPSHOT_FIELDS {
        let o = old.get(field).cloned().unwrap_or(Value::Null);
        let n = new.get(field).cloned().unwrap_or(Value::Null);
        if o != n {
            out.changed_fields.push(field.to_string());
            out.before.insert(field.to_string(), o);
            out.after.insert(field.to_string(), n);
        }
    }
    if out.changed_fields.is_empty() {
        None
    } else {
        Some(out)
    }
}

// =============================================================================
// QUERY
// =============================================================================

/// Filters and paging for audit reads.
///
/// `page` is 1-based. A `page_size` of 0 selects the default; larger
/// values are capped at [`MAX_PAGE_SIZE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    pub menu_id: Option<MenuId>,
    pub operation: Option<AuditOperation>,
    pub actor_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub page: usize,
    pub page_size: usize,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            menu_id: None,
            operation: None,
            actor_id: None,
            start: None,
            end: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AuditQuery {
    /// All records of one menu, first page.
    #[must_use]
    pub fn for_menu(menu: MenuId) -> Self {
        Self {
            menu_id: Some(menu),
            ..Self::default()
        }
    }

    /// Check a record against every filter. Time bounds are inclusive.
    #[must_use]
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.menu_id.is_none_or(|m| record.menu_id == m)
            && self.operation.is_none_or(|op| record.operation == op)
            && self
                .actor_id
                .as_deref()
                .is_none_or(|a| record.actor_id.as_deref() == Some(a))
            && self.start.is_none_or(|s| record.created_at >= s)
            && self.end.is_none_or(|e| record.created_at <= e)
    }

    /// Normalized `(page, page_size)`.
    #[must_use]
    pub fn bounds(&self) -> (usize, usize) {
        let page = self.page.max(1);
        let size = match self.page_size {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        (page, size)
    }

    /// Filter, sort newest first and cut one page out of `records`.
    #[must_use]
    pub fn paginate(&self, records: impl IntoIterator<Item = AuditRecord>) -> AuditPage {
        let mut matched: Vec<AuditRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();
        matched.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let (page, page_size) = self.bounds();
        let total = matched.len();
        let records = matched
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();
        AuditPage {
            records,
            total,
            page,
            page_size,
        }
    }
}

/// One page of audit records plus the total match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditPage {
    pub records: Vec<AuditRecord>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

// =============================================================================
// BEST-EFFORT APPEND
// =============================================================================

/// Append a record, logging and swallowing any failure.
pub fn record(log: &mut dyn AuditLog, entry: NewAuditRecord) {
    let menu_id = entry.menu_id;
    let operation = entry.operation;
    if let Err(e) = log.append(entry) {
        tracing::warn!(
            menu_id = menu_id.0,
            operation = operation.as_str(),
            error = %e,
            "failed to append audit record"
        );
    }
}

// =============================================================================
// TESTS
// =============================================================================
