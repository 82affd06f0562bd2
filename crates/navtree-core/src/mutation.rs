//! # Mutation Engine
//!
//! Every structural change to the menu forest goes through [`MenuEngine`].
//!
//! Each operation is one logical unit: validate, mutate, audit.
//! - Validation and conflict errors are raised before any write.
//! - All rows touched by one operation land in a single `commit`, so a
//!   storage failure leaves nothing half-applied.
//! - The audit append comes last and is best-effort.
//!
//! Implicit order collisions (create, move, update) are resolved by moving
//! the mutated node to `max(sibling order) + 1`, counting from 0. Colliding
//! siblings are never renumbered.

use crate::audit::{self, AuditOperation, FieldDiff, NewAuditRecord};
use crate::cycle::would_cycle;
use crate::permission::{DerivedPermissions, PermissionProvisioner};
use crate::primitives::{
    CASCADE_REMARK, MAX_FIELD_LENGTH, MAX_NAME_LENGTH, MAX_REORDER_BATCH, MAX_URL_LENGTH,
};
use crate::repository::{AuditLog, MenuRepository, MenuWrite};
use crate::storage::{MemoryAuditLog, MemoryStore, RedbStore};
use crate::{Actor, MenuError, MenuId, MenuKind, MenuNode, OpenMode};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// REQUESTS AND OUTCOMES
// =============================================================================

/// Fields of a new menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMenu {
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: MenuKind,
    pub group_id: Option<String>,
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
    /// `None` appends after the last sibling.
    pub order: Option<i64>,
    /// Ask the permission provisioner for a key.
    pub create_permission: bool,
    pub permission_name: Option<String>,
}

impl CreateMenu {
    /// A visible, enabled, navigable menu with no optional fields set.
    #[must_use]
    pub fn new(name: impl Into<String>, code: impl Into<String>, kind: MenuKind) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
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
            order: None,
            create_permission: false,
            permission_name: None,
        }
    }

    /// Set the parent.
    #[must_use]
    pub fn under(mut self, parent: MenuId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Set the route path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set an explicit order.
    #[must_use]
    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }
}

/// Partial update of a menu.
///
/// Outer `None` leaves a field untouched. For clearable fields,
/// `Some(None)` unsets the field and `Some(Some(v))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    pub kind: Option<MenuKind>,
    pub group_id: Option<Option<String>>,
    /// `Some(None)` moves the node to the root.
    pub parent_id: Option<Option<MenuId>>,
    pub path: Option<Option<String>>,
    pub route_name: Option<Option<String>>,
    pub component_key: Option<Option<String>>,
    pub external_url: Option<Option<String>>,
    pub open_mode: Option<Option<OpenMode>>,
    pub permission_key: Option<Option<String>>,
    pub icon: Option<Option<String>>,
    pub visible: Option<bool>,
    pub enabled: Option<bool>,
    pub show_in_nav: Option<bool>,
    pub cacheable: Option<bool>,
    pub order: Option<i64>,
}

impl MenuPatch {
    /// Whether the patch touches a field the required-field rules read.
    fn touches_required(&self) -> bool {
        self.kind.is_some()
            || self.name.is_some()
            || self.code.is_some()
            || self.path.is_some()
            || self.external_url.is_some()
            || self.open_mode.is_some()
    }

    fn apply(self, node: &mut MenuNode) {
        fn set<T>(field: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *field = v;
            }
        }
        set(&mut node.name, self.name);
        set(&mut node.code, self.code);
        set(&mut node.kind, self.kind);
        set(&mut node.group_id, self.group_id);
        set(&mut node.parent_id, self.parent_id);
        set(&mut node.path, self.path);
        set(&mut node.route_name, self.route_name);
        set(&mut node.component_key, self.component_key);
        set(&mut node.external_url, self.external_url);
        set(&mut node.open_mode, self.open_mode);
        set(&mut node.permission_key, self.permission_key);
        set(&mut node.icon, self.icon);
        set(&mut node.visible, self.visible);
        set(&mut node.enabled, self.enabled);
        set(&mut node.show_in_nav, self.show_in_nav);
        set(&mut node.cacheable, self.cacheable);
        set(&mut node.order, self.order);
    }
}

/// What a delete removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteImpact {
    /// Live direct children of the deleted node.
    pub children_count: usize,
    /// Rows soft-deleted, the node itself included.
    pub deleted_count: usize,
}

/// One `(id, order)` pair of a reorder batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderEntry {
    pub id: MenuId,
    pub order: i64,
}

/// A rejected reorder entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorderItemError {
    pub id: MenuId,
    pub code: &'static str,
    pub message: String,
}

impl ReorderItemError {
    fn new(id: MenuId, error: &MenuError) -> Self {
        Self {
            id,
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Result of a reorder batch.
///
/// A batch that fails validation applies nothing: every entry counts as
/// failed and `errors` lists the offending ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorderOutcome {
    pub success_count: usize,
    pub failed_count: usize,
    pub errors: Vec<ReorderItemError>,
}

/// How to bind a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionBinding {
    /// Bind a caller-supplied key.
    Existing(String),
    /// Ask the provisioner for a new permission.
    CreateNew { name: Option<String> },
}

// =============================================================================
// ENGINE
// =============================================================================

/// The menu hierarchy engine.
///
/// Holds no request state of its own: every operation reads fresh rows from
/// the repository. The acting user is an explicit argument.
pub struct MenuEngine {
    pub(crate) repo: Box<dyn MenuRepository>,
    pub(crate) audit: Box<dyn AuditLog>,
    permissions: Box<dyn PermissionProvisioner>,
}

impl std::fmt::Debug for MenuEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MenuEngine").finish_non_exhaustive()
    }
}

impl MenuEngine {
    /// Build an engine over the given ports, deriving permission keys.
    #[must_use]
    pub fn new(repo: Box<dyn MenuRepository>, audit: Box<dyn AuditLog>) -> Self {
        Self {
            repo,
            audit,
            permissions: Box::new(DerivedPermissions),
        }
    }

    /// Volatile engine backed by BTreeMaps.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()), Box::new(MemoryAuditLog::new()))
    }

    /// Persistent engine; one database serves menus and audit records.
    #[must_use]
    pub fn with_redb(store: RedbStore) -> Self {
        Self::new(Box::new(store.clone()), Box::new(store))
    }

    /// Replace the permission provisioner.
    #[must_use]
    pub fn with_permissions(mut self, permissions: Box<dyn PermissionProvisioner>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Read access to the underlying repository.
    #[must_use]
    pub fn repository(&self) -> &dyn MenuRepository {
        self.repo.as_ref()
    }

    fn require(&self, id: MenuId) -> Result<MenuNode, MenuError> {
        self.repo.find(id)?.ok_or(MenuError::MenuNotFound(id))
    }

    fn require_parent(&self, id: MenuId) -> Result<MenuNode, MenuError> {
        self.repo.find(id)?.ok_or(MenuError::ParentNotFound(id))
    }

    // =========================================================================
    // CREATE
    // =========================================================================

    /// Create a menu.
    pub fn create_menu(&mut self, req: CreateMenu, actor: &Actor) -> Result<MenuNode, MenuError> {
        self.create_with_remark(req, actor, None)
    }

    /// Create a menu whose audit record carries `remark`.
    pub(crate) fn create_with_remark(
        &mut self,
        req: CreateMenu,
        actor: &Actor,
        remark: Option<&str>,
    ) -> Result<MenuNode, MenuError> {
        let now = Utc::now();
        let mut node = MenuNode {
            id: MenuId(0),
            name: req.name,
            code: req.code,
            kind: req.kind,
            group_id: req.group_id,
            parent_id: req.parent_id,
            path: req.path,
            route_name: req.route_name,
            component_key: req.component_key,
            external_url: req.external_url,
            open_mode: req.open_mode,
            permission_key: req.permission_key,
            icon: req.icon,
            visible: req.visible,
            enabled: req.enabled,
            show_in_nav: req.show_in_nav,
            cacheable: req.cacheable,
            order: 0,
            created_at: now,
            created_by: actor.id.clone(),
            updated_at: now,
            updated_by: actor.id.clone(),
            deleted_at: None,
        };

        node.check_required_fields()?;
        check_lengths(&node)?;
        if self.repo.find_by_code(&node.code)?.is_some() {
            return Err(MenuError::CodeExists(node.code));
        }
        self.check_routes(&node, None)?;

        let parent = node
            .parent_id
            .map(|p| self.require_parent(p))
            .transpose()?;

        node.id = self.repo.allocate_id()?;
        if let Some(parent) = &parent {
            if would_cycle(self.repo.as_ref(), node.id, parent.id)? {
                return Err(MenuError::CycleDetected {
                    id: node.id,
                    parent: parent.id,
                });
            }
            check_group(&node, parent)?;
        }

        node.order = match req.order {
            Some(order) => self.resolve_order(node.parent_id, order, node.id)?,
            None => self.append_order(node.parent_id)?,
        };

        if req.create_permission {
            let key = self
                .permissions
                .provision(&node, req.permission_name.as_deref())?;
            node.permission_key = Some(key);
        }

        self.repo.commit(vec![MenuWrite::Insert(node.clone())])?;
        tracing::info!(menu_id = node.id.0, code = %node.code, "menu created");

        let mut record = NewAuditRecord::new(node.id, AuditOperation::Create, actor, now)
            .with_after(audit::snapshot(&node));
        if let Some(remark) = remark {
            record = record.with_remark(remark);
        }
        audit::record(self.audit.as_mut(), record);
        Ok(node)
    }

    // =========================================================================
    // UPDATE
    // =========================================================================

    /// Apply a partial update. An update that changes nothing writes
    /// nothing and leaves no audit record.
    pub fn update_menu(
        &mut self,
        id: MenuId,
        patch: MenuPatch,
        actor: &Actor,
    ) -> Result<MenuNode, MenuError> {
        let current = self.require(id)?;
        let recheck_required = patch.touches_required();
        let mut next = current.clone();
        patch.apply(&mut next);

        if recheck_required {
            next.check_required_fields()?;
        }
        check_lengths(&next)?;

        if next.code != current.code
            && let Some(other) = self.repo.find_by_code(&next.code)?
            && other.id != id
        {
            return Err(MenuError::CodeExists(next.code));
        }
        self.check_routes(&next, Some(&current))?;

        let parent_changed = next.parent_id != current.parent_id;
        let parent = next
            .parent_id
            .map(|p| self.require_parent(p))
            .transpose()?;
        if parent_changed
            && let Some(parent) = &parent
            && would_cycle(self.repo.as_ref(), id, parent.id)?
        {
            return Err(MenuError::CycleDetected {
                id,
                parent: parent.id,
            });
        }
        let group_changed = next.group_id != current.group_id;
        if (parent_changed || group_changed)
            && let Some(parent) = &parent
        {
            check_group(&next, parent)?;
        }
        if group_changed {
            for child in self.repo.find_children(Some(id))? {
                check_group(&child, &next)?;
            }
        }
        if parent_changed || next.order != current.order {
            next.order = self.resolve_order(next.parent_id, next.order, id)?;
        }

        let Some(changes) = audit::diff(&current, &next) else {
            return Ok(current);
        };

        let now = Utc::now();
        next.touch(actor, now);
        self.repo.commit(vec![MenuWrite::Update(next.clone())])?;
        tracing::info!(menu_id = id.0, fields = ?changes.changed_fields, "menu updated");

        audit::record(
            self.audit.as_mut(),
            NewAuditRecord::new(id, AuditOperation::Update, actor, now).with_diff(changes),
        );
        Ok(next)
    }

    // =========================================================================
    // DELETE
    // =========================================================================

    /// Soft-delete a menu.
    ///
    /// With live children the delete is rejected unless `cascade` is set.
    /// A cascade removes every live descendant depth-first in the same
    /// commit; descendants are audited first with the cascade remark, the
    /// requested node last.
    pub fn delete_menu(
        &mut self,
        id: MenuId,
        cascade: bool,
        actor: &Actor,
    ) -> Result<DeleteImpact, MenuError> {
        let target = self.require(id)?;
        let children_count = self.repo.count_children(id)?;
        if children_count > 0 && !cascade {
            return Err(MenuError::HasChildren(children_count));
        }

        let mut doomed = Vec::new();
        if children_count > 0 {
            let mut visited = BTreeSet::from([id]);
            self.collect_descendants(id, &mut visited, &mut doomed)?;
        }

        let now = Utc::now();
        let writes = doomed
            .iter()
            .map(|n| n.id)
            .chain(std::iter::once(id))
            .map(|id| MenuWrite::SoftDelete {
                id,
                at: now,
                by: actor.id.clone(),
            })
            .collect();
        self.repo.commit(writes)?;
        tracing::info!(
            menu_id = id.0,
            descendants = doomed.len(),
            "menu deleted"
        );

        for node in &doomed {
            audit::record(
                self.audit.as_mut(),
                NewAuditRecord::new(node.id, AuditOperation::Delete, actor, now)
                    .with_before(audit::snapshot(node))
                    .with_remark(CASCADE_REMARK),
            );
        }
        audit::record(
            self.audit.as_mut(),
            NewAuditRecord::new(id, AuditOperation::Delete, actor, now)
                .with_before(audit::snapshot(&target)),
        );

        Ok(DeleteImpact {
            children_count,
            deleted_count: doomed.len() + 1,
        })
    }

    /// Post-order walk: every descendant before its parent.
    fn collect_descendants(
        &self,
        id: MenuId,
        visited: &mut BTreeSet<MenuId>,
        out: &mut Vec<MenuNode>,
    ) -> Result<(), MenuError> {
        for child in self.repo.find_children(Some(id))? {
            if !visited.insert(child.id) {
                continue;
            }
            self.collect_descendants(child.id, visited, out)?;
            out.push(child);
        }
        Ok(())
    }

    // =========================================================================
    // MOVE
    // =========================================================================

    /// Change parent (`None` for root) and order in one write.
    ///
    /// A requested order already held by a sibling is replaced by
    /// `max(sibling order) + 1`.
    pub fn move_menu(
        &mut self,
        id: MenuId,
        new_parent: Option<MenuId>,
        order: i64,
        actor: &Actor,
    ) -> Result<MenuNode, MenuError> {
        let current = self.require(id)?;

        if let Some(parent_id) = new_parent {
            let parent = self.require_parent(parent_id)?;
            if would_cycle(self.repo.as_ref(), id, parent_id)? {
                return Err(MenuError::CycleDetected {
                    id,
                    parent: parent_id,
                });
            }
            check_group(&current, &parent)?;
        }

        let resolved = self.resolve_order(new_parent, order, id)?;
        if new_parent == current.parent_id && resolved == current.order {
            return Ok(current);
        }

        let now = Utc::now();
        let mut next = current.clone();
        next.parent_id = new_parent;
        next.order = resolved;
        next.touch(actor, now);
        self.repo.commit(vec![MenuWrite::Update(next.clone())])?;
        tracing::info!(
            menu_id = id.0,
            parent = ?new_parent.map(|p| p.0),
            order = resolved,
            "menu moved"
        );

        let id_value = |p: Option<MenuId>| p.map_or(Value::Null, |p| Value::from(p.0));
        let mut before = Map::new();
        before.insert("parent_id".to_string(), id_value(current.parent_id));
        before.insert("order".to_string(), Value::from(current.order));
        let mut after = Map::new();
        after.insert("parent_id".to_string(), id_value(next.parent_id));
        after.insert("order".to_string(), Value::from(next.order));
        audit::record(
            self.audit.as_mut(),
            NewAuditRecord::new(id, AuditOperation::Move, actor, now).with_diff(FieldDiff {
                changed_fields: vec!["parent_id".to_string(), "order".to_string()],
                before,
                after,
            }),
        );
        Ok(next)
    }

    // =========================================================================
    // REORDER
    // =========================================================================

    /// Assign new orders to a batch of siblings.
    ///
    /// Validation covers the whole batch before anything is written: every
    /// id must resolve, all nodes must share one parent, and no two entries
    /// may request the same order. A batch that passes is committed at once.
    /// Entries colliding with siblings outside the batch are moved to
    /// `max(sibling order) + 1`. Only nodes whose order changed are audited.
    pub fn reorder_menus(
        &mut self,
        entries: Vec<ReorderEntry>,
        actor: &Actor,
    ) -> Result<ReorderOutcome, MenuError> {
        if entries.is_empty() {
            return Err(MenuError::EmptyBatch);
        }
        if entries.len() > MAX_REORDER_BATCH {
            return Err(MenuError::Validation(format!(
                "reorder batch exceeds {MAX_REORDER_BATCH} entries"
            )));
        }

        let mut errors = Vec::new();
        let mut nodes: Vec<(MenuNode, i64)> = Vec::with_capacity(entries.len());
        let mut seen_ids = BTreeSet::new();
        let mut seen_orders: BTreeMap<i64, MenuId> = BTreeMap::new();
        let mut shared_parent: Option<Option<MenuId>> = None;

        for entry in &entries {
            if !seen_ids.insert(entry.id) {
                let err = MenuError::Validation(format!("menu {} appears twice", entry.id));
                errors.push(ReorderItemError::new(entry.id, &err));
                continue;
            }
            let Some(node) = self.repo.find(entry.id)? else {
                errors.push(ReorderItemError::new(
                    entry.id,
                    &MenuError::MenuNotFound(entry.id),
                ));
                continue;
            };
            match shared_parent {
                None => shared_parent = Some(node.parent_id),
                Some(parent) if parent != node.parent_id => {
                    errors.push(ReorderItemError::new(entry.id, &MenuError::MixedParents));
                    continue;
                }
                Some(_) => {}
            }
            if seen_orders.insert(entry.order, entry.id).is_some() {
                errors.push(ReorderItemError::new(
                    entry.id,
                    &MenuError::OrderConflict { order: entry.order },
                ));
                continue;
            }
            nodes.push((node, entry.order));
        }

        if !errors.is_empty() {
            tracing::debug!(rejected = errors.len(), "reorder batch rejected");
            return Ok(ReorderOutcome {
                success_count: 0,
                failed_count: entries.len(),
                errors,
            });
        }

        let parent = shared_parent.flatten();
        let outside: Vec<MenuNode> = self
            .repo
            .find_children(parent)?
            .into_iter()
            .filter(|s| !seen_ids.contains(&s.id))
            .collect();
        let taken: BTreeSet<i64> = outside.iter().map(|s| s.order).collect();
        let mut ceiling = outside
            .iter()
            .map(|s| s.order)
            .chain(nodes.iter().map(|(_, order)| *order))
            .fold(0, i64::max);

        let now = Utc::now();
        let mut changed = Vec::new();
        for (node, requested) in nodes {
            let order = if taken.contains(&requested) {
                ceiling = order_after(ceiling)?;
                ceiling
            } else {
                requested
            };
            if order != node.order {
                let mut next = node.clone();
                next.order = order;
                next.touch(actor, now);
                changed.push((node, next));
            }
        }

        if !changed.is_empty() {
            let writes = changed
                .iter()
                .map(|(_, next)| MenuWrite::Update(next.clone()))
                .collect();
            self.repo.commit(writes)?;
        }
        tracing::info!(
            entries = entries.len(),
            changed = changed.len(),
            "menus reordered"
        );

        for (before, after) in &changed {
            if let Some(changes) = audit::diff(before, after) {
                audit::record(
                    self.audit.as_mut(),
                    NewAuditRecord::new(after.id, AuditOperation::Reorder, actor, now)
                        .with_diff(changes),
                );
            }
        }

        Ok(ReorderOutcome {
            success_count: entries.len(),
            failed_count: 0,
            errors: Vec::new(),
        })
    }

    // =========================================================================
    // TOGGLES
    // =========================================================================

    /// Set `enabled`. Idempotent: a matching state writes nothing.
    pub fn toggle_enabled(
        &mut self,
        id: MenuId,
        enabled: bool,
        actor: &Actor,
    ) -> Result<MenuNode, MenuError> {
        let op = if enabled {
            AuditOperation::Enable
        } else {
            AuditOperation::Disable
        };
        self.set_flag(id, actor, op, |n| n.enabled = enabled)
    }

    /// Set `visible`. Idempotent: a matching state writes nothing.
    pub fn toggle_visible(
        &mut self,
        id: MenuId,
        visible: bool,
        actor: &Actor,
    ) -> Result<MenuNode, MenuError> {
        let op = if visible {
            AuditOperation::Show
        } else {
            AuditOperation::Hide
        };
        self.set_flag(id, actor, op, |n| n.visible = visible)
    }

    fn set_flag(
        &mut self,
        id: MenuId,
        actor: &Actor,
        op: AuditOperation,
        set: impl FnOnce(&mut MenuNode),
    ) -> Result<MenuNode, MenuError> {
        let current = self.require(id)?;
        let mut next = current.clone();
        set(&mut next);
        self.write_single(current, next, op, actor)
    }

    // =========================================================================
    // PERMISSION
    // =========================================================================

    /// Bind a permission key, either supplied or provisioned.
    /// Binding the key already in place is a no-op.
    pub fn bind_permission(
        &mut self,
        id: MenuId,
        binding: PermissionBinding,
        actor: &Actor,
    ) -> Result<MenuNode, MenuError> {
        let current = self.require(id)?;
        let key = match binding {
            PermissionBinding::Existing(key) => {
                let key = key.trim().to_string();
                if key.is_empty() {
                    return Err(MenuError::Validation(
                        "permission key must not be empty".to_string(),
                    ));
                }
                key
            }
            PermissionBinding::CreateNew { name } => {
                self.permissions.provision(&current, name.as_deref())?
            }
        };
        if key.len() > MAX_FIELD_LENGTH {
            return Err(MenuError::Validation(format!(
                "permission_key exceeds {MAX_FIELD_LENGTH} characters"
            )));
        }

        let mut next = current.clone();
        next.permission_key = Some(key);
        self.write_single(current, next, AuditOperation::BindPermission, actor)
    }

    /// Persist a one-row change and audit it, unless nothing changed.
    fn write_single(
        &mut self,
        current: MenuNode,
        mut next: MenuNode,
        op: AuditOperation,
        actor: &Actor,
    ) -> Result<MenuNode, MenuError> {
        let Some(changes) = audit::diff(&current, &next) else {
            return Ok(current);
        };
        let now = Utc::now();
        next.touch(actor, now);
        self.repo.commit(vec![MenuWrite::Update(next.clone())])?;
        tracing::info!(menu_id = next.id.0, operation = op.as_str(), "menu changed");

        audit::record(
            self.audit.as_mut(),
            NewAuditRecord::new(next.id, op, actor, now).with_diff(changes),
        );
        Ok(next)
    }

    // =========================================================================
    // INVARIANT HELPERS
    // =========================================================================

    /// Reject a new duplicate path or route name. Unchanged values are not
    /// re-checked, so pre-existing duplicates stay editable.
    fn check_routes(&self, node: &MenuNode, previous: Option<&MenuNode>) -> Result<(), MenuError> {
        if let Some(path) = changed_value(&node.path, previous.map(|p| &p.path))
            && self
                .repo
                .find_by_path(path)?
                .iter()
                .any(|other| other.id != node.id)
        {
            return Err(MenuError::RouteConflict {
                field: "path",
                value: path.to_string(),
            });
        }
        if let Some(route) = changed_value(&node.route_name, previous.map(|p| &p.route_name))
            && self
                .repo
                .find_by_route_name(route)?
                .iter()
                .any(|other| other.id != node.id)
        {
            return Err(MenuError::RouteConflict {
                field: "route_name",
                value: route.to_string(),
            });
        }
        Ok(())
    }

    /// `max(sibling order) + 1`, counting from 0.
    fn append_order(&self, parent: Option<MenuId>) -> Result<i64, MenuError> {
        let max = self
            .repo
            .find_children(parent)?
            .iter()
            .map(|s| s.order)
            .fold(0, i64::max);
        order_after(max)
    }

    /// Keep `requested` unless another sibling holds it.
    fn resolve_order(
        &self,
        parent: Option<MenuId>,
        requested: i64,
        subject: MenuId,
    ) -> Result<i64, MenuError> {
        let siblings = self.repo.find_children(parent)?;
        if siblings
            .iter()
            .any(|s| s.id != subject && s.order == requested)
        {
            let max = siblings.iter().map(|s| s.order).fold(0, i64::max);
            order_after(max)
        } else {
            Ok(requested)
        }
    }
}

/// The non-empty new value of a route field, if it differs from the old one.
fn changed_value<'a>(new: &'a Option<String>, old: Option<&Option<String>>) -> Option<&'a str> {
    new.as_deref()
        .filter(|v| !v.is_empty())
        .filter(|v| old.is_none_or(|o| o.as_deref() != Some(*v)))
}

/// The slot after `max`. At the top of the range there is none, and the
/// collision is reported instead of reusing `max`.
fn order_after(max: i64) -> Result<i64, MenuError> {
    max.checked_add(1).ok_or(MenuError::OrderConflict { order: max })
}

/// A grouped node under a grouped parent must share the parent's group.
fn check_group(node: &MenuNode, parent: &MenuNode) -> Result<(), MenuError> {
    let group = node.group_id.as_deref().filter(|g| !g.is_empty());
    let parent_group = parent.group_id.as_deref().filter(|g| !g.is_empty());
    match (group, parent_group) {
        (Some(g), Some(pg)) if g != pg => Err(MenuError::GroupConstraint {
            group: g.to_string(),
            parent_group: pg.to_string(),
        }),
        _ => Ok(()),
    }
}

fn check_lengths(node: &MenuNode) -> Result<(), MenuError> {
    let too_long = |field: &str, value: Option<&str>, max: usize| match value {
        Some(v) if v.chars().count() > max => Err(MenuError::Validation(format!(
            "{field} exceeds {max} characters"
        ))),
        _ => Ok(()),
    };
    too_long("name", Some(&node.name), MAX_NAME_LENGTH)?;
    too_long("code", Some(&node.code), MAX_NAME_LENGTH)?;
    too_long("group_id", node.group_id.as_deref(), MAX_FIELD_LENGTH)?;
    too_long("path", node.path.as_deref(), MAX_FIELD_LENGTH)?;
    too_long("route_name", node.route_name.as_deref(), MAX_FIELD_LENGTH)?;
    too_long("component_key", node.component_key.as_deref(), MAX_FIELD_LENGTH)?;
    too_long("permission_key", node.permission_key.as_deref(), MAX_FIELD_LENGTH)?;
    too_long("icon", node.icon.as_deref(), MAX_FIELD_LENGTH)?;
    too_long("external_url", node.external_url.as_deref(), MAX_URL_LENGTH)?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
