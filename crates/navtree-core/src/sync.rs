//! # Definition Sync
//!
//! Seeds a menu tree from a nested JSON definition file.
//!
//! ```json
//! [
//!   { "name": "Platform", "code": "platform", "children": [
//!       { "name": "Users", "code": "user_mgmt" },
//!       { "name": "Menus", "code": "menu_mgmt", "type": "page" }
//!   ]}
//! ]
//! ```
//!
//! Rules for nodes that do not exist yet:
//! - `type` defaults to `directory` with children, `page` without
//! - `path` is `<parent path>/<code>` (`/<code>` at the top)
//! - `route_name` and `component_key` default to the code
//! - order is the 1-based position among siblings, times 10 at the top
//!
//! Codes that already exist are skipped; their children are still synced
//! under the existing node.

use crate::mutation::{CreateMenu, MenuEngine};
use crate::primitives::SYNC_REMARK;
use crate::{Actor, ErrorCategory, MenuError, MenuId, MenuKind};
use serde::{Deserialize, Serialize};

/// One node of a definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuDefinition {
    pub name: String,
    pub code: String,
    #[serde(rename = "type", default)]
    pub kind: Option<MenuKind>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub permission_key: Option<String>,
    #[serde(default)]
    pub children: Vec<MenuDefinition>,
}

/// A definition that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub code: String,
    pub error_code: &'static str,
    pub message: String,
}

/// Outcome of a sync run, by menu code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<SyncFailure>,
}

/// Parse a JSON definition file.
pub fn parse_definitions(json: &str) -> Result<Vec<MenuDefinition>, MenuError> {
    serde_json::from_str(json).map_err(|e| MenuError::Serialization(e.to_string()))
}

/// Create every missing menu of `defs`, depth-first.
///
/// A failed definition does not stop the run; its subtree is reported as
/// failed and the next sibling is processed.
pub fn sync_definitions(
    engine: &mut MenuEngine,
    defs: &[MenuDefinition],
    actor: &Actor,
) -> Result<SyncReport, MenuError> {
    let mut report = SyncReport::default();
    sync_level(engine, defs, None, "", actor, &mut report)?;
    tracing::info!(
        created = report.created.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "menu definitions synced"
    );
    Ok(report)
}

fn sync_level(
    engine: &mut MenuEngine,
    defs: &[MenuDefinition],
    parent: Option<MenuId>,
    parent_path: &str,
    actor: &Actor,
    report: &mut SyncReport,
) -> Result<(), MenuError> {
    for (index, def) in defs.iter().enumerate() {
        let position = index as i64 + 1;
        let order = if parent.is_none() {
            position * 10
        } else {
            position
        };
        let computed_path = format!("{parent_path}/{}", def.code);

        let (id, path) = match engine.repository().find_by_code(&def.code)? {
            Some(existing) => {
                report.skipped.push(def.code.clone());
                let path = existing
                    .path
                    .filter(|p| !p.is_empty())
                    .unwrap_or(computed_path);
                (existing.id, path)
            }
            None => {
                let kind = def.kind.unwrap_or(if def.children.is_empty() {
                    MenuKind::Page
                } else {
                    MenuKind::Directory
                });
                let mut req = CreateMenu::new(def.name.clone(), def.code.clone(), kind)
                    .with_path(computed_path.clone())
                    .with_order(order);
                req.parent_id = parent;
                req.route_name = Some(def.code.clone());
                req.component_key = Some(def.code.clone());
                req.icon = def.icon.clone();
                req.permission_key = def.permission_key.clone();

                match engine.create_with_remark(req, actor, Some(SYNC_REMARK)) {
                    Ok(node) => {
                        report.created.push(def.code.clone());
                        (node.id, computed_path)
                    }
                    Err(e) if e.category() == ErrorCategory::Internal => return Err(e),
                    Err(e) => {
                        tracing::warn!(code = %def.code, error = %e, "menu definition rejected");
                        abandon(def, &e, report);
                        continue;
                    }
                }
            }
        };

        sync_level(engine, &def.children, Some(id), &path, actor, report)?;
    }
    Ok(())
}

/// Report a definition and its whole subtree as failed.
fn abandon(def: &MenuDefinition, cause: &MenuError, report: &mut SyncReport) {
    report.failed.push(SyncFailure {
        code: def.code.clone(),
        error_code: cause.code(),
        message: cause.to_string(),
    });
    for child in &def.children {
        let missing = MenuError::Validation(format!("parent {} was not created", def.code));
        abandon(child, &missing, report);
    }
}

// =============================================================================
// TESTS
// =============================================================================
