//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API and the
//! mapping from engine errors to HTTP status codes.
//!
//! Enum-valued fields (`type`, `open_mode`, `operation`) arrive as plain
//! strings and are parsed here, so an unknown value yields the engine's
//! error code instead of a generic body rejection.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use navtree_core::{
    AuditOperation, AuditQuery, CreateMenu, ErrorCategory, MenuError, MenuFilter, MenuId,
    MenuKind, MenuPatch, OpenMode, PermissionBind, PermissionBinding, ReorderEntry,
};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body: a stable machine code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&MenuError> for ErrorResponse {
    fn from(e: &MenuError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

/// HTTP status of an error category.
pub const fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorCategory::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Engine error as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub MenuError);

impl From<MenuError> for ApiError {
    fn from(e: MenuError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.category());
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0, "request failed");
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

/// Handler result type.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// HELPERS
// =============================================================================

/// Distinguish an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
fn nullable<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

const fn default_true() -> bool {
    true
}

fn parse_open_mode(value: Option<String>) -> Result<Option<OpenMode>, MenuError> {
    value.map(|v| v.parse()).transpose()
}

/// A list plus its length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}

// =============================================================================
// CREATE
// =============================================================================

/// Body of `POST /api/v1/system/menus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMenuRequest {
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub route_name: Option<String>,
    #[serde(default)]
    pub component_key: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub open_mode: Option<String>,
    #[serde(default)]
    pub permission_key: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub show_in_nav: bool,
    #[serde(default)]
    pub cacheable: bool,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub create_permission: bool,
    #[serde(default)]
    pub permission_name: Option<String>,
}

impl CreateMenuRequest {
    /// Convert to an engine request, parsing enum fields.
    pub fn into_create(self) -> Result<CreateMenu, MenuError> {
        let kind: MenuKind = self.kind.parse()?;
        let mut req = CreateMenu::new(self.name, self.code, kind);
        req.group_id = self.group_id;
        req.parent_id = self.parent_id.map(MenuId);
        req.path = self.path;
        req.route_name = self.route_name;
        req.component_key = self.component_key;
        req.external_url = self.external_url;
        req.open_mode = parse_open_mode(self.open_mode)?;
        req.permission_key = self.permission_key;
        req.icon = self.icon;
        req.visible = self.visible;
        req.enabled = self.enabled;
        req.show_in_nav = self.show_in_nav;
        req.cacheable = self.cacheable;
        req.order = self.order;
        req.create_permission = self.create_permission;
        req.permission_name = self.permission_name;
        Ok(req)
    }
}

// =============================================================================
// UPDATE
// =============================================================================

/// Body of `PUT /api/v1/system/menus/{id}`.
///
/// An omitted field is left untouched; `null` clears a clearable field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMenuRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub group_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub parent_id: Option<Option<u64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub path: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub route_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub component_key: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub external_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub open_mode: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub permission_key: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub icon: Option<Option<String>>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub show_in_nav: Option<bool>,
    #[serde(default)]
    pub cacheable: Option<bool>,
    #[serde(default)]
    pub order: Option<i64>,
}

impl UpdateMenuRequest {
    /// Convert to an engine patch, parsing enum fields.
    pub fn into_patch(self) -> Result<MenuPatch, MenuError> {
        Ok(MenuPatch {
            name: self.name,
            code: self.code,
            kind: self.kind.map(|k| k.parse()).transpose()?,
            group_id: self.group_id,
            parent_id: self.parent_id.map(|p| p.map(MenuId)),
            path: self.path,
            route_name: self.route_name,
            component_key: self.component_key,
            external_url: self.external_url,
            open_mode: self.open_mode.map(parse_open_mode).transpose()?,
            permission_key: self.permission_key,
            icon: self.icon,
            visible: self.visible,
            enabled: self.enabled,
            show_in_nav: self.show_in_nav,
            cacheable: self.cacheable,
            order: self.order,
        })
    }
}

// =============================================================================
// STRUCTURE
// =============================================================================

/// Query of `DELETE /api/v1/system/menus/{id}`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub cascade: bool,
}

/// Body of `POST /api/v1/system/menus/{id}/move`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoveMenuRequest {
    #[serde(default)]
    pub parent_id: Option<u64>,
    pub order: i64,
}

/// Body of `POST /api/v1/system/menus/reorder`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderRequest {
    pub items: Vec<ReorderEntry>,
}

/// Body of `PUT /api/v1/system/menus/{id}/enabled`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToggleEnabledRequest {
    pub enabled: bool,
}

/// Body of `PUT /api/v1/system/menus/{id}/visible`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToggleVisibleRequest {
    pub visible: bool,
}

/// Body of `PUT /api/v1/system/menus/{id}/permission`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindPermissionRequest {
    #[serde(default)]
    pub permission_key: Option<String>,
    #[serde(default)]
    pub create_permission: bool,
    #[serde(default)]
    pub permission_name: Option<String>,
}

impl BindPermissionRequest {
    /// `create_permission` wins over a supplied key.
    pub fn into_binding(self) -> Result<PermissionBinding, MenuError> {
        if self.create_permission {
            return Ok(PermissionBinding::CreateNew {
                name: self.permission_name,
            });
        }
        self.permission_key
            .map(PermissionBinding::Existing)
            .ok_or_else(|| {
                MenuError::Validation(
                    "permission_key is required unless create_permission is set".to_string(),
                )
            })
    }
}

// =============================================================================
// READS
// =============================================================================

/// Query of `GET /api/v1/system/menus/tree`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreeQuery {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub permission_bind: Option<String>,
}

impl TreeQuery {
    /// Convert to an engine filter. Blank values are ignored.
    pub fn into_filter(self) -> Result<MenuFilter, MenuError> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Ok(MenuFilter {
            keyword: present(self.keyword),
            kind: present(self.kind).map(|k| k.parse()).transpose()?,
            group_id: present(self.group_id),
            enabled: self.enabled,
            visible: self.visible,
            permission_bind: present(self.permission_bind)
                .map(|p| p.parse::<PermissionBind>())
                .transpose()?,
        })
    }
}

/// Query of the audit log endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogQuery {
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

impl AuditLogQuery {
    /// Convert to an engine query scoped to `menu_id`, if given.
    pub fn into_query(self, menu_id: Option<MenuId>) -> Result<AuditQuery, MenuError> {
        let defaults = AuditQuery::default();
        Ok(AuditQuery {
            menu_id,
            operation: self
                .operation
                .filter(|o| !o.is_empty())
                .map(|o| o.parse::<AuditOperation>())
                .transpose()?,
            actor_id: self.actor_id.filter(|a| !a.is_empty()),
            start: self.start,
            end: self.end,
            page: self.page.unwrap_or(defaults.page),
            page_size: self.page_size.unwrap_or(defaults.page_size),
        })
    }
}
