//! Unit tests for API types: request parsing and error mapping.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use navtree::api::{
    AuditLogQuery, BindPermissionRequest, CreateMenuRequest, ErrorResponse, HealthResponse,
    TreeQuery, UpdateMenuRequest, status_for,
};
use navtree_core::{
    AuditOperation, ErrorCategory, MenuError, MenuId, MenuKind, OpenMode, PermissionBind,
    PermissionBinding,
};

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// ERROR MAPPING TESTS
// =============================================================================

#[test]
fn test_status_for_every_category() {
    assert_eq!(status_for(ErrorCategory::NotFound), StatusCode::NOT_FOUND);
    assert_eq!(status_for(ErrorCategory::Conflict), StatusCode::CONFLICT);
    assert_eq!(status_for(ErrorCategory::ValidationFailed), StatusCode::BAD_REQUEST);
    assert_eq!(
        status_for(ErrorCategory::PreconditionFailed),
        StatusCode::PRECONDITION_FAILED
    );
    assert_eq!(
        status_for(ErrorCategory::Internal),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_error_response_carries_code_and_message() {
    let body = ErrorResponse::from(&MenuError::HasChildren(3));
    assert_eq!(body.code, "MENU_HAS_CHILDREN");
    assert!(body.message.contains('3'));
    assert_eq!(
        status_for(MenuError::HasChildren(3).category()),
        StatusCode::PRECONDITION_FAILED
    );
}

// =============================================================================
// CREATE REQUEST TESTS
// =============================================================================

#[test]
fn test_create_request_defaults() {
    let json = r#"{"name":"Users","code":"users","type":"page","path":"/users"}"#;
    let req: CreateMenuRequest = serde_json::from_str(json).unwrap();
    let create = req.into_create().unwrap();

    assert_eq!(create.kind, MenuKind::Page);
    assert!(create.visible);
    assert!(create.enabled);
    assert!(create.show_in_nav);
    assert!(!create.cacheable);
    assert!(create.order.is_none());
    assert!(create.parent_id.is_none());
}

#[test]
fn test_create_request_parses_external_fields() {
    let json = r#"{
        "name":"Docs","code":"docs","type":"external",
        "external_url":"https://docs.example.com","open_mode":"iframe",
        "parent_id":4,"order":2
    }"#;
    let req: CreateMenuRequest = serde_json::from_str(json).unwrap();
    let create = req.into_create().unwrap();

    assert_eq!(create.open_mode, Some(OpenMode::Iframe));
    assert_eq!(create.parent_id, Some(MenuId(4)));
    assert_eq!(create.order, Some(2));
}

#[test]
fn test_create_request_unknown_type() {
    let json = r#"{"name":"X","code":"x","type":"widget"}"#;
    let req: CreateMenuRequest = serde_json::from_str(json).unwrap();
    let err = req.into_create().unwrap_err();
    assert_eq!(err.code(), "MENU_TYPE_INVALID");
}

#[test]
fn test_create_request_unknown_open_mode() {
    let json = r#"{"name":"X","code":"x","type":"external","open_mode":"popup"}"#;
    let req: CreateMenuRequest = serde_json::from_str(json).unwrap();
    let err = req.into_create().unwrap_err();
    assert_eq!(err.code(), "MENU_OPEN_MODE_INVALID");
}

// =============================================================================
// UPDATE REQUEST TESTS
// =============================================================================

#[test]
fn test_update_request_distinguishes_absent_and_null() {
    let json = r#"{"icon":null,"path":"/new","parent_id":null}"#;
    let req: UpdateMenuRequest = serde_json::from_str(json).unwrap();
    let patch = req.into_patch().unwrap();

    assert_eq!(patch.icon, Some(None));
    assert_eq!(patch.path, Some(Some("/new".to_string())));
    assert_eq!(patch.parent_id, Some(None));
    assert_eq!(patch.route_name, None);
    assert_eq!(patch.name, None);
}

#[test]
fn test_update_request_parses_type() {
    let req: UpdateMenuRequest = serde_json::from_str(r#"{"type":"button"}"#).unwrap();
    assert_eq!(req.into_patch().unwrap().kind, Some(MenuKind::Button));
}

// =============================================================================
// PERMISSION REQUEST TESTS
// =============================================================================

#[test]
fn test_bind_request_prefers_create() {
    let req = BindPermissionRequest {
        permission_key: Some("menu:x".to_string()),
        create_permission: true,
        permission_name: Some("X".to_string()),
    };
    assert_eq!(
        req.into_binding().unwrap(),
        PermissionBinding::CreateNew {
            name: Some("X".to_string())
        }
    );
}

#[test]
fn test_bind_request_requires_key() {
    let err = BindPermissionRequest::default().into_binding().unwrap_err();
    assert!(matches!(err, MenuError::Validation(_)));
}

// =============================================================================
// QUERY TESTS
// =============================================================================

#[test]
fn test_tree_query_ignores_blank_values() {
    let query = TreeQuery {
        keyword: Some("  ".to_string()),
        kind: Some("page".to_string()),
        permission_bind: Some("unbound".to_string()),
        ..TreeQuery::default()
    };
    let filter = query.into_filter().unwrap();
    assert!(filter.keyword.is_none());
    assert_eq!(filter.kind, Some(MenuKind::Page));
    assert_eq!(filter.permission_bind, Some(PermissionBind::Unbound));
}

#[test]
fn test_audit_query_parses_operation() {
    let query = AuditLogQuery {
        operation: Some("bind_permission".to_string()),
        page: Some(2),
        ..AuditLogQuery::default()
    };
    let query = query.into_query(Some(MenuId(9))).unwrap();
    assert_eq!(query.operation, Some(AuditOperation::BindPermission));
    assert_eq!(query.menu_id, Some(MenuId(9)));
    assert_eq!(query.page, 2);
    assert_eq!(query.page_size, 20);
}

#[test]
fn test_audit_query_unknown_operation() {
    let query = AuditLogQuery {
        operation: Some("rename".to_string()),
        ..AuditLogQuery::default()
    };
    let err = query.into_query(None).unwrap_err();
    assert_eq!(err.code(), "AUDIT_OPERATION_INVALID");
}
