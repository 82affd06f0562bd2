//! Integration tests for the navtree HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use navtree::api::{AppState, ErrorResponse, HealthResponse, create_router};
use navtree::config::Config;
use navtree_core::MenuEngine;
use serde_json::{Value, json};

const MENUS: &str = "/api/v1/system/menus";

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn test_config() -> Config {
    Config {
        rate_limit: 0,
        ..Config::default()
    }
}

/// Create a test server with a fresh in-memory engine.
fn create_test_server() -> TestServer {
    create_server_with(&test_config())
}

fn create_server_with(config: &Config) -> TestServer {
    let router = create_router(AppState::new(MenuEngine::in_memory()), config);
    TestServer::new(router).unwrap()
}

fn user_id() -> HeaderName {
    HeaderName::from_static("x-user-id")
}

fn user_name() -> HeaderName {
    HeaderName::from_static("x-user-name")
}

/// Create a menu and return its id.
async fn create(server: &TestServer, body: Value) -> u64 {
    let response = server.post(MENUS).json(&body).await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_u64().unwrap()
}

async fn create_dir(server: &TestServer, code: &str, parent: Option<u64>) -> u64 {
    create(
        server,
        json!({ "name": code, "code": code, "type": "directory", "parent_id": parent }),
    )
    .await
}

fn error_code(response: &axum_test::TestResponse) -> String {
    response.json::<ErrorResponse>().code
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// CREATE / GET TESTS
// =============================================================================

#[tokio::test]
async fn test_create_and_get_menu() {
    let server = create_test_server();

    let response = server
        .post(MENUS)
        .add_header(user_id(), HeaderValue::from_static("u-1"))
        .add_header(user_name(), HeaderValue::from_static("Ada"))
        .json(&json!({
            "name": "Users",
            "code": "users",
            "type": "page",
            "path": "/users",
            "icon": "user"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    assert_eq!(created["type"], "page");
    assert_eq!(created["order"], 1);
    assert_eq!(created["children_count"], 0);
    assert_eq!(created["risk_flags"], json!(["UNBOUND_PERMISSION"]));

    let id = created["id"].as_u64().unwrap();
    let response = server.get(&format!("{MENUS}/{id}")).await;
    response.assert_status_ok();
    let detail: Value = response.json();
    assert_eq!(detail["icon"], "user");
    assert_eq!(detail["created_by"], "u-1");
    assert!(detail["external_url"].is_null());
    assert_eq!(detail["last_audit"]["operation"], "create");
    assert_eq!(detail["last_audit"]["actor_name"], "Ada");
}

#[tokio::test]
async fn test_get_missing_menu_is_404() {
    let server = create_test_server();
    let response = server.get(&format!("{MENUS}/999")).await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(error_code(&response), "MENU_NOT_FOUND");
}

#[tokio::test]
async fn test_create_page_without_path_is_400() {
    let server = create_test_server();
    let response = server
        .post(MENUS)
        .json(&json!({ "name": "P", "code": "p", "type": "page" }))
        .await;
    response.assert_status_bad_request();
    assert_eq!(error_code(&response), "MENU_FIELD_REQUIRED");
}

#[tokio::test]
async fn test_duplicate_code_is_409() {
    let server = create_test_server();
    create_dir(&server, "ops", None).await;
    let response = server
        .post(MENUS)
        .json(&json!({ "name": "Again", "code": "ops", "type": "directory" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&response), "MENU_CODE_EXISTS");
}

#[tokio::test]
async fn test_create_with_new_permission() {
    let server = create_test_server();
    let response = server
        .post(MENUS)
        .json(&json!({
            "name": "Roles", "code": "roles", "type": "directory",
            "create_permission": true
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    assert_eq!(created["permission_key"], "menu:roles");
    assert_eq!(created["risk_flags"], json!([]));
}

// =============================================================================
// UPDATE / DELETE TESTS
// =============================================================================

#[tokio::test]
async fn test_update_clears_optional_field() {
    let server = create_test_server();
    let id = create(
        &server,
        json!({ "name": "Home", "code": "home", "type": "directory", "icon": "house" }),
    )
    .await;

    let response = server
        .put(&format!("{MENUS}/{id}"))
        .json(&json!({ "icon": null, "name": "Start" }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert!(updated["icon"].is_null());
    assert_eq!(updated["name"], "Start");

    let logs: Value = server
        .get(&format!("{MENUS}/{id}/audit-logs"))
        .add_query_param("operation", "update")
        .await
        .json();
    assert_eq!(logs["total"], 1);
    assert_eq!(logs["records"][0]["changed_fields"], json!(["name", "icon"]));
}

#[tokio::test]
async fn test_delete_requires_cascade() {
    let server = create_test_server();
    let root = create_dir(&server, "root", None).await;
    create_dir(&server, "child", Some(root)).await;

    let response = server.delete(&format!("{MENUS}/{root}")).await;
    response.assert_status(StatusCode::PRECONDITION_FAILED);
    assert_eq!(error_code(&response), "MENU_HAS_CHILDREN");

    let response = server
        .delete(&format!("{MENUS}/{root}"))
        .add_query_param("cascade", true)
        .await;
    response.assert_status_ok();
    let impact: Value = response.json();
    assert_eq!(impact["children_count"], 1);
    assert_eq!(impact["deleted_count"], 2);

    server
        .get(&format!("{MENUS}/{root}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// =============================================================================
// STRUCTURE TESTS
// =============================================================================

#[tokio::test]
async fn test_move_into_descendant_is_409() {
    let server = create_test_server();
    let r = create_dir(&server, "r", None).await;
    let c1 = create_dir(&server, "c1", Some(r)).await;
    let c2 = create_dir(&server, "c2", Some(c1)).await;

    let response = server
        .post(&format!("{MENUS}/{r}/move"))
        .json(&json!({ "parent_id": c2, "order": 1 }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&response), "MENU_CYCLE_DETECTED");
}

#[tokio::test]
async fn test_reorder_and_mixed_parents() {
    let server = create_test_server();
    let p = create_dir(&server, "p", None).await;
    let a = create_dir(&server, "a", Some(p)).await;
    let b = create_dir(&server, "b", Some(p)).await;
    let other = create_dir(&server, "other", None).await;

    let response = server
        .post(&format!("{MENUS}/reorder"))
        .json(&json!({ "items": [ { "id": a, "order": 2 }, { "id": b, "order": 1 } ] }))
        .await;
    response.assert_status_ok();
    let outcome: Value = response.json();
    assert_eq!(outcome["success_count"], 2);
    assert_eq!(outcome["failed_count"], 0);

    let response = server
        .post(&format!("{MENUS}/reorder"))
        .json(&json!({ "items": [ { "id": a, "order": 5 }, { "id": other, "order": 6 } ] }))
        .await;
    response.assert_status_ok();
    let outcome: Value = response.json();
    assert_eq!(outcome["success_count"], 0);
    assert_eq!(outcome["failed_count"], 2);
    assert_eq!(outcome["errors"][0]["code"], "MENU_MIXED_PARENTS");

    let response = server
        .post(&format!("{MENUS}/reorder"))
        .json(&json!({ "items": [] }))
        .await;
    response.assert_status_bad_request();
    assert_eq!(error_code(&response), "MENU_BATCH_EMPTY");
}

#[tokio::test]
async fn test_toggles_and_permission_binding() {
    let server = create_test_server();
    let id = create_dir(&server, "settings", None).await;

    let response = server
        .put(&format!("{MENUS}/{id}/enabled"))
        .json(&json!({ "enabled": false }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["enabled"], false);

    let response = server
        .put(&format!("{MENUS}/{id}/visible"))
        .json(&json!({ "visible": false }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["visible"], false);

    let response = server
        .put(&format!("{MENUS}/{id}/permission"))
        .json(&json!({ "permission_key": "settings:view" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["permission_key"], "settings:view");

    let stats: Value = server.get(&format!("{MENUS}/stats")).await.json();
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["enabled"], 0);
    assert_eq!(stats["hidden"], 1);
    assert_eq!(stats["unbound_permission"], 0);

    let logs: Value = server.get(&format!("{MENUS}/audit-logs")).await.json();
    let ops: Vec<&str> = logs["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["operation"].as_str().unwrap())
        .collect();
    assert_eq!(ops, vec!["bind_permission", "hide", "disable", "create"]);
}

// =============================================================================
// READ TESTS
// =============================================================================

#[tokio::test]
async fn test_tree_filter_by_type() {
    let server = create_test_server();
    let d = create_dir(&server, "d", None).await;
    let p1 = create(
        &server,
        json!({ "name": "P1", "code": "p1", "type": "page", "path": "/p1", "parent_id": d }),
    )
    .await;
    create(
        &server,
        json!({ "name": "B", "code": "b", "type": "button", "parent_id": p1 }),
    )
    .await;

    let response = server
        .get(&format!("{MENUS}/tree"))
        .add_query_param("type", "page")
        .await;
    response.assert_status_ok();
    let tree: Value = response.json();
    assert_eq!(tree["total"], 1);
    assert_eq!(tree["items"][0]["id"], p1);
    assert_eq!(tree["items"][0]["children_count"], 0);

    let response = server
        .get(&format!("{MENUS}/tree"))
        .add_query_param("type", "widget")
        .await;
    response.assert_status_bad_request();
    assert_eq!(error_code(&response), "MENU_TYPE_INVALID");
}

#[tokio::test]
async fn test_inspection_reports_unbound() {
    let server = create_test_server();
    let id = create_dir(&server, "lonely", None).await;

    let response = server.get(&format!("{MENUS}/inspection")).await;
    response.assert_status_ok();
    let report: Value = response.json();
    assert_eq!(report["total"], 1);
    assert_eq!(report["items"][0]["menu_id"], id);
    assert_eq!(report["items"][0]["risk_type"], "UNBOUND_PERMISSION");
}

// =============================================================================
// AUTHENTICATION TESTS
// =============================================================================

#[tokio::test]
async fn test_auth_required_when_key_configured() {
    let config = Config {
        api_key: Some("s3cret".to_string()),
        ..test_config()
    };
    let server = create_server_with(&config);

    server.get("/health").await.assert_status_ok();

    let response = server.get(&format!("{MENUS}/stats")).await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .get(&format!("{MENUS}/stats"))
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer wrong"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .get(&format!("{MENUS}/stats"))
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let config = Config {
        rate_limit: 1,
        ..test_config()
    };
    let server = create_server_with(&config);

    server.get("/health").await.assert_status_ok();
    let response = server.get("/health").await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_code(&response), "RATE_LIMITED");
}
