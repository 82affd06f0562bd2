//! # navtree HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! Under `/api/v1/system/menus`:
//!
//! - `POST /` - Create a menu
//! - `GET /tree` - Filtered menu forest
//! - `GET /inspection` - Risk report
//! - `GET /stats` - Aggregate counts
//! - `GET /audit-logs` - Audit records across all menus
//! - `POST /reorder` - Batch sibling reorder
//! - `GET|PUT|DELETE /{id}` - Read, update, soft delete (`?cascade=true`)
//! - `POST /{id}/move` - Reparent and reposition
//! - `PUT /{id}/enabled`, `PUT /{id}/visible` - Toggles
//! - `PUT /{id}/permission` - Bind or provision a permission
//! - `GET /{id}/audit-logs` - Audit records of one menu
//!
//! Plus `GET /health`, which never requires authentication.
//!
//! The acting user is read from the `X-User-Id` / `X-User-Name` headers.

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{ApiKey, keys_match};
pub use middleware::{
    GlobalRateLimiter, RequestActor, USER_ID_HEADER, USER_NAME_HEADER, actor_from_headers,
    create_rate_limiter,
};
pub use types::{
    ApiError, AuditLogQuery, BindPermissionRequest, CreateMenuRequest, ErrorResponse,
    HealthResponse, ListResponse, MoveMenuRequest, ReorderRequest, ToggleEnabledRequest,
    ToggleVisibleRequest, TreeQuery, UpdateMenuRequest, status_for,
};

use crate::config::Config;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use navtree_core::{MenuEngine, MenuError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Route prefix of the menu API.
pub const MENU_API_PREFIX: &str = "/api/v1/system/menus";

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the menu engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RwLock<MenuEngine>>,
}

impl AppState {
    #[must_use]
    pub fn new(engine: MenuEngine) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

fn cors_headers() -> [HeaderName; 4] {
    [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(USER_ID_HEADER),
        HeaderName::from_static(USER_NAME_HEADER),
    ]
}

/// Build the CORS layer from the configured origins.
///
/// `"*"` allows any origin. No configured (or no valid) origin falls back
/// to localhost only.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(hv) => {
                tracing::info!("CORS: Allowing origin: {}", origin);
                Some(hv)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        tracing::info!("CORS: No valid origins configured, defaulting to localhost only");
        return build_localhost_cors();
    }

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(CORS_METHODS)
        .allow_headers(cors_headers())
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers(cors_headers())
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

fn menu_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_menu_handler))
        .route("/tree", get(handlers::tree_handler))
        .route("/inspection", get(handlers::inspection_handler))
        .route("/stats", get(handlers::stats_handler))
        .route("/audit-logs", get(handlers::audit_log_handler))
        .route("/reorder", post(handlers::reorder_handler))
        .route(
            "/{id}",
            get(handlers::get_menu_handler)
                .put(handlers::update_menu_handler)
                .delete(handlers::delete_menu_handler),
        )
        .route("/{id}/move", post(handlers::move_menu_handler))
        .route("/{id}/enabled", put(handlers::toggle_enabled_handler))
        .route("/{id}/visible", put(handlers::toggle_visible_handler))
        .route("/{id}/permission", put(handlers::bind_permission_handler))
        .route("/{id}/audit-logs", get(handlers::menu_audit_log_handler))
}

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - global quota (if enabled)
/// 4. Authentication - validates API key (if configured)
pub fn create_router(state: AppState, config: &Config) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .nest(MENU_API_PREFIX, menu_routes());

    match config.api_key() {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            let key: ApiKey = Arc::from(key);
            router = router.layer(axum_middleware::from_fn_with_state(
                key,
                auth::api_key_auth_middleware,
            ));
        }
        None => tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set NAVTREE_API_KEY to enable authentication."
        ),
    }

    match create_rate_limiter(config.rate_limit) {
        Some(limiter) => {
            tracing::info!("Rate limiting enabled: {} requests/second", config.rate_limit);
            router = router.layer(axum_middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit_middleware,
            ));
        }
        None => tracing::info!("Rate limiting disabled"),
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(&config.cors_origins))
                .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and serve until Ctrl+C.
pub async fn run_server(config: &Config, engine: MenuEngine) -> Result<(), MenuError> {
    let router = create_router(AppState::new(engine), config);
    let addr = config.bind_addr();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MenuError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("navtree HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| MenuError::Io(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
