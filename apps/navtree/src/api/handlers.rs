//! # API Endpoint Handlers
//!
//! Every handler takes the engine lock for the duration of one engine call.
//! Writes take the write lock; reads share the read lock.

use super::{
    AppState,
    middleware::RequestActor,
    types::{
        ApiResult, AuditLogQuery, BindPermissionRequest, CreateMenuRequest, DeleteQuery,
        HealthResponse, ListResponse, MoveMenuRequest, ReorderRequest, ToggleEnabledRequest,
        ToggleVisibleRequest, TreeQuery, UpdateMenuRequest,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use navtree_core::{
    AuditPage, DeleteImpact, MenuDetail, MenuId, MenuStats, MenuView, ReorderOutcome, RiskItem,
    TreeView,
};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// READ HANDLERS
// =============================================================================

/// `GET /menus/tree`: filtered forest.
pub async fn tree_handler(
    State(state): State<AppState>,
    Query(query): Query<TreeQuery>,
) -> ApiResult<Json<ListResponse<TreeView>>> {
    let filter = query.into_filter()?;
    let engine = state.engine.read().await;
    Ok(Json(engine.get_tree(&filter)?.into()))
}

/// `GET /menus/{id}`: one menu with derived fields and last audit entry.
pub async fn get_menu_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<MenuDetail>> {
    let engine = state.engine.read().await;
    Ok(Json(engine.get_menu(MenuId(id))?))
}

/// `GET /menus/inspection`: risk report.
pub async fn inspection_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<ListResponse<RiskItem>>> {
    let engine = state.engine.read().await;
    Ok(Json(engine.inspect()?.into()))
}

/// `GET /menus/stats`: aggregate counts.
pub async fn stats_handler(State(state): State<AppState>) -> ApiResult<Json<MenuStats>> {
    let engine = state.engine.read().await;
    Ok(Json(engine.stats()?))
}

/// `GET /menus/audit-logs`: audit records across all menus.
pub async fn audit_log_handler(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<AuditPage>> {
    let query = query.into_query(None)?;
    let engine = state.engine.read().await;
    Ok(Json(engine.audit_log(&query)?))
}

/// `GET /menus/{id}/audit-logs`: audit records of one menu.
pub async fn menu_audit_log_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<AuditPage>> {
    let query = query.into_query(Some(MenuId(id)))?;
    let engine = state.engine.read().await;
    Ok(Json(engine.audit_log(&query)?))
}

// =============================================================================
// WRITE HANDLERS
// =============================================================================

/// `POST /menus`: create a menu.
pub async fn create_menu_handler(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(request): Json<CreateMenuRequest>,
) -> ApiResult<(StatusCode, Json<MenuView>)> {
    let req = request.into_create()?;
    let mut engine = state.engine.write().await;
    let node = engine.create_menu(req, &actor)?;
    Ok((StatusCode::CREATED, Json(engine.describe(node)?)))
}

/// `PUT /menus/{id}`: partial update.
pub async fn update_menu_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    RequestActor(actor): RequestActor,
    Json(request): Json<UpdateMenuRequest>,
) -> ApiResult<Json<MenuView>> {
    let patch = request.into_patch()?;
    let mut engine = state.engine.write().await;
    let node = engine.update_menu(MenuId(id), patch, &actor)?;
    Ok(Json(engine.describe(node)?))
}

/// `DELETE /menus/{id}?cascade=true`: soft delete.
pub async fn delete_menu_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<DeleteQuery>,
    RequestActor(actor): RequestActor,
) -> ApiResult<Json<DeleteImpact>> {
    let mut engine = state.engine.write().await;
    Ok(Json(engine.delete_menu(MenuId(id), query.cascade, &actor)?))
}

/// `POST /menus/{id}/move`: reparent and reposition.
pub async fn move_menu_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    RequestActor(actor): RequestActor,
    Json(request): Json<MoveMenuRequest>,
) -> ApiResult<Json<MenuView>> {
    let mut engine = state.engine.write().await;
    let node = engine.move_menu(
        MenuId(id),
        request.parent_id.map(MenuId),
        request.order,
        &actor,
    )?;
    Ok(Json(engine.describe(node)?))
}

/// `POST /menus/reorder`: batch sibling reorder.
pub async fn reorder_handler(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(request): Json<ReorderRequest>,
) -> ApiResult<Json<ReorderOutcome>> {
    let mut engine = state.engine.write().await;
    Ok(Json(engine.reorder_menus(request.items, &actor)?))
}

/// `PUT /menus/{id}/enabled`.
pub async fn toggle_enabled_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    RequestActor(actor): RequestActor,
    Json(request): Json<ToggleEnabledRequest>,
) -> ApiResult<Json<MenuView>> {
    let mut engine = state.engine.write().await;
    let node = engine.toggle_enabled(MenuId(id), request.enabled, &actor)?;
    Ok(Json(engine.describe(node)?))
}

/// `PUT /menus/{id}/visible`.
pub async fn toggle_visible_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    RequestActor(actor): RequestActor,
    Json(request): Json<ToggleVisibleRequest>,
) -> ApiResult<Json<MenuView>> {
    let mut engine = state.engine.write().await;
    let node = engine.toggle_visible(MenuId(id), request.visible, &actor)?;
    Ok(Json(engine.describe(node)?))
}

/// `PUT /menus/{id}/permission`: bind a key or provision a new one.
pub async fn bind_permission_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    RequestActor(actor): RequestActor,
    Json(request): Json<BindPermissionRequest>,
) -> ApiResult<Json<MenuView>> {
    let binding = request.into_binding()?;
    let mut engine = state.engine.write().await;
    let node = engine.bind_permission(MenuId(id), binding, &actor)?;
    Ok(Json(engine.describe(node)?))
}
