//! Item API Endpoints

use crate::api::ApiError;
use crate::auth::Principal;
use crate::error::ServiceError;
use crate::items::models::{CreateItemRequest, Item, ItemPatch, NewItem, UpdateItemRequest};
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::{debug, info};
use uuid::Uuid;

/// List items - GET /api/items
pub async fn list_items(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Json<Vec<Item>> {
    let items = state.items.list();
    debug!("{} listed {} items", principal.username, items.len());
    Json(items)
}

/// Get one item - GET /api/items/:id
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Item>, ApiError> {
    let id = parse_item_id(&id)?;
    Ok(Json(state.items.get(&id)?))
}

/// Create item - POST /api/items (Admin only)
///
/// Store writes run on the blocking pool.
pub async fn create_item(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let Json(payload) = payload?;
    let new_item = NewItem::parse(payload)?;

    let items = state.items.clone();
    let item = tokio::task::spawn_blocking(move || items.create(new_item)).await??;
    info!("{} created item {}", principal.username, item.id);

    Ok((StatusCode::CREATED, Json(item)))
}

/// Update item - PUT /api/items/:id (Admin only)
pub async fn update_item(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let Json(payload) = payload?;
    let patch = ItemPatch::parse(payload)?;
    let id = parse_item_id(&id)?;

    let items = state.items.clone();
    let item = tokio::task::spawn_blocking(move || items.update(&id, &patch)).await??;
    info!("{} updated item {}", principal.username, item.id);

    Ok(Json(item))
}

/// Delete item - DELETE /api/items/:id (Admin only)
pub async fn delete_item(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_item_id(&id)?;

    let items = state.items.clone();
    tokio::task::spawn_blocking(move || items.delete(&id)).await??;
    info!("{} deleted item {}", principal.username, id);

    Ok(StatusCode::NO_CONTENT)
}

/// Ids that are not UUIDs cannot name an item
fn parse_item_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw).map_err(|_| ServiceError::NotFound(format!("item {}", raw)))
}
