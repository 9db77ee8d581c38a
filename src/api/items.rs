//! Inventory item endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::item::{CreateItem, Item, ItemQuery, ResizeStock},
    AppState,
};

use super::AuthenticatedUser;

/// List items
#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    security(("bearer_auth" = [])),
    params(ItemQuery),
    responses(
        (status = 200, description = "Items sorted by name", body = Vec<Item>)
    )
)]
pub async fn list_items(
    State(state): State<AppState>,
    AuthenticatedUser(_caller): AuthenticatedUser,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let items = state.services.items.list_items(&query).await?;
    Ok(Json(items))
}

/// Get item by ID
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item", body = Item),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    AuthenticatedUser(_caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Item>> {
    let item = state.services.items.get_item(id).await?;
    Ok(Json(item))
}

/// Create an item
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    security(("bearer_auth" = [])),
    request_body = CreateItem,
    responses(
        (status = 201, description = "Item created", body = Item),
        (status = 400, description = "Invalid item"),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(data): Json<CreateItem>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let item = state.services.items.create_item(&caller, data).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Change the total stock of an item
#[utoipa::path(
    put,
    path = "/items/{id}/stock",
    tag = "items",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Item ID")),
    request_body = ResizeStock,
    responses(
        (status = 200, description = "Stock updated", body = Item),
        (status = 400, description = "New total below units on loan"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn resize_stock(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<ResizeStock>,
) -> AppResult<Json<Item>> {
    let item = state.services.items.resize_stock(&caller, id, data).await?;
    Ok(Json(item))
}
