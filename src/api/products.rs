//! Product catalogue endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    models::{Product, ProductInput},
    utils::{AppError, AppJson, AppResult},
    AppState,
};

/// GET /api/products
pub(super) async fn list_products(State(state): State<AppState>) -> Json<Vec<Product>> {
    Json(state.products.list().await)
}

/// GET /api/products/{id}
pub(super) async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Product>> {
    state
        .products
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// POST /api/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    payload.validate()?;
    let product = state.products.create(payload).await;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/products/{id}
pub(super) async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<ProductInput>,
) -> AppResult<Json<Product>> {
    payload.validate()?;
    state
        .products
        .update(id, payload)
        .await
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// DELETE /api/products/{id}
pub(super) async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if state.products.delete(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Product {} not found", id))
}
