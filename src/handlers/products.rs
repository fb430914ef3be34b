use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::AppState;
use crate::models::product::{InventoryCheckRequest, InventoryCheckResponse, ProductListQuery, ProductView};
use crate::services::catalog::CatalogError;

use super::{ApiError, api_error, internal_error};

pub fn map_catalog_error(err: CatalogError) -> ApiError {
    match &err {
        CatalogError::ProductNotFound(_) => api_error(StatusCode::NOT_FOUND, err.to_string(), err.code()),
        CatalogError::Validation(_) => api_error(StatusCode::BAD_REQUEST, err.to_string(), err.code()),
        CatalogError::Database(e) => internal_error("Catalog query failed", e),
    }
}

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    state.catalog.list_products(&query).await.map(Json).map_err(map_catalog_error)
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
) -> Result<Json<ProductView>, ApiError> {
    state.catalog.get_product(product_id).await.map(Json).map_err(map_catalog_error)
}

/// POST /api/inventory/check
///
/// Reports availability per product and, when every line can be fulfilled,
/// issues the `INV_` token required to place the order.
pub async fn check_inventory(
    State(state): State<AppState>,
    Json(payload): Json<InventoryCheckRequest>,
) -> Result<Json<InventoryCheckResponse>, ApiError> {
    state.catalog.check_inventory(&payload).await.map(Json).map_err(map_catalog_error)
}
