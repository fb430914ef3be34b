//! Operator console endpoints
//!
//! All routes here require `X-API-Key` (optionally with `X-Admin-Actor`) or an
//! `X-Admin-Session` token obtained from POST /api/admin/login.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header::HeaderMap},
};
use tracing::info;

use crate::AppState;
use crate::models::admin::{
    LoginRequest, LoginResponse, OrderDetailResponse, OrderListQuery, OrderListResponse, OrderStatistics,
    StatsQuery,
};
use crate::models::order::{BulkStatusRequest, BulkStatusResponse, StatusUpdateResponse, UpdateStatusRequest};
use crate::models::product::{ProductView, SetStockRequest};
use crate::services::order_status::StatusError;

use super::products::map_catalog_error;
use super::{
    ApiError, DEFAULT_ADMIN_ACTOR, SESSION_HEADER, api_error, check_admin_auth, internal_error, sanitize_field,
    sanitize_input,
};

const MAX_STATUS_NOTES_LENGTH: usize = 1000;
const MAX_BULK_ORDERS: usize = 100;

pub fn map_status_error(err: StatusError) -> ApiError {
    let status = match &err {
        StatusError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        StatusError::InvalidTransition { .. } => StatusCode::CONFLICT,
        StatusError::Database(e) => return internal_error("Status update failed", e),
    };
    api_error(status, err.to_string(), err.code())
}

/// POST /api/admin/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some(admin_key) = state.config.admin_api_key.as_deref() else {
        tracing::error!("ADMIN_API_KEY not configured");
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server configuration error",
            "CONFIG_ERROR",
        ));
    };

    if payload.api_key != admin_key {
        tracing::warn!("Admin login with invalid API key");
        return Err(api_error(StatusCode::UNAUTHORIZED, "Invalid API key", "UNAUTHORIZED"));
    }

    let actor = payload
        .actor
        .as_deref()
        .map(sanitize_input)
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| DEFAULT_ADMIN_ACTOR.to_string());

    let session_token = state.sessions.create(&actor).await;
    info!(actor = %actor, "Admin logged in");

    Ok(Json(LoginResponse {
        session_token,
        actor,
        expires_in_secs: state.sessions.ttl().as_secs(),
    }))
}

/// POST /api/admin/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, ApiError> {
    let actor = check_admin_auth(&state, &headers).await?;
    if let Some(token) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
        state.sessions.destroy(token.trim()).await;
        info!(actor = %actor, "Admin logged out");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/orders?status=&from=&to=&customer=&limit=&offset=
pub async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrderListResponse>, ApiError> {
    check_admin_auth(&state, &headers).await?;
    state
        .admin
        .list_orders(&query)
        .await
        .map(Json)
        .map_err(|e| internal_error("Order listing failed", e))
}

/// GET /api/admin/orders/{id}
pub async fn get_order_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDetailResponse>, ApiError> {
    check_admin_auth(&state, &headers).await?;
    state
        .admin
        .order_detail(&order_id)
        .await
        .map_err(|e| internal_error("Order lookup failed", e))?
        .map(Json)
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("Order {} not found", order_id),
                "ORDER_NOT_FOUND",
            )
        })
}

/// POST /api/admin/orders/{id}/status
pub async fn update_order_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<StatusUpdateResponse>, ApiError> {
    let actor = check_admin_auth(&state, &headers).await?;
    let notes = notes_field(payload.notes.as_deref())?;

    state
        .status
        .update_status(&order_id, payload.status, notes.as_deref(), Some(&actor))
        .await
        .map(Json)
        .map_err(map_status_error)
}

/// POST /api/admin/orders/bulk-status
///
/// Per-order results; one order failing does not stop the others.
pub async fn bulk_update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BulkStatusRequest>,
) -> Result<Json<BulkStatusResponse>, ApiError> {
    let actor = check_admin_auth(&state, &headers).await?;

    if payload.order_ids.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "At least one order id is required",
            "VALIDATION_ERROR",
        ));
    }
    if payload.order_ids.len() > MAX_BULK_ORDERS {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("At most {} orders per bulk update", MAX_BULK_ORDERS),
            "VALIDATION_ERROR",
        ));
    }
    let notes = notes_field(payload.notes.as_deref())?;

    let response = state
        .status
        .bulk_update_status(&payload.order_ids, payload.status, notes.as_deref(), Some(&actor))
        .await;

    info!(
        actor = %actor,
        status = %payload.status,
        succeeded = response.success_count,
        failed = response.failure_count,
        "Bulk status update finished"
    );
    Ok(Json(response))
}

/// GET /api/admin/stats?from=&to=
pub async fn get_statistics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StatsQuery>,
) -> Result<Json<OrderStatistics>, ApiError> {
    check_admin_auth(&state, &headers).await?;
    state
        .admin
        .statistics(&query)
        .await
        .map(Json)
        .map_err(|e| internal_error("Statistics query failed", e))
}

/// PUT /api/admin/products/{id}/stock
pub async fn set_product_stock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<i32>,
    Json(payload): Json<SetStockRequest>,
) -> Result<Json<ProductView>, ApiError> {
    let actor = check_admin_auth(&state, &headers).await?;
    let product = state
        .catalog
        .set_stock(product_id, payload.stock)
        .await
        .map_err(map_catalog_error)?;

    info!(actor = %actor, product_id, stock = product.stock, "Stock set by admin");
    Ok(Json(product))
}

fn notes_field(notes: Option<&str>) -> Result<Option<String>, ApiError> {
    notes
        .map(|n| sanitize_field("Notes", n, MAX_STATUS_NOTES_LENGTH))
        .transpose()
        .map(|n| n.filter(|s| !s.is_empty()))
}
