//! Customer-facing order endpoints
//!
//! POST /api/orders is the only way an order comes into existence. It needs
//! fresh location, inventory and payment tokens; see
//! [`crate::services::order_engine`] for the transaction itself.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{info, warn};

use crate::AppState;
use crate::models::order::{CreateOrderRequest, OrderView};
use crate::services::order_engine::OrderError;
use crate::services::order_store;

use super::payments::map_payment_error;
use super::{ApiError, api_error, internal_error, sanitize_field};

const MAX_NAME_LENGTH: usize = 120;
const MAX_ADDRESS_LENGTH: usize = 500;
const MAX_PHONE_LENGTH: usize = 32;
const MAX_NOTES_LENGTH: usize = 1000;

pub fn map_order_error(err: OrderError) -> ApiError {
    let status = match &err {
        OrderError::MissingPrecondition { .. }
        | OrderError::InvalidPrecondition(_)
        | OrderError::TokenAlreadyUsed { .. }
        | OrderError::TotalMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        OrderError::Validation(_) => StatusCode::BAD_REQUEST,
        OrderError::ProductNotFound { .. } => StatusCode::NOT_FOUND,
        OrderError::ProductUnavailable { .. } | OrderError::InsufficientStock { .. } => StatusCode::CONFLICT,
        OrderError::StockConsistency { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        OrderError::Database(e) => return internal_error("Order transaction failed", e),
    };
    api_error(status, err.to_string(), err.code())
}

/// POST /api/orders
///
/// ```json
/// {
///   "customer_id": "chat-42",
///   "customer_name": "Dana",
///   "delivery_address": "1 Main St",
///   "items": [{ "product_id": 1, "quantity": 2, "unit_price": "10.00" }],
///   "total_amount": "20.00",
///   "location_token": "LOC_20261017_120000_1A2B3C4D",
///   "inventory_token": "INV_20261017_121500_5E6F7A8B",
///   "payment_token": "TXN_20261017_122000_9C0D1E2F"
/// }
/// ```
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let correlation_id = uuid::Uuid::new_v4().to_string();
    info!(
        correlation_id = %correlation_id,
        customer_id = %payload.customer_id,
        items = payload.items.len(),
        total = %payload.total_amount,
        "Order creation request received"
    );

    let request = sanitize_request(payload)?;

    let order = state.orders.create_order(request).await.map_err(|e| {
        warn!(correlation_id = %correlation_id, code = e.code(), error = %e, "Order creation failed");
        map_order_error(e)
    })?;

    info!(correlation_id = %correlation_id, order_id = %order.id, "Order creation completed");
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    order_store::load_order(&state.db, &order_id)
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

/// POST /api/orders/{id}/payment/confirm
///
/// Copies the outcome of the payment the order was placed with onto the
/// order's payment status.
pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    state
        .payments
        .confirm_order_payment(&order_id)
        .await
        .map(Json)
        .map_err(map_payment_error)
}

fn sanitize_request(payload: CreateOrderRequest) -> Result<CreateOrderRequest, ApiError> {
    let optional = |field: &str, value: Option<String>, max: usize| -> Result<Option<String>, ApiError> {
        value
            .map(|v| sanitize_field(field, &v, max))
            .transpose()
            .map(|v| v.filter(|s| !s.is_empty()))
    };

    Ok(CreateOrderRequest {
        customer_id: sanitize_field("Customer id", &payload.customer_id, MAX_NAME_LENGTH)?,
        customer_name: sanitize_field("Customer name", &payload.customer_name, MAX_NAME_LENGTH)?,
        delivery_address: sanitize_field("Delivery address", &payload.delivery_address, MAX_ADDRESS_LENGTH)?,
        phone: optional("Phone", payload.phone, MAX_PHONE_LENGTH)?,
        notes: optional("Notes", payload.notes, MAX_NOTES_LENGTH)?,
        ..payload
    })
}
