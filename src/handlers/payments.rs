use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::AppState;
use crate::models::payment::{CreatePaymentRequest, FailPaymentRequest, PaymentView, VerifyPaymentRequest};
use crate::services::payments::PaymentError;

use super::{ApiError, api_error, internal_error};

pub fn map_payment_error(err: PaymentError) -> ApiError {
    let status = match &err {
        PaymentError::NotFound(_) | PaymentError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::Validation(_) => StatusCode::BAD_REQUEST,
        PaymentError::OrderNotLinked(_) | PaymentError::InvalidTransition { .. } => StatusCode::CONFLICT,
        PaymentError::IntegrityViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PaymentError::Database(e) => return internal_error("Payment operation failed", e),
    };
    api_error(status, err.to_string(), err.code())
}

/// POST /api/payments
///
/// Opens a pending invoice. The returned `transaction_id` is the `TXN_`
/// token the order is placed with.
pub async fn create_payment(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentView>), ApiError> {
    let payment = state.payments.create_invoice(&payload).await.map_err(map_payment_error)?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// GET /api/payments/{transaction_id}
pub async fn get_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<PaymentView>, ApiError> {
    state.payments.get(&transaction_id).await.map(Json).map_err(map_payment_error)
}

/// POST /api/payments/{transaction_id}/verify
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    payload: Option<Json<VerifyPaymentRequest>>,
) -> Result<Json<PaymentView>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    state
        .payments
        .verify(&transaction_id, payload.external_payment_id.as_deref())
        .await
        .map(Json)
        .map_err(map_payment_error)
}

/// POST /api/payments/{transaction_id}/fail
pub async fn fail_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    payload: Option<Json<FailPaymentRequest>>,
) -> Result<Json<PaymentView>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    state
        .payments
        .fail(&transaction_id, payload.reason.as_deref())
        .await
        .map(Json)
        .map_err(map_payment_error)
}

/// POST /api/payments/{transaction_id}/refund
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<PaymentView>, ApiError> {
    state.payments.refund(&transaction_id).await.map(Json).map_err(map_payment_error)
}
