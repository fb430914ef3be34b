use axum::Json;
use chrono::Utc;

use crate::models::precondition::ValidateTokenRequest;
use crate::services::preconditions::{self, TokenCheck};

/// POST /api/preconditions/validate
///
/// Lets the agent check a token before it builds an order. Always 200; the
/// verdict is in the body.
pub async fn validate_token(Json(payload): Json<ValidateTokenRequest>) -> Json<TokenCheck> {
    Json(preconditions::check(payload.kind, payload.token.trim(), Utc::now()))
}
