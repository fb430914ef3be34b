//! HTTP handlers
//!
//! Every handler returns `Result<Json<T>, ApiError>`; errors carry an
//! [`ErrorResponse`] body with a stable `code`.

pub mod admin;
pub mod health;
pub mod orders;
pub mod payments;
pub mod preconditions;
pub mod products;

use axum::{
    Json,
    http::{StatusCode, header::HeaderMap},
};
use std::fmt::Display;
use tracing::{error, warn};

use crate::AppState;
use crate::models::error::ErrorResponse;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub const API_KEY_HEADER: &str = "x-api-key";
pub const SESSION_HEADER: &str = "x-admin-session";
/// Optional operator name sent alongside an API key
pub const ACTOR_HEADER: &str = "x-admin-actor";

/// Actor recorded when an API key is used without naming one
pub const DEFAULT_ADMIN_ACTOR: &str = "admin";

pub fn api_error(status: StatusCode, message: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: Some(code.to_string()),
        }),
    )
}

/// Log the underlying failure and answer with a generic 500
pub fn internal_error(context: &str, err: impl Display) -> ApiError {
    error!(error = %err, "{}", context);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", "DATABASE_ERROR")
}

/// Remove control characters and null bytes, collapse whitespace
pub fn sanitize_input(input: &str) -> String {
    input
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| !c.is_control())
        .filter(|c| !matches!(c, '\u{200B}'..='\u{200F}' | '\u{2028}'..='\u{202F}' | '\u{FEFF}'))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Sanitize and bound a free-text field
pub fn sanitize_field(field: &str, value: &str, max_len: usize) -> Result<String, ApiError> {
    let cleaned = sanitize_input(value);
    if cleaned.chars().count() > max_len {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("{} exceeds {} characters", field, max_len),
            "VALIDATION_ERROR",
        ));
    }
    Ok(cleaned)
}

/// Authenticate an admin request by session or API key; returns the actor
pub async fn check_admin_auth(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(session) = header(SESSION_HEADER) {
        return match state.sessions.validate(session).await {
            Some(actor) => Ok(actor),
            None => {
                warn!("Invalid or expired admin session");
                Err(api_error(
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired session",
                    "UNAUTHORIZED",
                ))
            }
        };
    }

    let Some(admin_key) = state.config.admin_api_key.as_deref() else {
        error!("ADMIN_API_KEY not configured");
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server configuration error",
            "CONFIG_ERROR",
        ));
    };

    if header(API_KEY_HEADER) != Some(admin_key) {
        warn!("Invalid or missing API key");
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Invalid or missing API key",
            "UNAUTHORIZED",
        ));
    }

    Ok(header(ACTOR_HEADER)
        .map(sanitize_input)
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| DEFAULT_ADMIN_ACTOR.to_string()))
}
