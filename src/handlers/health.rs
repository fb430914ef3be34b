use axum::{Json, extract::State, http::StatusCode};
use sea_orm::ConnectionTrait;
use serde::Serialize;

use crate::AppState;

use super::{ApiError, api_error};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.db.execute_unprepared("SELECT 1").await.map_err(|e| {
        tracing::error!(error = %e, "Health check database ping failed");
        api_error(StatusCode::SERVICE_UNAVAILABLE, "Database unavailable", "DATABASE_ERROR")
    })?;

    Ok(Json(HealthResponse {
        status: "ok",
        database: "ok",
    }))
}
