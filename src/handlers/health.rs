use axum::extract::State;
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /
pub async fn root() -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "tours": "/api/v1/tours",
            "users": "/api/v1/users",
            "guides": "/api/v1/guides",
            "health": "/health",
        },
    })))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    if let Err(e) = state.tours.ping().await {
        tracing::warn!(error = %e, "Health check failed");
        return Err(ApiError::service_unavailable("Database temporarily unavailable"));
    }

    Ok(ApiResponse::success(json!({
        "database": "connected",
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
