use axum::{
    extract::{OriginalUri, Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Terminal error stage. Every error response passes through here exactly
/// once and is rendered for the configured [`crate::config::ErrorMode`].
/// Error statuses produced outside the application (routing 405s, caught
/// panics) carry no [`ApiError`] and are wrapped first.
pub async fn handle_errors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let error = match response.extensions().get::<ApiError>() {
        Some(error) => error.clone(),
        None => ApiError::from_status(status, status.canonical_reason().unwrap_or("Request failed")),
    };

    if error.is_operational() {
        tracing::debug!(%method, %path, status = error.status_code(), message = error.message(), "Request failed");
    } else {
        tracing::error!(%method, %path, error = %error.message(), "Unexpected error");
    }

    error.render(state.error_mode())
}

/// Fallback for unmatched routes
pub async fn route_not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    let target = uri.path_and_query().map(|p| p.as_str()).unwrap_or_else(|| uri.path());
    ApiError::not_found(format!("Can't find {}", target))
}
