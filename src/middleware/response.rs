use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Success envelope: `{status: "success", token?, results?, message?, data?}`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub status_code: Option<StatusCode>,
    pub results: Option<usize>,
    pub token: Option<String>,
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            status_code: None,
            results: None,
            token: None,
            message: None,
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self::success(data).with_status(StatusCode::CREATED)
    }

    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Number of documents in a list response
    pub fn with_results(mut self, results: usize) -> Self {
        self.results = Some(results);
        self
    }

    /// Session token issued alongside the data
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

impl ApiResponse<()> {
    /// `{status: "success", message}` with no data
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            data: None,
            status_code: None,
            results: None,
            token: None,
            message: Some(message.into()),
        }
    }

    /// Create a 204 No Content response
    pub fn no_content() -> Self {
        Self {
            data: None,
            status_code: Some(StatusCode::NO_CONTENT),
            results: None,
            token: None,
            message: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        // For 204 No Content, return empty response
        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }

        let mut envelope = Map::new();
        envelope.insert("status".into(), Value::from("success"));
        if let Some(token) = self.token {
            envelope.insert("token".into(), Value::from(token));
        }
        if let Some(results) = self.results {
            envelope.insert("results".into(), Value::from(results));
        }
        if let Some(message) = self.message {
            envelope.insert("message".into(), Value::from(message));
        }
        if let Some(data) = self.data {
            match serde_json::to_value(&data) {
                Ok(value) => {
                    envelope.insert("data".into(), value);
                }
                Err(e) => {
                    return ApiError::unexpected(format!("Failed to serialize response data: {}", e)).into_response();
                }
            }
        }

        (status, Json(Value::Object(envelope))).into_response()
    }
}

// Convenience type alias
pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;
