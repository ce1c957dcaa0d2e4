// HTTP API Error Types
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::{PasswordError, TokenError};
use crate::config::ErrorMode;
use crate::database::DatabaseError;
use crate::filter::FilterError;

/// Generic message sent in place of unanticipated failures
pub const GENERIC_MESSAGE: &str = "Something went very wrong!";

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Every variant except [`ApiError::Unexpected`] is operational: created at a
/// point that anticipated the failure, with a message safe to show clients.
#[derive(Debug, Clone)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 405 Method Not Allowed
    MethodNotAllowed(String),

    // 409 Conflict
    Conflict(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 500 Internal Server Error, anticipated (e.g. email dispatch failed)
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    // 500, unanticipated; carries internal diagnostic detail
    Unexpected(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::MethodNotAllowed(_) => 405,
            ApiError::Conflict(_) => 409,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Unexpected(_) => 500,
        }
    }

    /// `"fail"` for client errors, `"error"` for everything else
    pub fn status(&self) -> &'static str {
        status_class(self.status_code())
    }

    pub fn is_operational(&self) -> bool {
        !matches!(self, ApiError::Unexpected(_))
    }

    /// Error message; for `Unexpected` this is the internal diagnostic
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::MethodNotAllowed(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Unexpected(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Unexpected(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Status code the client sees; unanticipated errors always surface as 500
    pub fn response_status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Convert to JSON response body
    pub fn to_json(&self, mode: ErrorMode) -> Value {
        match mode {
            ErrorMode::Verbose => {
                let mut error = json!({
                    "code": self.error_code(),
                    "statusCode": self.status_code(),
                    "isOperational": self.is_operational(),
                    "detail": format!("{:?}", self),
                });
                if let ApiError::ValidationError { field_errors: Some(field_errors), .. } = self {
                    error["fieldErrors"] = json!(field_errors);
                }
                json!({
                    "status": self.status(),
                    "message": self.message(),
                    "error": error,
                })
            }
            ErrorMode::Strict if self.is_operational() => {
                let mut response = json!({
                    "status": self.status(),
                    "message": self.message(),
                });
                if let ApiError::ValidationError { field_errors: Some(field_errors), .. } = self {
                    response["errors"] = json!(field_errors);
                }
                response
            }
            ErrorMode::Strict => json!({
                "status": "error",
                "message": GENERIC_MESSAGE,
            }),
        }
    }

    /// Wrap a bare error status produced outside the application
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status.as_u16() {
            400 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            405 => ApiError::MethodNotAllowed(message),
            409 => ApiError::Conflict(message),
            413 => ApiError::PayloadTooLarge(message),
            503 => ApiError::ServiceUnavailable(message),
            code if (400..500).contains(&code) => ApiError::BadRequest(message),
            _ => ApiError::Unexpected(message),
        }
    }
}

pub fn status_class(status_code: u16) -> &'static str {
    if (400..500).contains(&status_code) {
        "fail"
    } else {
        "error"
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        ApiError::Unexpected(message.into())
    }
}

/// Failure shapes raised by collaborators (store, token library, schema
/// validation) that get rewritten into operational errors
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalError {
    MalformedValue { field: String, value: String },
    DuplicateKey { field: String, value: String },
    SchemaValidation { messages: Vec<String>, field_errors: HashMap<String, String> },
    InvalidToken,
    ExpiredToken,
}

/// The single boundary where collaborator failures enter the taxonomy
pub fn translate(err: ExternalError) -> ApiError {
    match err {
        ExternalError::MalformedValue { field, value } => {
            ApiError::bad_request(format!("Invalid {}: {}.", field, value))
        }
        ExternalError::DuplicateKey { field, value } => {
            tracing::debug!("Duplicate key on field '{}'", field);
            ApiError::conflict(format!("Duplicate field value: {}. Please use another value!", value))
        }
        ExternalError::SchemaValidation { messages, field_errors } => {
            let message = if messages.is_empty() {
                "Invalid input data.".to_string()
            } else {
                format!("Invalid input data. {}", messages.join(". "))
            };
            ApiError::validation_error(message, Some(field_errors).filter(|f| !f.is_empty()))
        }
        ExternalError::InvalidToken => ApiError::unauthorized("Invalid token. Please log in again!"),
        ExternalError::ExpiredToken => ApiError::unauthorized("Your token has expired! Please log in again."),
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::InvalidValue { field, value } => {
                translate(ExternalError::MalformedValue { field, value })
            }
            DatabaseError::UniqueViolation { field, value } => {
                translate(ExternalError::DuplicateKey { field, value })
            }
            DatabaseError::CheckViolation(constraint) => translate(ExternalError::SchemaValidation {
                messages: vec![format!("Constraint '{}' violated", constraint)],
                field_errors: HashMap::new(),
            }),
            DatabaseError::Unavailable(msg) => {
                tracing::error!("Database unavailable: {}", msg);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            other => ApiError::unexpected(format!("Database error: {}", other)),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => translate(ExternalError::ExpiredToken),
            TokenError::Invalid(_) => translate(ExternalError::InvalidToken),
            TokenError::Signing(msg) => ApiError::unexpected(format!("Token signing failed: {}", msg)),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::unexpected(err.to_string())
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages = Vec::new();
        let mut field_errors = HashMap::new();

        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        for (field, errs) in fields {
            for err in errs.iter() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                messages.push(message.clone());
                // Struct-level checks are reported under "__all__"
                if field != "__all__" {
                    field_errors.entry(field.to_string()).or_insert(message);
                }
            }
        }

        translate(ExternalError::SchemaValidation { messages, field_errors })
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Final client-facing response for `mode`
    pub fn render(&self, mode: ErrorMode) -> Response {
        let status = if self.is_operational() {
            self.response_status()
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(self.to_json(mode))).into_response()
    }
}

// Renders the strict form and attaches the error itself so the global
// error handler can re-render it for the configured mode
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.render(ErrorMode::Strict);
        response.extensions_mut().insert(self);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_class_follows_status_code() {
        assert_eq!(ApiError::not_found("x").status(), "fail");
        assert_eq!(ApiError::forbidden("x").status(), "fail");
        assert_eq!(ApiError::internal_server_error("x").status(), "error");
        assert_eq!(ApiError::unexpected("x").status(), "error");
        assert_eq!(status_class(503), "error");
    }

    #[test]
    fn only_unexpected_errors_are_non_operational() {
        assert!(ApiError::bad_request("x").is_operational());
        assert!(ApiError::internal_server_error("x").is_operational());
        assert!(!ApiError::unexpected("x").is_operational());
    }

    #[test]
    fn strict_mode_hides_unexpected_details() {
        let body = ApiError::unexpected("connection reset by peer").to_json(ErrorMode::Strict);
        assert_eq!(body, json!({ "status": "error", "message": GENERIC_MESSAGE }));
    }

    #[test]
    fn strict_mode_shows_operational_message() {
        let body = ApiError::not_found("No tour found with that ID").to_json(ErrorMode::Strict);
        assert_eq!(body, json!({ "status": "fail", "message": "No tour found with that ID" }));
    }

    #[test]
    fn verbose_mode_includes_diagnostics() {
        let body = ApiError::unexpected("connection reset by peer").to_json(ErrorMode::Verbose);
        assert_eq!(body["message"], "connection reset by peer");
        assert_eq!(body["error"]["isOperational"], false);
        assert_eq!(body["error"]["statusCode"], 500);
    }

    #[test]
    fn translation_table() {
        let cases = [
            (
                ExternalError::MalformedValue { field: "price".into(), value: "cheap".into() },
                400,
                "Invalid price: cheap.",
            ),
            (
                ExternalError::DuplicateKey { field: "email".into(), value: "a@b.io".into() },
                409,
                "Duplicate field value: a@b.io. Please use another value!",
            ),
            (ExternalError::InvalidToken, 401, "Invalid token. Please log in again!"),
            (ExternalError::ExpiredToken, 401, "Your token has expired! Please log in again."),
        ];

        for (external, status, message) in cases {
            let err = translate(external);
            assert_eq!(err.status_code(), status);
            assert_eq!(err.message(), message);
            assert!(err.is_operational());
        }
    }

    #[test]
    fn schema_validation_joins_messages() {
        let err = translate(ExternalError::SchemaValidation {
            messages: vec!["A tour must have a name".into(), "A tour must have a price".into()],
            field_errors: HashMap::new(),
        });
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.message(), "Invalid input data. A tour must have a name. A tour must have a price");
    }

    #[test]
    fn database_errors_translate() {
        let err: ApiError = DatabaseError::UniqueViolation { field: "email".into(), value: "a@b.io".into() }.into();
        assert_eq!(err.status_code(), 409);

        let err: ApiError = DatabaseError::QueryError("syntax error".into()).into();
        assert!(!err.is_operational());
    }

    #[test]
    fn bare_statuses_are_wrapped() {
        assert_eq!(ApiError::from_status(StatusCode::METHOD_NOT_ALLOWED, "nope").status_code(), 405);
        assert_eq!(ApiError::from_status(StatusCode::IM_A_TEAPOT, "tea").status_code(), 400);
        assert!(!ApiError::from_status(StatusCode::BAD_GATEWAY, "down").is_operational());
    }
}
