use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, RawPathParams, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;
use crate::types::ObjectId;

pub const INVALID_ID: &str = "Invalid ID format";

pub fn parse_object_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse(raw).ok_or_else(|| ApiError::bad_request(INVALID_ID))
}

/// Single `:id` path segment checked against the identifier format before
/// the handler runs
#[derive(Debug, Clone)]
pub struct ObjectIdPath(pub ObjectId);

#[async_trait]
impl<S> FromRequestParts<S> for ObjectIdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        Ok(Self(parse_object_id(&raw)?))
    }
}

/// Route layer rejecting a malformed `:id` or `:*_id` segment before any
/// other layer runs
pub async fn validate_ids(params: RawPathParams, req: Request, next: Next) -> Result<Response, ApiError> {
    for (key, value) in params.iter() {
        if key == "id" || key.ends_with("_id") {
            parse_object_id(value)?;
        }
    }
    Ok(next.run(req).await)
}

/// JSON body with body rejections mapped into the error taxonomy
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(json_rejection)?;
        Ok(Self(value))
    }
}

/// [`JsonBody`] that also runs the payload's validation rules
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let JsonBody(value) = JsonBody::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(e) => ApiError::invalid_json(e.body_text()),
        JsonRejection::JsonSyntaxError(e) => ApiError::invalid_json(e.body_text()),
        other => ApiError::from_status(other.status(), other.body_text()),
    }
}
