use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::database::models::User;
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::Role;

/// The authenticated principal, injected by [`protect`]
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Roles a route admits; the state of a [`restrict_to`] layer
#[derive(Clone, Copy, Debug)]
pub struct AllowedRoles(pub &'static [Role]);

/// Authentication stage: bearer token -> verified claims -> loaded principal
/// -> password-change check. Each failure short-circuits with a 401.
pub async fn protect(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("You are not logged in! Please log in again."))?;

    let claims = state.tokens.verify(token)?;

    let user = state
        .users
        .find_by_id(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("The user belonging to this token no longer exists."))?;

    if user.changed_password_after(claims.iat) {
        tracing::debug!(user_id = %user.id, "Rejected token issued before password change");
        return Err(ApiError::unauthorized("User recently changed password. Please log in again."));
    }

    tracing::debug!(user_id = %user.id, role = %user.role, "Authenticated request");
    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

/// Authorization stage; must run after [`protect`]
pub async fn restrict_to(
    State(AllowedRoles(roles)): State<AllowedRoles>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let CurrentUser(user) = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::unauthorized("You are not logged in! Please log in again."))?;

    if !roles.contains(&user.role) {
        tracing::warn!(user_id = %user.id, role = %user.role, "Role not permitted");
        return Err(ApiError::forbidden("You do not have permission to perform this action"));
    }

    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).expect("header"));
        headers
    }

    #[test]
    fn extracts_bearer_tokens() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(extract_bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(extract_bearer_token(&headers("Bearer ")), None);
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }
}
