use axum::extract::State;
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use validator::{Validate, ValidationError};

use crate::database::models::{NewUser, UserChanges};
use crate::handlers::auth::passwords_match;
use crate::error::ApiError;
use crate::filter::{ApiFeatures, QueryOptions, QuerySpec};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, JsonBody, ObjectIdPath, ValidJson};
use crate::state::AppState;
use crate::types::Role;

const USER_NOT_FOUND: &str = "No user found with that ID";

/// Fields a user may change on their own profile
const SELF_EDITABLE: [&str; 3] = ["name", "email", "photo"];

const PASSWORD_KEYS: [&str; 3] = ["password", "confirmPassword", "newPassword"];

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "create_passwords_match"))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateUserRequest {
    #[validate(
        required(message = "Please tell us your name"),
        length(min = 2, message = "A name must have at least 2 characters")
    )]
    pub name: Option<String>,
    #[validate(
        required(message = "Please provide your email"),
        email(message = "Please provide a valid email")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "Please provide a password"),
        length(min = 8, message = "A password must have at least 8 characters")
    )]
    pub password: Option<String>,
    #[validate(required(message = "Please confirm your password"))]
    pub confirm_password: Option<String>,
    pub role: Option<Role>,
    #[validate(url(message = "Photo must be a valid URL"))]
    pub photo: Option<String>,
}

fn create_passwords_match(body: &CreateUserRequest) -> Result<(), ValidationError> {
    passwords_match(&body.password, &body.confirm_password)
}

/// GET /api/v1/users
pub async fn list_users(State(state): State<AppState>, spec: QuerySpec) -> ApiResult<Value> {
    let options = ApiFeatures::build(QueryOptions::new(), &spec, state.config.api.default_limit)?;
    let users = state.users.find(&options).await?;

    if users.is_empty() {
        return Err(ApiError::not_found("No users found"));
    }

    let results = users.len();
    Ok(ApiResponse::success(json!({ "users": users })).with_results(results))
}

/// GET /api/v1/users/:id
pub async fn get_user(State(state): State<AppState>, ObjectIdPath(id): ObjectIdPath) -> ApiResult<Value> {
    let user = state
        .users
        .find_by_id(id.as_str())
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;

    Ok(ApiResponse::success(json!({ "user": user })))
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<CreateUserRequest>,
) -> ApiResult<Value> {
    let password_hash = state.passwords.hash(&body.password.unwrap_or_default()).await?;
    let user = state
        .users
        .insert(NewUser {
            name: body.name.unwrap_or_default().trim().to_string(),
            email: body.email.unwrap_or_default().trim().to_lowercase(),
            role: body.role.unwrap_or_default(),
            photo: body.photo,
            password_hash,
        })
        .await?;
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "User created");

    Ok(ApiResponse::created(json!({ "user": user })))
}

/// PATCH /api/v1/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    ObjectIdPath(id): ObjectIdPath,
    ValidJson(changes): ValidJson<UserChanges>,
) -> ApiResult<Value> {
    if changes.is_empty() {
        return Err(ApiError::bad_request("User data is missing"));
    }

    let user = state
        .users
        .update(id.as_str(), changes.normalized())
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;

    Ok(ApiResponse::success(json!({ "user": user })))
}

/// DELETE /api/v1/users/:id
pub async fn delete_user(State(state): State<AppState>, ObjectIdPath(id): ObjectIdPath) -> ApiResult<()> {
    if !state.users.delete(id.as_str()).await? {
        return Err(ApiError::not_found(USER_NOT_FOUND));
    }

    tracing::info!(user_id = %id, "User deleted");
    Ok(ApiResponse::no_content())
}

/// GET /api/v1/users/me
pub async fn get_me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({ "user": user })))
}

/// PATCH /api/v1/users/me
///
/// Password changes go through `/updatepassword`; role and bookkeeping
/// fields are never self-editable.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> ApiResult<Value> {
    if body.keys().any(|k| PASSWORD_KEYS.contains(&k.as_str())) {
        return Err(ApiError::bad_request(
            "This route is not for password updates. Please use /updatepassword.",
        ));
    }
    if let Some(key) = body.keys().find(|k| !SELF_EDITABLE.contains(&k.as_str())) {
        return Err(ApiError::bad_request(format!("Field '{}' cannot be updated here", key)));
    }

    let changes: UserChanges =
        serde_json::from_value(Value::Object(body)).map_err(|e| ApiError::invalid_json(e.to_string()))?;
    changes.validate()?;
    if changes.is_empty() {
        return Err(ApiError::bad_request("User data is missing"));
    }

    let user = state
        .users
        .update(&user.id, changes.normalized())
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;

    Ok(ApiResponse::success(json!({ "user": user })))
}
