use axum::extract::{Path, State};
use axum::Extension;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

use crate::auth::{hash_reset_token, PasswordResetToken};
use crate::database::models::{NewUser, User};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, JsonBody, ValidJson};
use crate::services::PasswordResetEmail;
use crate::state::AppState;
use crate::types::Role;

/// Always creates a plain `user`; roles are granted by admins
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "signup_passwords_match"))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignupRequest {
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
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "reset_passwords_match"))]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(
        required(message = "Please provide a password"),
        length(min = 8, message = "A password must have at least 8 characters")
    )]
    pub password: Option<String>,
    #[validate(required(message = "Please confirm your password"))]
    pub confirm_password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: Option<String>,
    #[validate(length(min = 8, message = "A password must have at least 8 characters"))]
    pub new_password: Option<String>,
}

/// Passes when either side is missing; `required` reports that case
pub(crate) fn passwords_match(password: &Option<String>, confirm: &Option<String>) -> Result<(), ValidationError> {
    match (password, confirm) {
        (Some(password), Some(confirm)) if password != confirm => {
            Err(ValidationError::new("passwords_match").with_message("Passwords are not the same".into()))
        }
        _ => Ok(()),
    }
}

fn signup_passwords_match(body: &SignupRequest) -> Result<(), ValidationError> {
    passwords_match(&body.password, &body.confirm_password)
}

fn reset_passwords_match(body: &ResetPasswordRequest) -> Result<(), ValidationError> {
    passwords_match(&body.password, &body.confirm_password)
}

/// Password changes are recorded this far in the past so a token issued
/// in the same second as the change stays valid
fn password_changed_at() -> chrono::DateTime<Utc> {
    Utc::now() - Duration::seconds(1)
}

fn user_with_token(state: &AppState, user: User) -> Result<(String, Value), ApiError> {
    let token = state.tokens.issue(&user.id)?;
    Ok((token, json!({ "user": user })))
}

/// POST /api/v1/users/signup
pub async fn signup(State(state): State<AppState>, ValidJson(body): ValidJson<SignupRequest>) -> ApiResult<Value> {
    let password_hash = state.passwords.hash(&body.password.unwrap_or_default()).await?;

    let user = state
        .users
        .insert(NewUser {
            name: body.name.unwrap_or_default(),
            email: body.email.unwrap_or_default(),
            role: Role::User,
            photo: None,
            password_hash,
        })
        .await?;
    tracing::info!(user_id = %user.id, "User signed up");

    let (token, data) = user_with_token(&state, user)?;
    Ok(ApiResponse::created(data).with_token(token))
}

/// POST /api/v1/users/login
pub async fn login(State(state): State<AppState>, JsonBody(body): JsonBody<LoginRequest>) -> ApiResult<Value> {
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return Err(ApiError::bad_request("Please provide email and password"));
    };

    let incorrect = || ApiError::unauthorized("Incorrect email or password provided");

    let user = state.users.find_by_email(&email).await?.ok_or_else(incorrect)?;
    if !state.passwords.verify(&password, &user.password).await? {
        tracing::debug!(user_id = %user.id, "Login rejected");
        return Err(incorrect());
    }

    let (token, data) = user_with_token(&state, user)?;
    Ok(ApiResponse::success(data).with_token(token))
}

/// POST /api/v1/users/logout
///
/// Tokens are stateless; the client discards its copy.
pub async fn logout() -> ApiResult<()> {
    Ok(ApiResponse::message("User successfully logged out"))
}

/// POST /api/v1/users/forgotpassword
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ForgotPasswordRequest>,
) -> ApiResult<()> {
    let email = body
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Please provide your email address"))?;

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("Email not found"))?;

    let ttl = Duration::minutes(state.config.security.password_reset_ttl_minutes);
    let reset = PasswordResetToken::generate(ttl);
    state
        .users
        .set_reset_token(&user.id, Some((reset.hashed.as_str(), reset.expires_at)))
        .await?;

    let email = PasswordResetEmail::new(&user.email, &reset.plain, &state.config.email.public_base_url);
    if let Err(e) = state.mailer.send_password_reset(&email).await {
        tracing::error!(user_id = %user.id, error = %e, "Password reset email failed");
        // Roll back so the unsent token cannot be used
        if let Err(e) = state.users.set_reset_token(&user.id, None).await {
            tracing::error!(user_id = %user.id, error = %e, "Failed to clear reset token");
        }
        return Err(ApiError::internal_server_error(
            "Something went wrong while sending the password reset email. Please try again later.",
        ));
    }

    Ok(ApiResponse::message("Password reset email sent successfully. Please check your inbox."))
}

/// PATCH /api/v1/users/resetpassword/:token
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidJson(body): ValidJson<ResetPasswordRequest>,
) -> ApiResult<Value> {
    let hashed = hash_reset_token(&token);
    let user = state
        .users
        .find_by_reset_token(&hashed, Utc::now())
        .await?
        .ok_or_else(|| ApiError::bad_request("Token is invalid or has expired"))?;

    let password_hash = state.passwords.hash(&body.password.unwrap_or_default()).await?;
    state.users.set_password(&user.id, &password_hash, password_changed_at()).await?;
    tracing::info!(user_id = %user.id, "Password reset");

    let user = reload(&state, &user.id).await?;
    let (token, data) = user_with_token(&state, user)?;
    Ok(ApiResponse::success(data).with_token(token))
}

/// PATCH /api/v1/users/updatepassword
pub async fn update_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidJson(body): ValidJson<UpdatePasswordRequest>,
) -> ApiResult<Value> {
    let (Some(current), Some(new)) = (body.current_password, body.new_password) else {
        return Err(ApiError::bad_request("Please provide both your current and new password."));
    };

    if !state.passwords.verify(&current, &user.password).await? {
        return Err(ApiError::unauthorized("Your current password is incorrect."));
    }

    let password_hash = state.passwords.hash(&new).await?;
    state.users.set_password(&user.id, &password_hash, password_changed_at()).await?;
    tracing::info!(user_id = %user.id, "Password updated");

    let user = reload(&state, &user.id).await?;
    let (token, data) = user_with_token(&state, user)?;
    Ok(ApiResponse::success(data).with_token(token))
}

async fn reload(state: &AppState, id: &str) -> Result<User, ApiError> {
    state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))
}
