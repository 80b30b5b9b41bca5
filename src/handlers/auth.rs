use axum::{extract::Extension, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::service::{self, AuthenticatedUser};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

/// POST /auth/login - exchange credentials for a session token.
/// Issuing the token ends any previous session for the same principal.
pub async fn login_post(Json(req): Json<LoginRequest>) -> Result<Json<Value>, ApiError> {
    if req.user_name.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("user_name and password are required"));
    }

    let token = service::login(&req.user_name, &req.password).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "token": token }
    })))
}

/// GET /api/auth/whoami - identity attached by the auth middleware.
pub async fn whoami_get(
    user: Option<Extension<AuthenticatedUser>>,
) -> Result<Json<Value>, ApiError> {
    let Extension(user) = user.ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "user_name": user.user_name,
            "role": user.role.as_str(),
            "tenant_key": user.tenant_key,
        }
    })))
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /api/auth/password - change the caller's password. The stored
/// session token is cleared, so every open session must log in again.
pub async fn password_post(
    user: Option<Extension<AuthenticatedUser>>,
    Json(req): Json<PasswordChangeRequest>,
) -> Result<Json<Value>, ApiError> {
    let Extension(user) = user.ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
    if req.new_password.is_empty() {
        return Err(ApiError::bad_request("new_password is required"));
    }

    service::change_password(&user.user_name, &req.current_password, &req.new_password).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "message": "Password updated; log in again" }
    })))
}

/// POST /api/auth/logout - drop the stored session token.
pub async fn logout_post(
    user: Option<Extension<AuthenticatedUser>>,
) -> Result<Json<Value>, ApiError> {
    let Extension(user) = user.ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    service::logout(&user.user_name).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "message": "Session ended" }
    })))
}
