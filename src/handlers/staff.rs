use axum::{
    extract::{Extension, Path},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::auth::credentials::{self, NewCredential, Role};
use crate::auth::service::AuthenticatedUser;
use crate::database::registry::PoolRegistry;
use crate::database::router::with_tenant_connection;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct StaffRequest {
    pub name: String,
    pub user_name: String,
    pub password: String,
    pub role: String,
}

fn require_admin(user: Option<Extension<AuthenticatedUser>>) -> Result<(AuthenticatedUser, String), ApiError> {
    let Extension(user) = user.ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
    if user.role != Role::Admin {
        return Err(ApiError::forbidden("Only admins can manage staff"));
    }
    let tenant_key = user
        .tenant_key
        .clone()
        .ok_or_else(|| ApiError::forbidden("No business is associated with this account"))?;
    Ok((user, tenant_key))
}

/// POST /api/staff - add a staff member: a roster row in the tenant
/// database plus a login principal in the master credential store.
pub async fn staff_post(
    user: Option<Extension<AuthenticatedUser>>,
    Json(req): Json<StaffRequest>,
) -> Result<Json<Value>, ApiError> {
    let (_, tenant_key) = require_admin(user)?;

    if req.user_name.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("user_name and password are required"));
    }
    let role = Role::from_str(&req.role).map_err(|e| ApiError::bad_request(e))?;

    let password_hash = credentials::hash_password(&req.password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        ApiError::internal_server_error("An error occurred while processing your request")
    })?;

    // Roster row, routed to the caller's tenant database
    let name = req.name.clone();
    let user_name = req.user_name.clone();
    let roster_hash = password_hash.clone();
    with_tenant_connection(move |conn| {
        Box::pin(async move {
            sqlx::query("INSERT INTO staff (name, password, role, user_name) VALUES ($1, $2, $3, $4)")
                .bind(&name)
                .bind(&roster_hash)
                .bind(role.as_str())
                .bind(&user_name)
                .execute(&mut *conn)
                .await
                .map(|_| ())
        })
    })
    .await?;

    // Login principal, on the master database
    let master = PoolRegistry::instance().default_pool().await?;
    credentials::create(
        &master.pool,
        NewCredential {
            name: &req.name,
            user_name: &req.user_name,
            password_hash: &password_hash,
            role,
            tenant_key: &tenant_key,
        },
    )
    .await
    .map_err(|e| {
        if credentials::is_unique_violation(&e) {
            ApiError::conflict(format!("Username {} is already taken", req.user_name))
        } else {
            e.into()
        }
    })?;

    Ok(Json(json!({
        "success": true,
        "data": { "user_name": req.user_name, "role": role.as_str() }
    })))
}

/// DELETE /api/staff/:user_name - remove a staff member's roster row and
/// login principal. Only principals of the caller's own tenant are visible.
pub async fn staff_delete(
    user: Option<Extension<AuthenticatedUser>>,
    Path(user_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let (caller, tenant_key) = require_admin(user)?;

    if caller.user_name == user_name {
        return Err(ApiError::bad_request("Cannot remove your own login"));
    }

    let master = PoolRegistry::instance().default_pool().await?;
    let target = credentials::find_by_user_name(&master.pool, &user_name).await?;
    match target {
        Some(cred) if cred.tenant_key() == Some(tenant_key.as_str()) => {}
        _ => return Err(ApiError::not_found(format!("No staff login: {}", user_name))),
    }

    let roster_name = user_name.clone();
    with_tenant_connection(move |conn| {
        Box::pin(async move {
            sqlx::query("DELETE FROM staff WHERE user_name = $1")
                .bind(&roster_name)
                .execute(&mut *conn)
                .await
                .map(|_| ())
        })
    })
    .await?;

    credentials::delete_by_user_name(&master.pool, &user_name).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "message": format!("Removed staff login {}", user_name) }
    })))
}
