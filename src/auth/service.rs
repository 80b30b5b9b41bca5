use thiserror::Error;
use tracing::debug;

use crate::auth::credentials::{self, Role};
use crate::auth::token::{self, Claims, TokenError};
use crate::database::registry::{PoolRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    BadCredentials,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Identity attached to a request after token verification and the
/// stored-session check both pass.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_name: String,
    pub role: Role,
    pub tenant_key: Option<String>,
}

/// Verify the password and issue a fresh token, storing it as the
/// principal's only active session. Any token issued earlier stops
/// authenticating the moment the new one is stored.
pub async fn login(user_name: &str, password: &str) -> Result<String, AuthError> {
    let master = PoolRegistry::instance().default_pool().await?;

    let credential = credentials::find_by_user_name(&master.pool, user_name)
        .await?
        .ok_or(AuthError::BadCredentials)?;

    if !credentials::verify_password(password, &credential.password)? {
        return Err(AuthError::BadCredentials);
    }

    let tenant_key = credential
        .tenant_key()
        .unwrap_or(token::DEFAULT_TENANT_MARKER);
    let issued = token::issue(&credential.user_name, credential.role(), tenant_key)?;

    credentials::store_token(&master.pool, &credential.user_name, &issued).await?;

    debug!("Issued new session token for {}", credential.user_name);
    Ok(issued)
}

/// Full per-request authentication: signature and expiry via the token
/// service, then the stored-session check against the credential store.
/// A structurally valid token that has been superseded by a newer login is
/// rejected exactly like a forged one.
pub async fn authenticate(presented: &str) -> Result<(Claims, AuthenticatedUser), AuthError> {
    let claims = token::verify(presented)?;

    let master = PoolRegistry::instance().default_pool().await?;
    let credential = credentials::find_by_user_name(&master.pool, &claims.sub)
        .await?
        .ok_or_else(|| TokenError::Invalid("unknown principal".to_string()))?;

    match credential.token.as_deref() {
        Some(active) if active == presented => {}
        _ => {
            return Err(AuthError::Token(TokenError::Invalid(
                "token superseded by a newer login".to_string(),
            )))
        }
    }

    let user = AuthenticatedUser {
        user_name: credential.user_name.clone(),
        role: credential.role(),
        tenant_key: claims.tenant().map(str::to_string),
    };
    Ok((claims, user))
}

/// End the active session by clearing the stored token.
pub async fn logout(user_name: &str) -> Result<(), AuthError> {
    let master = PoolRegistry::instance().default_pool().await?;
    credentials::clear_token(&master.pool, user_name).await?;
    Ok(())
}

/// Replace the password and force re-login by dropping the active session.
/// The current password must verify first.
pub async fn change_password(
    user_name: &str,
    current_password: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    let master = PoolRegistry::instance().default_pool().await?;

    let credential = credentials::find_by_user_name(&master.pool, user_name)
        .await?
        .ok_or(AuthError::BadCredentials)?;
    if !credentials::verify_password(current_password, &credential.password)? {
        return Err(AuthError::BadCredentials);
    }

    let hash = credentials::hash_password(new_password)?;
    credentials::update_password(&master.pool, user_name, &hash).await?;
    Ok(())
}
