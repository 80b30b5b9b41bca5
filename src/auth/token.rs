use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::credentials::Role;
use crate::config;

/// Reserved tenant key that maps to no tenant (master database routing).
pub const DEFAULT_TENANT_MARKER: &str = "master";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub tenant_key: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(sub: String, role: Role, tenant_key: String, expiry_days: i64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::days(expiry_days)).timestamp();

        Self {
            sub,
            role: role.as_str().to_string(),
            tenant_key,
            iat: now.timestamp(),
            exp,
        }
    }

    /// Tenant key carried by the token, with the reserved marker mapped to None.
    pub fn tenant(&self) -> Option<&str> {
        if self.tenant_key.is_empty() || self.tenant_key == DEFAULT_TENANT_MARKER {
            None
        } else {
            Some(&self.tenant_key)
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token signing secret is not configured")]
    MissingSecret,
}

/// Produce a signed token for a principal. Pure function of the inputs and
/// the process-wide signing secret; never touches storage.
pub fn issue(sub: &str, role: Role, tenant_key: &str) -> Result<String, TokenError> {
    let security = &config::config().security;
    let claims = Claims::new(
        sub.to_string(),
        role,
        tenant_key.to_string(),
        security.token_expiry_days,
    );
    issue_with(&claims, &security.jwt_secret)
}

/// Verify signature and expiry, returning the embedded claims. Whether the
/// token is still the principal's active session is the caller's concern.
pub fn verify(token: &str) -> Result<Claims, TokenError> {
    verify_with(token, &config::config().security.jwt_secret)
}

fn issue_with(claims: &Claims, secret: &str) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| TokenError::Invalid(e.to_string()))
}

fn verify_with(token: &str, secret: &str) -> Result<Claims, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| TokenError::Invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";

    fn claims(expiry_days: i64) -> Claims {
        Claims::new(
            "owner".to_string(),
            Role::Admin,
            "business_cafe_luna_ab12".to_string(),
            expiry_days,
        )
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let token = issue_with(&claims(30), SECRET).unwrap();
        let verified = verify_with(&token, SECRET).unwrap();

        assert_eq!(verified.sub, "owner");
        assert_eq!(verified.role, "ADMIN");
        assert_eq!(verified.tenant(), Some("business_cafe_luna_ab12"));
    }

    #[test]
    fn expired_token_fails_verification() {
        let mut expired = claims(30);
        expired.exp = (Utc::now() - Duration::hours(2)).timestamp();

        let token = issue_with(&expired, SECRET).unwrap();
        assert!(matches!(
            verify_with(&token, SECRET),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn tampered_token_fails_verification() {
        let token = issue_with(&claims(30), SECRET).unwrap();
        let mut tampered = token.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();

        assert!(verify_with(&tampered, SECRET).is_err());
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let token = issue_with(&claims(30), SECRET).unwrap();
        assert!(verify_with(&token, "another-secret").is_err());
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            issue_with(&claims(30), ""),
            Err(TokenError::MissingSecret)
        ));
    }

    #[test]
    fn reserved_marker_maps_to_no_tenant() {
        let c = Claims::new(
            "root".to_string(),
            Role::Admin,
            DEFAULT_TENANT_MARKER.to_string(),
            30,
        );
        assert_eq!(c.tenant(), None);
    }
}
