use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::service::{self, AuthError};
use crate::error::ApiError;
use crate::tenant::context::TenantContext;

/// Per-request tenant resolution, ahead of any business logic.
///
/// Without a bearer token the request proceeds anonymously: no tenant key
/// is in scope and routing falls back to the default pool. With a token,
/// signature, expiry, and the stored-session check must all pass before the
/// request runs inside the token's tenant scope; any failure rejects the
/// request outright, so an authentication error can never fall through to
/// the default pool. The scope ends with the response on every path.
pub async fn tenant_auth_middleware(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match extract_bearer(&headers) {
        Ok(token) => token,
        Err(message) => return ApiError::unauthorized(message).into_response(),
    };

    match token {
        None => TenantContext::scope(None, next.run(request)).await,
        Some(token) => match service::authenticate(&token).await {
            Ok((claims, user)) => {
                let tenant_key = claims.tenant().map(str::to_string);
                request.extensions_mut().insert(user);
                TenantContext::scope(tenant_key, next.run(request)).await
            }
            Err(err) => {
                let api_error: ApiError = match err {
                    e @ (AuthError::BadCredentials | AuthError::Token(_)) => {
                        tracing::debug!("Rejected bearer token: {}", e);
                        e.into()
                    }
                    e => e.into(),
                };
                api_error.into_response()
            }
        },
    }
}

/// Bearer token from the Authorization header. A missing header is an
/// anonymous request; a present but malformed header is an error.
fn extract_bearer(headers: &HeaderMap) -> Result<Option<String>, String> {
    let auth_header = match headers.get("authorization") {
        Some(value) => value,
        None => return Ok(None),
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty bearer token".to_string());
        }
        Ok(Some(token.to_string()))
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_is_anonymous() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), Ok(None));
    }

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer(&headers), Ok(Some("abc.def.ghi".to_string())));
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcg=="));
        assert!(extract_bearer(&headers).is_err());
    }

    #[test]
    fn empty_bearer_token_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert!(extract_bearer(&headers).is_err());
    }
}
