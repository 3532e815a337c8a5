use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::AuthContext;
use crate::app::AppState;
use crate::error::ErrorResponse;
use crate::middleware::RequestIdExt;

/// Extractor resolving the caller's owner key.
///
/// No `Authorization` header means guest. A bearer token must verify; a bad
/// token is rejected rather than silently downgraded to guest.
///
/// ```ignore
/// async fn list(owner: Owner) -> impl IntoResponse {
///     format!("Projects for {}", owner.owner_key)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Owner(pub AuthContext);

impl std::ops::Deref for Owner {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub enum AuthError {
    InvalidFormat,
    NotConfigured,
    InvalidToken,
}

impl AuthError {
    fn message(&self) -> &'static str {
        match self {
            AuthError::InvalidFormat => "Invalid authorization format",
            AuthError::NotConfigured => "Token authentication is not configured on this server",
            AuthError::InvalidToken => "Invalid or expired token",
        }
    }
}

/// Rejection carrying the request id so the error body matches `ApiError`'s.
#[derive(Debug)]
pub struct AuthRejection {
    error: AuthError,
    request_id: Option<String>,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: "UNAUTHORIZED".to_string(),
            message: self.error.message().to_string(),
            request_id: self.request_id,
        };

        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AuthError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AuthError::InvalidFormat)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::InvalidFormat);
    }
    Ok(Some(token))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Owner {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let reject = |error: AuthError| AuthRejection {
            error,
            request_id: parts.headers.request_id().map(str::to_string),
        };

        let Some(token) = bearer_token(parts).map_err(reject)? else {
            return Ok(Owner(AuthContext::guest()));
        };

        let jwks = state
            .jwks_cache
            .as_ref()
            .ok_or(AuthError::NotConfigured)
            .map_err(reject)?;

        let claims = jwks.verify_token(token).await.map_err(|e| {
            tracing::warn!(error = %e, "JWT verification failed");
            reject(AuthError::InvalidToken)
        })?;

        Ok(Owner(AuthContext::from_claims(&claims)))
    }
}
