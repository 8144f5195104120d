//! Axum extractor and middleware for bearer-token authentication.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use super::errors::AuthError;
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;
use crate::jwt::{JwtConfig, JwtError, TokenKind};

/// Token from an `Authorization: Bearer <token>` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Verify the bearer access token on a request. Never touches the database.
pub fn authenticate_headers(
    headers: &HeaderMap,
    jwt: &JwtConfig,
) -> Result<AuthenticatedUser, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingCredentials)?;

    match jwt.verify(token, TokenKind::Access) {
        Ok(claims) => Ok(AuthenticatedUser { claims }),
        Err(JwtError::NotConfigured(_)) => {
            error!("Access token secret is not configured");
            Err(AuthError::NotConfigured)
        }
        Err(e) => {
            debug!(error = %e, "Rejected access token");
            Err(AuthError::InvalidToken)
        }
    }
}

/// Middleware that rejects unauthenticated requests and attaches the
/// [`AuthenticatedUser`] to the request extensions for later layers.
pub async fn require_auth(
    State(jwt): State<Arc<JwtConfig>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = authenticate_headers(request.headers(), &jwt)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Extractor for handlers that need the caller's identity.
/// Reuses the identity attached by [`require_auth`] when that layer ran,
/// otherwise verifies the bearer token itself.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Auth(user.clone()));
        }
        authenticate_headers(&parts.headers, state.jwt()).map(Auth)
    }
}
