//! Account and session endpoints.
//!
//! - POST `/register` - Create an account
//! - POST `/login` - Start a session, returns an access/refresh token pair
//! - POST `/refresh-token` - Rotate a refresh token
//! - POST `/logout` - End the session owning a refresh token
//! - POST `/logout-all` - End every session of the caller (access token required)
//!
//! The refresh token is read from the JSON body (`refreshToken`), falling back
//! to an `Authorization: Bearer` header.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use super::users::UserResponse;
use crate::auth::{Auth, bearer_token};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::session::{Registration, SessionManager, TokenPair};

#[derive(Clone)]
pub struct AuthState {
    pub sessions: SessionManager,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .route("/logout-all", post(logout_all))
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    user_name: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TokenRequest {
    refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokensResponse {
    access_token: String,
    refresh_token: String,
}

impl From<TokenPair> for TokensResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(Serialize)]
struct LoginResponse {
    #[serde(flatten)]
    tokens: TokensResponse,
    #[serde(flatten)]
    user: UserResponse,
}

#[derive(Serialize)]
struct LogoutAllResponse {
    revoked: u64,
}

/// Refresh token from the body, or from the bearer header when the body has none.
fn presented_refresh_token(headers: &HeaderMap, body: &Bytes) -> Result<Option<String>, ApiError> {
    let request: TokenRequest = if body.is_empty() {
        TokenRequest::default()
    } else {
        serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Invalid JSON body"))?
    };

    Ok(request
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(headers).map(str::to_string)))
}

// --- Handlers ---

async fn register(
    State(state): State<AuthState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;

    let user = state
        .sessions
        .register(Registration {
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            username: req.user_name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

async fn login(
    State(state): State<AuthState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = body?;

    let outcome = state.sessions.login(req.email, req.password).await?;

    Ok(Json(LoginResponse {
        tokens: outcome.tokens.into(),
        user: outcome.user.into(),
    }))
}

async fn refresh_token(
    State(state): State<AuthState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TokensResponse>, ApiError> {
    let token = presented_refresh_token(&headers, &body)?;
    let pair = state.sessions.refresh(token.as_deref()).await?;
    Ok(Json(pair.into()))
}

async fn logout(
    State(state): State<AuthState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let token = presented_refresh_token(&headers, &body)?;
    state.sessions.logout(token.as_deref()).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn logout_all(
    State(state): State<AuthState>,
    Auth(user): Auth,
) -> Result<Json<LogoutAllResponse>, ApiError> {
    let revoked = state.sessions.logout_all(user.uuid()).await?;
    Ok(Json(LogoutAllResponse { revoked }))
}
