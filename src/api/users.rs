//! User profile endpoints.
//!
//! - GET `/{id}` - Public profile
//! - PUT `/{id}` - Update own profile
//! - DELETE `/{id}` - Delete own account

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    middleware,
    response::IntoResponse,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{require_auth, require_owner};
use crate::db::{Database, ProfileUpdate, User, UserStore};
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

pub fn router(state: UsersState) -> Router {
    let guarded = put(update_user)
        .delete(delete_user)
        .route_layer(middleware::from_fn_with_state(
            state.db.users(),
            require_owner::<UserStore>,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            require_auth,
        ));

    Router::new()
        .route("/{id}", get(get_user).merge(guarded))
        .with_state(state)
}

/// Externally visible projection of a user. Never includes credentials or sessions.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UserResponse {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    user_name: String,
    avatar: Option<String>,
    created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.uuid,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            user_name: user.username,
            avatar: user.avatar,
            created_at: user.created_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    first_name: Option<String>,
    last_name: Option<String>,
    user_name: Option<String>,
    avatar: Option<String>,
}

async fn get_user(
    State(state): State<UsersState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    validate_uuid(&id)?;

    let user = state
        .db
        .users()
        .get_by_uuid(&id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user.into()))
}

async fn update_user(
    State(state): State<UsersState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;

    let user = state
        .db
        .users()
        .get_by_uuid(&id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let update = ProfileUpdate {
        first_name: req.first_name.filter(|v| !v.is_empty()),
        last_name: req.last_name.filter(|v| !v.is_empty()),
        username: req.user_name.filter(|v| !v.is_empty()),
        avatar: req.avatar,
    };

    state
        .db
        .users()
        .update_profile(user.id, &update)
        .await
        .db_err("Failed to update user")?;

    let user = state
        .db
        .users()
        .get_by_id(user.id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse::from(user)))
}

/// Delete the account along with its sessions and content.
/// Already-issued access tokens stay valid until they expire.
async fn delete_user(
    State(state): State<UsersState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_uuid(&id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !state
        .db
        .users()
        .delete(user.id)
        .await
        .db_err("Failed to delete user")?
    {
        return Err(ApiError::not_found("User not found"));
    }

    info!(user = %user.uuid, "User deleted");
    Ok(Json(UserResponse::from(user)))
}
