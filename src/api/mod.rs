mod auth;
mod comments;
mod error;
mod files;
mod posts;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::auth::AuthenticatedUser;
use crate::db::{Database, User};
use crate::jwt::JwtConfig;
use crate::session::SessionManager;

pub use error::{ApiError, ResultExt, validate_uuid};

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    base: &str,
    max_upload_bytes: usize,
) -> Router {
    let auth_state = auth::AuthState {
        sessions: SessionManager::new(db.clone(), jwt.clone()),
        jwt: jwt.clone(),
    };

    let posts_state = posts::PostsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let comments_state = comments::CommentsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let files_state = files::FilesState {
        db: db.clone(),
        jwt: jwt.clone(),
        base: base.to_string(),
    };

    let users_state = users::UsersState { db, jwt };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/post", posts::router(posts_state))
        .nest("/comment", comments::router(comments_state))
        .nest("/user", users::router(users_state))
        .nest("/file", files::router(files_state, max_upload_bytes))
}

/// Load the database record behind an authenticated identity.
///
/// Access tokens outlive account deletion, so a verified token can still
/// name a user that no longer exists.
async fn current_user(db: &Database, auth: &AuthenticatedUser) -> Result<User, ApiError> {
    db.users()
        .get_by_uuid(auth.uuid())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))
}
