//! Posts API.
//!
//! Reads are public. Creating and liking require an access token; updating
//! and deleting additionally require owning the post.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::current_user;
use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{Auth, AuthenticatedUser, require_auth, require_owner};
use crate::db::{Database, Post, PostStore};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// State for posts endpoints.
#[derive(Clone)]
pub struct PostsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(PostsState);

pub fn router(state: PostsState) -> Router {
    let auth = middleware::from_fn_with_state(state.jwt.clone(), require_auth);
    let owner = middleware::from_fn_with_state(state.db.posts(), require_owner::<PostStore>);

    Router::new()
        .route(
            "/",
            get(list_posts).merge(post(create_post).route_layer(auth.clone())),
        )
        .route(
            "/{id}",
            get(get_post).merge(
                put(update_post)
                    .delete(delete_post)
                    .route_layer(owner)
                    .route_layer(auth.clone()),
            ),
        )
        .route(
            "/{id}/like",
            post(like_post).delete(unlike_post).route_layer(auth),
        )
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct CreatePostRequest {
    title: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct UpdatePostRequest {
    title: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct ListPostsQuery {
    sender: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostResponse {
    id: String,
    title: String,
    content: String,
    sender_id: Option<String>,
    likes: i64,
    created_at: String,
    updated_at: String,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.uuid,
            title: post.title,
            content: post.content,
            sender_id: post.sender,
            likes: post.likes,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Serialize)]
struct LikeResponse {
    liked: bool,
    likes: i64,
}

// --- Handlers ---

async fn create_post(
    State(state): State<PostsState>,
    Auth(auth): Auth,
    body: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;

    let (Some(title), Some(content)) = (
        req.title.filter(|t| !t.is_empty()),
        req.content.filter(|c| !c.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Title and content are required"));
    };

    let user = current_user(&state.db, &auth).await?;

    let post = state
        .db
        .posts()
        .create(Some(user.id), &title, &content)
        .await
        .db_err("Failed to create post")?;

    Ok((StatusCode::CREATED, Json(PostResponse::from(post))))
}

async fn list_posts(
    State(state): State<PostsState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let posts = state
        .db
        .posts()
        .list(query.sender.as_deref())
        .await
        .db_err("Failed to list posts")?;

    Ok(Json(posts.into_iter().map(PostResponse::from).collect()))
}

async fn get_post(
    State(state): State<PostsState>,
    Path(id): Path<String>,
) -> Result<Json<PostResponse>, ApiError> {
    validate_uuid(&id)?;

    let post = state
        .db
        .posts()
        .get_by_uuid(&id)
        .await
        .db_err("Failed to get post")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(Json(post.into()))
}

async fn update_post(
    State(state): State<PostsState>,
    Path(id): Path<String>,
    body: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> Result<Json<PostResponse>, ApiError> {
    let Json(req) = body?;

    let title = req.title.filter(|t| !t.is_empty());
    let content = req.content.filter(|c| !c.is_empty());

    let updated = state
        .db
        .posts()
        .update(&id, title.as_deref(), content.as_deref())
        .await
        .db_err("Failed to update post")?;

    if !updated {
        return Err(ApiError::not_found("Post not found"));
    }

    let post = state
        .db
        .posts()
        .get_by_uuid(&id)
        .await
        .db_err("Failed to get post")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(Json(post.into()))
}

async fn delete_post(
    State(state): State<PostsState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .posts()
        .delete(&id)
        .await
        .db_err("Failed to delete post")?;

    if !deleted {
        return Err(ApiError::not_found("Post not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn like_post(
    State(state): State<PostsState>,
    Auth(auth): Auth,
    Path(id): Path<String>,
) -> Result<Json<LikeResponse>, ApiError> {
    set_like(&state, &auth, &id, true).await
}

async fn unlike_post(
    State(state): State<PostsState>,
    Auth(auth): Auth,
    Path(id): Path<String>,
) -> Result<Json<LikeResponse>, ApiError> {
    set_like(&state, &auth, &id, false).await
}

/// Likes are idempotent in both directions.
async fn set_like(
    state: &PostsState,
    auth: &AuthenticatedUser,
    id: &str,
    liked: bool,
) -> Result<Json<LikeResponse>, ApiError> {
    validate_uuid(id)?;

    let post = state
        .db
        .posts()
        .get_by_uuid(id)
        .await
        .db_err("Failed to get post")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let user = current_user(&state.db, auth).await?;

    let likes = state.db.likes();
    let result = if liked {
        likes.like(post.id, user.id).await
    } else {
        likes.unlike(post.id, user.id).await
    };
    result.db_err("Failed to update like")?;

    let count = likes.count(post.id).await.db_err("Failed to count likes")?;

    Ok(Json(LikeResponse {
        liked,
        likes: count,
    }))
}
