//! Comments API.
//!
//! - POST `/` - Comment on a post (access token required)
//! - GET `/?postId=` - List comments, optionally for one post
//! - GET `/{id}` - Get a comment
//! - PUT `/{id}` - Edit own comment
//! - DELETE `/{id}` - Delete own comment

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
use crate::auth::{Auth, require_auth, require_owner};
use crate::db::{Comment, CommentStore, Database};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct CommentsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(CommentsState);

pub fn router(state: CommentsState) -> Router {
    let auth = middleware::from_fn_with_state(state.jwt.clone(), require_auth);

    let guarded = put(update_comment)
        .delete(delete_comment)
        .route_layer(middleware::from_fn_with_state(
            state.db.comments(),
            require_owner::<CommentStore>,
        ))
        .route_layer(auth.clone());

    Router::new()
        .route(
            "/",
            get(list_comments).merge(post(create_comment).route_layer(auth)),
        )
        .route("/{id}", get(get_comment).merge(guarded))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCommentRequest {
    post_id: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct UpdateCommentRequest {
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCommentsQuery {
    post_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentResponse {
    id: String,
    post_id: String,
    sender_id: Option<String>,
    message: String,
    created_at: String,
    updated_at: String,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.uuid,
            post_id: comment.post_uuid,
            sender_id: comment.sender,
            message: comment.message,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

async fn create_comment(
    State(state): State<CommentsState>,
    Auth(auth): Auth,
    body: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;

    let (Some(post_id), Some(message)) = (
        req.post_id.filter(|p| !p.is_empty()),
        req.message.filter(|m| !m.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Post id and message are required"));
    };
    validate_uuid(&post_id)?;

    let post = state
        .db
        .posts()
        .get_by_uuid(&post_id)
        .await
        .db_err("Failed to get post")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let user = current_user(&state.db, &auth).await?;

    let comment = state
        .db
        .comments()
        .create(post.id, Some(user.id), &message)
        .await
        .db_err("Failed to create comment")?;

    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

async fn list_comments(
    State(state): State<CommentsState>,
    Query(query): Query<ListCommentsQuery>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    if let Some(post_id) = &query.post_id {
        validate_uuid(post_id)?;
    }

    let comments = state
        .db
        .comments()
        .list(query.post_id.as_deref())
        .await
        .db_err("Failed to list comments")?;

    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

async fn get_comment(
    State(state): State<CommentsState>,
    Path(id): Path<String>,
) -> Result<Json<CommentResponse>, ApiError> {
    validate_uuid(&id)?;

    let comment = state
        .db
        .comments()
        .get_by_uuid(&id)
        .await
        .db_err("Failed to get comment")?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    Ok(Json(comment.into()))
}

async fn update_comment(
    State(state): State<CommentsState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateCommentRequest>, JsonRejection>,
) -> Result<Json<CommentResponse>, ApiError> {
    let Json(req) = body?;

    let message = req
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::bad_request("Message is required"))?;

    if !state
        .db
        .comments()
        .update(&id, &message)
        .await
        .db_err("Failed to update comment")?
    {
        return Err(ApiError::not_found("Comment not found"));
    }

    let comment = state
        .db
        .comments()
        .get_by_uuid(&id)
        .await
        .db_err("Failed to get comment")?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    Ok(Json(comment.into()))
}

async fn delete_comment(
    State(state): State<CommentsState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state
        .db
        .comments()
        .delete(&id)
        .await
        .db_err("Failed to delete comment")?
    {
        return Err(ApiError::not_found("Comment not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
