//! File upload API.
//!
//! Uploads use multipart form data with a single `file` field and require an
//! access token. Downloads are public; deletion is limited to the uploader.

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::current_user;
use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{Auth, require_auth, require_owner};
use crate::db::{Database, FileStore};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// State for file endpoints.
#[derive(Clone)]
pub struct FilesState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    /// Base path prepended to the URLs handed back after upload
    pub base: String,
}

impl_has_auth_backend!(FilesState);

pub fn router(state: FilesState, max_upload_bytes: usize) -> Router {
    let auth = middleware::from_fn_with_state(state.jwt.clone(), require_auth);

    Router::new()
        .route("/", post(upload_file).route_layer(auth.clone()))
        .route(
            "/{id}",
            get(get_file).merge(
                delete(delete_file)
                    .route_layer(middleware::from_fn_with_state(
                        state.db.files(),
                        require_owner::<FileStore>,
                    ))
                    .route_layer(auth),
            ),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

#[derive(Serialize)]
struct UploadResponse {
    id: String,
    url: String,
}

async fn upload_file(
    State(state): State<FilesState>,
    Auth(auth): Auth,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Invalid multipart data"))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|_| ApiError::bad_request("Failed to read file data"))?;

        upload = Some((filename, content_type, data.to_vec()));
    }

    let (filename, content_type, data) =
        upload.ok_or_else(|| ApiError::bad_request("File not provided"))?;

    let user = current_user(&state.db, &auth).await?;

    let id = state
        .db
        .files()
        .create(user.id, &filename, &content_type, &data)
        .await
        .db_err("Failed to store file")?;

    info!(user = %user.uuid, file = %id, size = data.len(), "File uploaded");

    let url = format!("{}/file/{}", state.base, id);
    Ok((StatusCode::CREATED, Json(UploadResponse { id, url })))
}

fn renders_safely(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("image/") && essence != "image/svg+xml"
}

async fn get_file(
    State(state): State<FilesState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;

    let file = state
        .db
        .files()
        .get_by_uuid(&id)
        .await
        .db_err("Failed to get file")?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&file.content_type)
            .unwrap_or(HeaderValue::from_static(FALLBACK_CONTENT_TYPE)),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    // Anything a browser could run as a page is downloaded, not rendered
    let mode = if renders_safely(&file.content_type) {
        "inline"
    } else {
        "attachment"
    };
    let disposition = format!(
        "{mode}; filename=\"{}\"",
        file.filename.replace('"', "")
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok((headers, Body::from(file.data)))
}

async fn delete_file(
    State(state): State<FilesState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state
        .db
        .files()
        .delete(&id)
        .await
        .db_err("Failed to delete file")?
    {
        return Err(ApiError::not_found("File not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
