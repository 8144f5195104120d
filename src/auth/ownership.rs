//! Ownership guard for entity-mutating routes.

use std::future::Future;

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::types::AuthenticatedUser;
use crate::api::{ApiError, ResultExt, validate_uuid};
use crate::db::{CommentStore, EntityOwner, FileStore, PostStore, UserStore};

/// Lookup-by-id capability over one kind of owned entity.
pub trait EntityAccessor: Clone + Send + Sync + 'static {
    /// Entity name used in error messages and logs.
    const ENTITY: &'static str;

    /// `None` if no entity has this id.
    fn find_owner(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<EntityOwner>, sqlx::Error>> + Send;
}

impl EntityAccessor for PostStore {
    const ENTITY: &'static str = "Post";

    fn find_owner(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<EntityOwner>, sqlx::Error>> + Send {
        self.owner_of(id)
    }
}

impl EntityAccessor for CommentStore {
    const ENTITY: &'static str = "Comment";

    fn find_owner(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<EntityOwner>, sqlx::Error>> + Send {
        self.owner_of(id)
    }
}

impl EntityAccessor for UserStore {
    const ENTITY: &'static str = "User";

    fn find_owner(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<EntityOwner>, sqlx::Error>> + Send {
        self.owner_of(id)
    }
}

impl EntityAccessor for FileStore {
    const ENTITY: &'static str = "File";

    fn find_owner(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<EntityOwner>, sqlx::Error>> + Send {
        self.owner_of(id)
    }
}

/// Middleware that lets the request through only if the authenticated user
/// owns the entity named by the `{id}` path parameter. Ownerless entities
/// are open to any authenticated user.
///
/// Must be layered inside [`super::require_auth`].
pub async fn require_owner<E: EntityAccessor>(
    State(entities): State<E>,
    Path(id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    validate_uuid(&id)?;

    let owner = entities
        .find_owner(&id)
        .await
        .db_err("Failed to look up entity owner")?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", E::ENTITY)))?;

    if let EntityOwner::User(owner) = owner {
        let user = request
            .extensions()
            .get::<AuthenticatedUser>()
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

        if user.uuid() != owner {
            warn!(
                user = %user.uuid(),
                entity = E::ENTITY,
                id = %id,
                "Rejected mutation of entity owned by another user"
            );
            return Err(ApiError::forbidden(format!(
                "{} belongs to another user",
                E::ENTITY
            )));
        }
    }

    Ok(next.run(request).await)
}
