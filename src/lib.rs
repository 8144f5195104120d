pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod session;

use api::create_api_router;
use axum::Router;
use db::Database;
use jwt::JwtConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Largest accepted request body on upload routes.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub struct ServerConfig {
    /// Base path for the application (e.g., "/api")
    pub base: Option<String>,
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Access and refresh token keys. Either may be missing, in which case
    /// operations that need it answer 500.
    pub tokens: JwtConfig,
    /// Request body limit for file uploads
    pub max_upload_bytes: usize,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(config.tokens.clone());
    let base = config.base.as_deref().unwrap_or("");

    let api_router = create_api_router(config.db.clone(), jwt, base, config.max_upload_bytes);

    if base.is_empty() {
        api_router
    } else {
        Router::new().nest(base, api_router)
    }
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
