//! CLI argument parsing, validation, and startup helpers.

use std::time::Duration;

use crate::db::Database;
use crate::jwt::{JwtConfig, TokenKeys, TokenKind};
use crate::{DEFAULT_MAX_UPLOAD_BYTES, ServerConfig};
use clap::Parser;
use tracing::{error, info};

const MIN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Postboard",
    about = "Posts, comments and files behind access/refresh token authentication"
)]
pub struct Args {
    /// Base path prefix for every route
    #[arg(short, long, value_parser = validate_base_path)]
    pub base: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Path to SQLite database file, or ":memory:"
    #[arg(short, long, env = "DATABASE_PATH", default_value = "postboard.db")]
    pub database: String,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value = "900")]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_TTL", default_value = "604800")]
    pub refresh_token_ttl: u64,

    /// Path to file containing the access token secret. Prefer ACCESS_TOKEN_SECRET
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer REFRESH_TOKEN_SECRET
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn validate_base_path(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Ok(String::new());
    }

    if !s.starts_with('/') {
        return Err(format!("Base path must start with '/': {}", s));
    }

    if s.ends_with('/') {
        return Err(format!("Base path must not end with '/': {}", s));
    }

    if s.chars().any(|c| !c.is_ascii() || c.is_whitespace()) {
        return Err(format!("Base path contains invalid characters: {}", s));
    }

    Ok(s.to_string())
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

fn env_var_for(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Access => "ACCESS_TOKEN_SECRET",
        TokenKind::Refresh => "REFRESH_TOKEN_SECRET",
    }
}

/// Load a token secret from its environment variable or a file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(kind: TokenKind, secret_file: Option<&str>) -> Option<String> {
    let var = env_var_for(kind);

    let secret = if let Ok(secret) = std::env::var(var) {
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read {} token secret file", kind);
                return None;
            }
        }
    } else {
        error!(
            "{} token secret is required. Set {} or use --{}-secret-file",
            kind, var, kind
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "{} token secret is shorter than {} characters. Use a longer secret",
            kind, MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Build the token configuration from both secrets.
/// Returns None and logs an error if the secrets are identical.
pub fn build_tokens(
    access_secret: &str,
    refresh_secret: &str,
    access_ttl: Duration,
    refresh_ttl: Duration,
) -> Option<JwtConfig> {
    if access_secret == refresh_secret {
        error!("Access and refresh token secrets must differ");
        return None;
    }

    Some(JwtConfig::new(
        Some(TokenKeys::new(access_secret.as_bytes(), access_ttl)),
        Some(TokenKeys::new(refresh_secret.as_bytes(), refresh_ttl)),
    ))
}

/// Build ServerConfig from validated arguments.
pub fn build_config(base: Option<String>, db: Database, tokens: JwtConfig) -> ServerConfig {
    ServerConfig {
        base,
        db,
        tokens,
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
