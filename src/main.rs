use std::time::Duration;

use clap::Parser;
use postboard::cli::{
    Args, build_config, build_tokens, init_logging, load_secret, open_database,
};
use postboard::jwt::TokenKind;
use postboard::run_server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Missing .env is fine; real environment variables still apply
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(access_secret) = load_secret(TokenKind::Access, args.access_secret_file.as_deref())
    else {
        std::process::exit(1);
    };

    let Some(refresh_secret) = load_secret(TokenKind::Refresh, args.refresh_secret_file.as_deref())
    else {
        std::process::exit(1);
    };

    let Some(tokens) = build_tokens(
        &access_secret,
        &refresh_secret,
        Duration::from_secs(args.access_token_ttl),
        Duration::from_secs(args.refresh_token_ttl),
    ) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to get local address");
        std::process::exit(1);
    });

    let config = build_config(args.base, db, tokens);

    info!(address = %local_addr, "Listening");

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
