//! vidgrab - A self-hosted social media download link resolver
//!
//! vidgrab turns TikTok, Instagram, Facebook, YouTube and Twitter/X links
//! into direct media URLs by asking a configurable chain of third-party
//! resolver services, with per-client daily limits and usage statistics.

use anyhow::Result;
use std::net::SocketAddr;
use tracing::info;

mod api;
mod backend;
mod config;
mod db;
mod platform;
mod service;
mod utils;

use api::AppState;
use config::Settings;
use db::Database;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vidgrab=info,tower_http=info".into());

    if std::env::var("VIDGRAB_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting vidgrab v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!("Configuration loaded from {:?}", settings.config_path());

    // Initialize database
    let db = Database::new(&settings.database.path)?;
    db.migrate()?;
    info!("Database initialized at {:?}", settings.database.path);

    // Create application state
    let state = AppState::new(db, settings.clone())?;

    // Build router
    let app = api::create_router(state);

    // Start server
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    // Peer addresses key the rate limits
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
