//! HTTP API layer

mod error;
pub mod handlers;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    compression::CompressionLayer,
    trace::TraceLayer,
};

use crate::config::Settings;
use crate::db::Database;
use crate::service::{RateLimiter, ResolverService, UsageLogger, UsageStore};

pub use error::AppError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Arc<Settings>,
    pub resolver: Arc<ResolverService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub usage: UsageLogger,
}

impl AppState {
    /// Build the state, constructing every configured backend
    pub fn new(db: Database, settings: Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http.timeout_secs))
            .user_agent(settings.http.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;

        let resolver = ResolverService::from_configs(&settings.backends, http)?;

        Ok(Self::with_resolver(db, settings, resolver))
    }

    pub fn with_resolver(db: Database, settings: Settings, resolver: ResolverService) -> Self {
        let rate_limiter = RateLimiter::new(Arc::new(db.clone()), settings.limits.clone());

        let usage = if settings.usage.enabled {
            let store: Arc<dyn UsageStore> = Arc::new(db.clone());
            UsageLogger::new(Some(store))
        } else {
            UsageLogger::disabled()
        };

        Self {
            db,
            settings: Arc::new(settings),
            resolver: Arc::new(resolver),
            rate_limiter: Arc::new(rate_limiter),
            usage,
        }
    }
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health check
        .route("/health", get(handlers::health))
        .route("/platforms", get(handlers::platforms))

        // Resolution
        .route("/download", post(handlers::download::download))
        .route("/log-download", post(handlers::usage::log_download))

        // Admin
        .route("/admin/auth", post(handlers::admin::auth))
        .route("/admin/stats", post(handlers::admin::stats));

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}
