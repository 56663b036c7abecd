//! API request handlers

pub mod admin;
pub mod download;
pub mod usage;

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::json;

use crate::backend::{BackendType, MediaBackend};
use crate::platform::{MediaKind, Platform};

use super::AppState;

/// Health check endpoint
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
pub struct BackendSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub backend_type: BackendType,
    /// Empty means every platform
    pub platforms: Vec<Platform>,
    pub kinds: Vec<MediaKind>,
}

#[derive(Debug, Serialize)]
pub struct PlatformsResponse {
    pub platforms: Vec<Platform>,
    pub backends: Vec<BackendSummary>,
}

/// Supported platforms and the configured backend chain
pub async fn platforms(State(state): State<AppState>) -> Json<PlatformsResponse> {
    let backends = state
        .resolver
        .backends()
        .iter()
        .map(|b| BackendSummary {
            name: b.name().to_string(),
            backend_type: b.backend_type(),
            platforms: b.config().platforms.clone(),
            kinds: b.config().kinds.clone(),
        })
        .collect();

    Json(PlatformsResponse {
        platforms: Platform::KNOWN.to_vec(),
        backends,
    })
}
