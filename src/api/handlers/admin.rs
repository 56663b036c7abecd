//! Admin dashboard handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::api::{AppError, AppState};
use crate::service::{UsageEntry, UsageStats};
use crate::service::usage::MAX_RECENT;

#[derive(Debug, Deserialize)]
pub struct AdminRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub logs: Vec<UsageEntry>,
    pub stats: UsageStats,
}

fn authorize(state: &AppState, password: &str) -> Result<(), AppError> {
    match state.settings.admin.password.as_deref() {
        Some(expected) if !expected.is_empty() && expected == password => Ok(()),
        Some(_) => {
            warn!("Rejected admin login");
            Err(AppError::unauthorized("Invalid password"))
        }
        None => Err(AppError::unauthorized("Admin access is not configured")),
    }
}

/// Verify the admin password
pub async fn auth(
    State(state): State<AppState>,
    Json(req): Json<AdminRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    authorize(&state, &req.password)?;
    Ok(Json(json!({ "success": true })))
}

/// Recent download logs and aggregate usage
pub async fn stats(
    State(state): State<AppState>,
    Json(req): Json<AdminRequest>,
) -> Result<Json<StatsResponse>, AppError> {
    authorize(&state, &req.password)?;

    let usage = state.usage.clone();
    let limit = state.settings.usage.recent_limit.min(MAX_RECENT);

    let (logs, stats) = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        Ok((usage.recent(limit)?, usage.stats()?))
    })
    .await
    .map_err(|e| AppError::internal(e.to_string()))??;

    Ok(Json(StatsResponse { logs, stats }))
}
