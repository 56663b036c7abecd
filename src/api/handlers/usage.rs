//! Client-reported download logging

use axum::{body::Bytes, extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::api::AppState;

#[derive(Debug, Deserialize)]
pub struct LogDownloadRequest {
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub format: String,
}

/// Record a download the browser finished on its own, such as a picker
/// item. Results of `/download` are already logged server-side.
///
/// Always answers `{success: true}`: logging is telemetry and a malformed
/// body or a store failure is not the caller's problem.
pub async fn log_download(State(state): State<AppState>, body: Bytes) -> Json<serde_json::Value> {
    match serde_json::from_slice::<LogDownloadRequest>(&body) {
        Ok(req) => {
            state.usage.record(&req.platform, &req.format);
        }
        Err(e) => debug!("Ignoring malformed download log: {}", e),
    }

    Json(json!({ "success": true }))
}
