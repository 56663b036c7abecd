//! Download link resolution handler

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::info;

use crate::api::AppState;
use crate::backend::MediaResult;
use crate::platform::MediaKind;
use crate::service::ResolveError;
use crate::utils::client_address;

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: MediaKind,
}

/// Canonical result plus the caller's remaining quota
#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    #[serde(flatten)]
    pub result: MediaResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
}

/// Resolve a link into a direct download.
///
/// The daily quota is checked before any upstream call. Quota use and the
/// usage log entry are only recorded once a backend produced a result.
pub async fn download(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<DownloadRequest>,
) -> Result<Json<DownloadResponse>, ResolveError> {
    let address = client_address(&headers, peer, state.settings.server.trust_proxy_headers);

    let prepared = state.resolver.prepare(&req.url, req.kind)?;

    let decision = state.rate_limiter.check(&address, req.kind);
    if !decision.allowed {
        info!("Rate limit reached for {} ({})", address, req.kind);
        return Err(ResolveError::RateLimitExceeded {
            remaining: decision.remaining,
        });
    }

    let resolution = state.resolver.execute(prepared).await?;
    let remaining = state.rate_limiter.consume(&address, req.kind);
    state
        .usage
        .record(resolution.platform.as_str(), req.kind.as_str());

    info!(
        "Resolved {} link for {} via {} ({} left today)",
        resolution.platform, address, resolution.backend, remaining
    );

    Ok(Json(DownloadResponse {
        result: resolution.result,
        remaining: Some(remaining),
    }))
}
