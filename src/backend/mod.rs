//! Resolver backend abstraction layer
//!
//! This module provides a unified interface over the third-party services
//! that turn a social media link into a direct media URL (Cobalt instances,
//! RapidAPI services, keyless scraping endpoints, conversion services).

mod cobalt;
mod converter;
mod heuristic;
pub mod quality;
mod result;
pub mod rules;

#[cfg(test)]
pub(crate) mod testing;

pub use cobalt::CobaltBackend;
pub use converter::ConverterBackend;
pub use heuristic::HeuristicBackend;
pub use result::{ErrorInfo, MediaResult, PickerItem, PickerType};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::platform::{MediaKind, Platform};

/// Unified error type for backend operations
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    #[error("Upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Upstream error: {code}")]
    Upstream {
        code: String,
        message: Option<String>,
    },

    #[error("Unrecognized upstream response")]
    Unrecognized { payload: serde_json::Value },

    #[error("Link has no usable identifier")]
    MissingIdentifier,

    #[error("No result after {attempts} polling attempts")]
    Timeout { attempts: u32 },

    #[error("Backend not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => BackendError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => BackendError::Unreachable(err.to_string()),
        }
    }
}

impl BackendError {
    /// Machine-readable code placed in error results
    pub fn code(&self) -> String {
        match self {
            BackendError::Unreachable(_) => "backend.unreachable".to_string(),
            BackendError::Status { .. } => "backend.http_error".to_string(),
            BackendError::Upstream { code, .. } => code.clone(),
            BackendError::Unrecognized { .. } => "backend.unrecognized".to_string(),
            BackendError::MissingIdentifier => "link.no_id".to_string(),
            BackendError::Timeout { .. } => "backend.timeout".to_string(),
            BackendError::NotConfigured(_) => "backend.not_configured".to_string(),
        }
    }

    /// Upstream HTTP status, when one was received
    pub fn http_status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        let message = match self {
            BackendError::Upstream {
                message: Some(message),
                ..
            } => message.clone(),
            other => other.to_string(),
        };

        let context = match self {
            BackendError::Unrecognized { payload } => Some(payload.clone()),
            _ => None,
        };

        ErrorInfo {
            code: self.code(),
            message: Some(message),
            context,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Backend variants
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    Cobalt,
    RapidApi,
    Scraper,
    Converter,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Cobalt => write!(f, "cobalt"),
            BackendType::RapidApi => write!(f, "rapidapi"),
            BackendType::Scraper => write!(f, "scraper"),
            BackendType::Converter => write!(f, "converter"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cobalt" => Ok(BackendType::Cobalt),
            "rapidapi" | "rapid" => Ok(BackendType::RapidApi),
            "scraper" | "free" => Ok(BackendType::Scraper),
            "converter" | "polling" => Ok(BackendType::Converter),
            _ => Err(format!("Unknown backend type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// A single resolution request handed to a backend
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub url: String,
    pub platform: Platform,
    pub identifier: Option<String>,
    pub kind: MediaKind,
}

/// Unified interface for resolver backends
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Get backend configuration
    fn config(&self) -> &BackendConfig;

    /// Get the backend type
    fn backend_type(&self) -> BackendType;

    fn name(&self) -> &str {
        &self.config().name
    }

    /// Whether this backend handles the platform and kind
    fn supports(&self, platform: Platform, kind: MediaKind) -> bool {
        self.config().serves(platform, kind)
    }

    /// Resolve a link into a redirect or picker result
    async fn resolve(&self, request: &ResolveRequest) -> Result<MediaResult>;
}

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub backend_type: BackendType,

    /// Platforms served; empty means every platform, including unknown ones
    #[serde(default)]
    pub platforms: Vec<Platform>,

    /// Kinds served; empty means both
    #[serde(default)]
    pub kinds: Vec<MediaKind>,

    /// Cobalt instance base URLs, tried in order
    #[serde(default)]
    pub instances: Vec<String>,

    /// Cobalt `Api-Key` or RapidAPI key
    #[serde(default)]
    pub api_key: Option<String>,

    /// RapidAPI host, e.g. `social-download-all-in-one.p.rapidapi.com`
    #[serde(default)]
    pub host: Option<String>,

    /// Endpoint template with `{url}` and `{id}` placeholders
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub method: HttpMethod,

    /// Converter job submission URL
    #[serde(default)]
    pub submit_url: Option<String>,

    /// Converter status URL template with a `{job}` placeholder
    #[serde(default)]
    pub status_url: Option<String>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Preferred Cobalt video quality
    #[serde(default = "default_video_quality")]
    pub video_quality: String,
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    30
}

fn default_video_quality() -> String {
    "1080".to_string()
}

/// Public Cobalt instances used when nothing is configured
pub const DEFAULT_COBALT_INSTANCES: &[&str] = &[
    "https://api.cobalt.tools",
    "https://cobalt-api.kwiatekmiki.com",
    "https://cobalt.canine.tools",
];

impl BackendConfig {
    /// Create a config with every optional field at its default
    pub fn new(name: impl Into<String>, backend_type: BackendType) -> Self {
        Self {
            name: name.into(),
            backend_type,
            platforms: Vec::new(),
            kinds: Vec::new(),
            instances: Vec::new(),
            api_key: None,
            host: None,
            endpoint: None,
            method: HttpMethod::default(),
            submit_url: None,
            status_url: None,
            poll_interval_ms: default_poll_interval(),
            max_attempts: default_max_attempts(),
            video_quality: default_video_quality(),
        }
    }

    /// Generic Cobalt backend over the public instances
    pub fn default_cobalt() -> Self {
        let mut config = Self::new("cobalt", BackendType::Cobalt);
        config.instances = DEFAULT_COBALT_INSTANCES
            .iter()
            .map(|s| s.to_string())
            .collect();
        config
    }

    /// A generic backend serves every platform, including unknown links
    pub fn is_generic(&self) -> bool {
        self.platforms.is_empty()
    }

    pub fn serves(&self, platform: Platform, kind: MediaKind) -> bool {
        let platform_ok = self.is_generic() || self.platforms.contains(&platform);
        let kind_ok = self.kinds.is_empty() || self.kinds.contains(&kind);
        platform_ok && kind_ok
    }

    /// Create a backend instance based on the configuration
    pub fn create_backend(&self, http: Client) -> Result<Arc<dyn MediaBackend>> {
        let backend: Arc<dyn MediaBackend> = match self.backend_type {
            BackendType::Cobalt => Arc::new(CobaltBackend::new(self.clone(), http)?),
            BackendType::RapidApi | BackendType::Scraper => {
                Arc::new(HeuristicBackend::new(self.clone(), http)?)
            }
            BackendType::Converter => Arc::new(ConverterBackend::new(self.clone(), http)?),
        };
        Ok(backend)
    }
}

/// Read a response body as JSON.
///
/// Non-2xx responses become `Status` errors; bodies that are not JSON become
/// `Unrecognized` with the raw text as payload.
pub(crate) async fn read_json(response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(BackendError::Status {
            status: status.as_u16(),
            message: truncate(&text, 200),
        });
    }

    serde_json::from_str(&text).map_err(|_| BackendError::Unrecognized {
        payload: serde_json::Value::String(truncate(&text, 2000)),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
