//! Link resolution pipeline
//!
//! Validates the submitted link, classifies it, extracts identifiers and
//! walks the backends that serve the platform in configured order until one
//! produces a result.

use anyhow::Result as AnyResult;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{BackendConfig, BackendError, MediaBackend, MediaResult, ResolveRequest};
use crate::platform::{self, MediaKind, Platform};
use crate::utils::media_filename;

/// Errors that stop a link from resolving
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Invalid link: {0}")]
    InvalidInput(String),

    #[error("Unsupported platform")]
    UnsupportedPlatform,

    #[error("Daily limit reached")]
    RateLimitExceeded { remaining: u32 },

    #[error("No backend configured for {0}")]
    NotConfigured(Platform),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ResolveError {
    pub fn code(&self) -> String {
        match self {
            ResolveError::InvalidInput(_) => "link.invalid".to_string(),
            ResolveError::UnsupportedPlatform => "link.unsupported".to_string(),
            ResolveError::RateLimitExceeded { .. } => "rate.exceeded".to_string(),
            ResolveError::NotConfigured(_) => "backend.not_configured".to_string(),
            ResolveError::Backend(e) => e.code(),
        }
    }

    /// HTTP status the error is reported with
    pub fn http_status(&self) -> u16 {
        match self {
            ResolveError::InvalidInput(_) | ResolveError::UnsupportedPlatform => 400,
            ResolveError::RateLimitExceeded { .. } => 429,
            ResolveError::NotConfigured(_) => 500,
            ResolveError::Backend(e) => e
                .http_status()
                .filter(|status| (400..=599).contains(status))
                .unwrap_or(500),
        }
    }

    /// Fold the error into an error result
    pub fn to_result(&self) -> MediaResult {
        match self {
            ResolveError::Backend(e) => MediaResult::Error {
                error: e.to_error_info(),
            },
            other => MediaResult::error(other.code(), Some(other.to_string())),
        }
    }
}

/// A successfully resolved link
#[derive(Debug, Clone)]
pub struct Resolution {
    pub result: MediaResult,
    pub platform: Platform,
    /// Name of the backend that produced the result
    pub backend: String,
}

/// Validated request plus the backends that may serve it
pub struct Prepared {
    pub request: ResolveRequest,
    pub chain: Vec<Arc<dyn MediaBackend>>,
}

pub struct ResolverService {
    backends: Vec<Arc<dyn MediaBackend>>,
}

impl ResolverService {
    pub fn new(backends: Vec<Arc<dyn MediaBackend>>) -> Self {
        Self { backends }
    }

    /// Build every configured backend; any invalid entry is an error
    pub fn from_configs(configs: &[BackendConfig], http: Client) -> AnyResult<Self> {
        let mut backends = Vec::with_capacity(configs.len());
        for config in configs {
            let backend = config.create_backend(http.clone()).map_err(|e| {
                anyhow::anyhow!("Invalid backend '{}': {}", config.name, e)
            })?;
            info!(
                "Configured backend {} ({}) for {}",
                backend.name(),
                backend.backend_type(),
                if config.is_generic() {
                    "all platforms".to_string()
                } else {
                    config
                        .platforms
                        .iter()
                        .map(Platform::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                }
            );
            backends.push(backend);
        }
        Ok(Self::new(backends))
    }

    pub fn backends(&self) -> &[Arc<dyn MediaBackend>] {
        &self.backends
    }

    /// Validate the link and select the backend chain
    pub fn prepare(&self, url: &str, kind: MediaKind) -> Result<Prepared, ResolveError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ResolveError::InvalidInput("link is empty".to_string()));
        }

        let parsed = url::Url::parse(url)
            .map_err(|e| ResolveError::InvalidInput(format!("not a URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(ResolveError::InvalidInput(
                "only http(s) links are accepted".to_string(),
            ));
        }

        let platform = platform::detect(url);
        let identifier = platform::extract(url, platform);

        let chain: Vec<_> = self
            .backends
            .iter()
            .filter(|b| b.supports(platform, kind))
            .cloned()
            .collect();

        if chain.is_empty() {
            return Err(if platform.is_known() {
                ResolveError::NotConfigured(platform)
            } else {
                ResolveError::UnsupportedPlatform
            });
        }

        Ok(Prepared {
            request: ResolveRequest {
                url: url.to_string(),
                platform,
                identifier,
                kind,
            },
            chain,
        })
    }

    /// Run a prepared request through its chain; first success wins
    pub async fn execute(&self, prepared: Prepared) -> Result<Resolution, ResolveError> {
        let Prepared { request, chain } = prepared;
        let mut last_error = None;

        for backend in &chain {
            info!(
                "Resolving {} ({}, {}) via {}",
                request.url,
                request.platform,
                request.kind,
                backend.name()
            );

            match backend.resolve(&request).await {
                Ok(result) => {
                    let result = result.with_default_filename(|| {
                        media_filename(request.platform, request.identifier.as_deref(), request.kind)
                    });
                    return Ok(Resolution {
                        result,
                        platform: request.platform,
                        backend: backend.name().to_string(),
                    });
                }
                Err(e) => {
                    warn!("Backend {} failed for {}: {}", backend.name(), request.url, e);
                    last_error = Some(e);
                }
            }
        }

        debug!("All {} backends failed for {}", chain.len(), request.url);

        Err(match last_error {
            Some(BackendError::MissingIdentifier) => ResolveError::InvalidInput(format!(
                "no {} identifier in link",
                request.platform
            )),
            Some(e) => ResolveError::Backend(e),
            None => ResolveError::NotConfigured(request.platform),
        })
    }

    #[cfg(test)]
    pub async fn resolve(&self, url: &str, kind: MediaKind) -> Result<Resolution, ResolveError> {
        let prepared = self.prepare(url, kind)?;
        self.execute(prepared).await
    }

    /// Resolve with every failure folded into an error result
    #[cfg(test)]
    pub async fn handle(&self, url: &str, kind: MediaKind) -> MediaResult {
        match self.resolve(url, kind).await {
            Ok(resolution) => resolution.result,
            Err(e) => e.to_result(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::ScriptedBackend;
    use crate::backend::{PickerItem, PickerType};
    use std::sync::atomic::Ordering;

    fn ok(url: &'static str) -> impl Fn(&ResolveRequest) -> crate::backend::Result<MediaResult> {
        move |_| Ok(MediaResult::redirect(url, None))
    }

    fn refused() -> impl Fn(&ResolveRequest) -> crate::backend::Result<MediaResult> {
        |_| Err(BackendError::Unreachable("connection refused".into()))
    }

    const TIKTOK: &str = "https://www.tiktok.com/@user/video/7234567890123456789";

    #[tokio::test]
    async fn test_invalid_input() {
        let service = ResolverService::new(vec![Arc::new(ScriptedBackend::new("any", vec![], ok("https://x")))]);

        for input in ["", "   ", "not a url", "ftp://tiktok.com/video/1", "javascript:alert(1)"] {
            let err = service.resolve(input, MediaKind::Video).await.unwrap_err();
            assert!(matches!(err, ResolveError::InvalidInput(_)), "{:?}", input);
            assert_eq!(err.http_status(), 400);
            assert_eq!(err.code(), "link.invalid");
        }
    }

    #[tokio::test]
    async fn test_unknown_platform_without_generic_backend() {
        let service = ResolverService::new(vec![Arc::new(ScriptedBackend::new(
            "tiktok-only",
            vec![Platform::Tiktok],
            ok("https://x"),
        ))]);

        let err = service
            .resolve("https://vimeo.com/12345", MediaKind::Video)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedPlatform));
        assert_eq!(err.code(), "link.unsupported");
        assert_eq!(err.http_status(), 400);
    }

    #[tokio::test]
    async fn test_generic_backend_serves_unknown_links() {
        let service = ResolverService::new(vec![Arc::new(ScriptedBackend::new(
            "cobalt",
            vec![],
            ok("https://cdn.example/v.mp4"),
        ))]);

        let resolution = service
            .resolve("https://vimeo.com/12345", MediaKind::Video)
            .await
            .unwrap();
        assert_eq!(resolution.platform, Platform::Unknown);
        assert_eq!(resolution.backend, "cobalt");
    }

    #[tokio::test]
    async fn test_known_platform_without_backend() {
        let service = ResolverService::new(vec![Arc::new(
            ScriptedBackend::new("yt-audio", vec![Platform::Youtube], ok("https://x"))
                .kinds(vec![MediaKind::Audio]),
        )]);

        let err = service
            .resolve("https://youtu.be/dQw4w9WgXcQ", MediaKind::Video)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotConfigured(Platform::Youtube)));
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.code(), "backend.not_configured");
    }

    #[tokio::test]
    async fn test_falls_back_in_order_and_stops_at_first_success() {
        let first = ScriptedBackend::new("first", vec![Platform::Tiktok], refused());
        let second = ScriptedBackend::new("second", vec![], ok("https://cdn.example/2.mp4"));
        let third = ScriptedBackend::new("third", vec![], ok("https://cdn.example/3.mp4"));
        let calls = [first.calls.clone(), second.calls.clone(), third.calls.clone()];

        let service = ResolverService::new(vec![Arc::new(first), Arc::new(second), Arc::new(third)]);
        let resolution = service.resolve(TIKTOK, MediaKind::Video).await.unwrap();

        assert_eq!(resolution.backend, "second");
        assert_eq!(
            resolution.result,
            MediaResult::redirect(
                "https://cdn.example/2.mp4",
                Some("tiktok_7234567890123456789.mp4".into())
            )
        );
        let counts: Vec<_> = calls.iter().map(|c| c.load(Ordering::SeqCst)).collect();
        assert_eq!(counts, [1, 1, 0]);
    }

    #[tokio::test]
    async fn test_last_error_is_reported() {
        let service = ResolverService::new(vec![
            Arc::new(ScriptedBackend::new("a", vec![], refused())),
            Arc::new(ScriptedBackend::new("b", vec![], |_| {
                Err(BackendError::Status {
                    status: 503,
                    message: "busy".into(),
                })
            })),
        ]);

        let err = service.resolve(TIKTOK, MediaKind::Video).await.unwrap_err();
        assert_eq!(err.code(), "backend.http_error");
        assert_eq!(err.http_status(), 503);

        let result = service.handle(TIKTOK, MediaKind::Video).await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_backend_status_outside_error_range_maps_to_500() {
        let err = ResolveError::Backend(BackendError::Status {
            status: 302,
            message: String::new(),
        });
        assert_eq!(err.http_status(), 500);

        let err = ResolveError::Backend(BackendError::Timeout { attempts: 30 });
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.code(), "backend.timeout");
    }

    #[tokio::test]
    async fn test_missing_identifier_becomes_invalid_input() {
        let service = ResolverService::new(vec![Arc::new(ScriptedBackend::new(
            "needs-id",
            vec![Platform::Youtube],
            |req| match req.identifier {
                Some(_) => Ok(MediaResult::redirect("https://x", None)),
                None => Err(BackendError::MissingIdentifier),
            },
        ))]);

        let err = service
            .resolve("https://www.youtube.com/@somechannel", MediaKind::Video)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_request_carries_platform_identifier_and_kind() {
        let service = ResolverService::new(vec![Arc::new(ScriptedBackend::new(
            "echo",
            vec![Platform::YoutubeMusic],
            |req| {
                assert_eq!(req.platform, Platform::YoutubeMusic);
                assert_eq!(req.identifier.as_deref(), Some("dQw4w9WgXcQ"));
                assert_eq!(req.kind, MediaKind::Audio);
                Ok(MediaResult::redirect("https://cdn.example/a.mp3", Some("song.mp3".into())))
            },
        ))]);

        let resolution = service
            .resolve(
                "  https://music.youtube.com/watch?v=dQw4w9WgXcQ&feature=share  ",
                MediaKind::Audio,
            )
            .await
            .unwrap();
        // a backend-provided filename is kept
        assert_eq!(resolution.result.filename(), Some("song.mp3"));
    }

    #[tokio::test]
    async fn test_picker_gets_default_filename() {
        let service = ResolverService::new(vec![Arc::new(ScriptedBackend::new("carousel", vec![], |_| {
            Ok(MediaResult::picker(
                vec![PickerItem {
                    url: "https://cdn.example/1.jpg".into(),
                    item_type: PickerType::Image,
                    quality: None,
                    thumbnail: None,
                }],
                None,
            )
            .unwrap())
        }))]);

        let result = service
            .handle("https://www.instagram.com/p/CxYz123AbC/", MediaKind::Video)
            .await;
        assert_eq!(result.filename(), Some("instagram_CxYz123AbC.mp4"));
    }

    #[test]
    fn test_error_results() {
        let result = ResolveError::RateLimitExceeded { remaining: 0 }.to_result();
        match result {
            MediaResult::Error { error } => assert_eq!(error.code, "rate.exceeded"),
            other => panic!("expected error, got {:?}", other),
        }

        let result = ResolveError::Backend(BackendError::Unrecognized {
            payload: serde_json::json!({"odd": true}),
        })
        .to_result();
        match result {
            MediaResult::Error { error } => {
                assert_eq!(error.code, "backend.unrecognized");
                assert_eq!(error.context, Some(serde_json::json!({"odd": true})));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }
}
