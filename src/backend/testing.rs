//! Local stand-ins for upstream services

use async_trait::async_trait;
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::{BackendConfig, BackendType, MediaBackend, MediaResult, ResolveRequest, Result};
use crate::platform::{MediaKind, Platform};

/// Serve a router on an ephemeral local port and return its base URL
pub async fn spawn_upstream(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base URL on which nothing is listening
pub async fn dead_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

type Outcome = Box<dyn Fn(&ResolveRequest) -> Result<MediaResult> + Send + Sync>;

/// Backend with a scripted answer that counts its calls
pub struct ScriptedBackend {
    config: BackendConfig,
    outcome: Outcome,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    /// An empty `platforms` list makes the backend generic
    pub fn new(
        name: &str,
        platforms: Vec<Platform>,
        outcome: impl Fn(&ResolveRequest) -> Result<MediaResult> + Send + Sync + 'static,
    ) -> Self {
        let mut config = BackendConfig::new(name, BackendType::Scraper);
        config.platforms = platforms;
        Self {
            config,
            outcome: Box::new(outcome),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn kinds(mut self, kinds: Vec<MediaKind>) -> Self {
        self.config.kinds = kinds;
        self
    }
}

#[async_trait]
impl MediaBackend for ScriptedBackend {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn backend_type(&self) -> BackendType {
        self.config.backend_type
    }

    async fn resolve(&self, request: &ResolveRequest) -> Result<MediaResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.outcome)(request)
    }
}
