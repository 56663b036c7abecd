//! Single-request backends with heuristic response parsing
//!
//! Covers RapidAPI-hosted services (keyed) and free scraping endpoints
//! (keyless). Both issue one request built from an endpoint template and
//! run the JSON answer through the extraction rules.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use super::rules::{apply_rules, upstream_error, ExtractionRule, DEFAULT_RULES};
use super::{
    read_json, BackendConfig, BackendError, BackendType, HttpMethod, MediaBackend, MediaResult,
    ResolveRequest, Result,
};

pub struct HeuristicBackend {
    config: BackendConfig,
    http: Client,
    rules: &'static [ExtractionRule],
}

impl HeuristicBackend {
    pub fn new(config: BackendConfig, http: Client) -> Result<Self> {
        if config.endpoint.as_deref().map_or(true, str::is_empty) {
            return Err(BackendError::NotConfigured(format!(
                "{}: missing endpoint",
                config.name
            )));
        }

        if config.backend_type == BackendType::RapidApi {
            if config.api_key.as_deref().map_or(true, str::is_empty) {
                return Err(BackendError::NotConfigured(format!(
                    "{}: missing RapidAPI key",
                    config.name
                )));
            }
            if config.host.is_none() {
                return Err(BackendError::NotConfigured(format!(
                    "{}: missing RapidAPI host",
                    config.name
                )));
            }
        }

        Ok(Self {
            config,
            http,
            rules: DEFAULT_RULES,
        })
    }

    /// Replace the extraction rules
    #[cfg(test)]
    pub fn with_rules(mut self, rules: &'static [ExtractionRule]) -> Self {
        self.rules = rules;
        self
    }

    /// Fill the endpoint template for a request
    fn build_url(&self, request: &ResolveRequest) -> Result<String> {
        let template = self.config.endpoint.as_deref().unwrap_or_default();

        let mut url = template.replace("{url}", &urlencoding::encode(&request.url));

        if url.contains("{id}") {
            let id = request
                .identifier
                .as_deref()
                .ok_or(BackendError::MissingIdentifier)?;
            url = url.replace("{id}", &urlencoding::encode(id));
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url);
        }

        match self.config.host {
            Some(ref host) => Ok(format!("https://{}{}", host, url)),
            None => Err(BackendError::NotConfigured(format!(
                "{}: relative endpoint without host",
                self.config.name
            ))),
        }
    }
}

#[async_trait]
impl MediaBackend for HeuristicBackend {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn backend_type(&self) -> BackendType {
        self.config.backend_type
    }

    async fn resolve(&self, request: &ResolveRequest) -> Result<MediaResult> {
        let url = self.build_url(request)?;
        debug!("{} requesting {}", self.config.name, url);

        let mut http_request = match self.config.method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url).json(&json!({ "url": request.url })),
        };

        if self.config.backend_type == BackendType::RapidApi {
            if let (Some(ref key), Some(ref host)) = (&self.config.api_key, &self.config.host) {
                http_request = http_request
                    .header("X-RapidAPI-Key", key)
                    .header("X-RapidAPI-Host", host);
            }
        }

        let payload = read_json(http_request.send().await?).await?;

        if let Some((code, message)) = upstream_error(&payload) {
            return Err(BackendError::Upstream { code, message });
        }

        match apply_rules(&payload, self.rules, request.kind) {
            Some(result) => {
                info!("Resolved {} via {}", request.url, self.config.name);
                Ok(result)
            }
            None => Err(BackendError::Unrecognized { payload }),
        }
    }
}
