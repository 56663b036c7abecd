//! Job-based conversion backend
//!
//! Conversion services (typically audio extraction) accept a job and
//! produce the file asynchronously. The job is submitted once, then its
//! status is polled at a fixed interval until a `download_url` shows up, the
//! job reports failure, or the attempt ceiling is reached.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::{
    read_json, BackendConfig, BackendError, BackendType, MediaBackend, MediaResult,
    ResolveRequest, Result,
};

const JOB_ID_KEYS: &[&str] = &["job_id", "jobId", "id"];

/// What a status document says about the job
#[derive(Debug, PartialEq)]
enum PollOutcome {
    Done(String),
    Failed(Option<String>),
    Pending,
}

pub struct ConverterBackend {
    config: BackendConfig,
    http: Client,
}

impl ConverterBackend {
    pub fn new(config: BackendConfig, http: Client) -> Result<Self> {
        if config.submit_url.as_deref().map_or(true, str::is_empty) {
            return Err(BackendError::NotConfigured(format!(
                "{}: missing submit_url",
                config.name
            )));
        }
        if config.max_attempts == 0 {
            return Err(BackendError::NotConfigured(format!(
                "{}: max_attempts must be positive",
                config.name
            )));
        }

        Ok(Self { config, http })
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.config.api_key, &self.config.host) {
            (Some(key), Some(host)) => request
                .header("X-RapidAPI-Key", key)
                .header("X-RapidAPI-Host", host),
            _ => request,
        }
    }

    async fn submit(&self, request: &ResolveRequest) -> Result<Value> {
        let submit_url = self.config.submit_url.as_deref().unwrap_or_default();
        let body = json!({
            "url": request.url,
            "id": request.identifier,
            "format": request.kind.extension(),
        });

        let response = self
            .with_auth(self.http.post(submit_url).json(&body))
            .send()
            .await?;

        read_json(response).await
    }

    /// Where to poll for the submitted job
    fn status_location(&self, submitted: &Value) -> Result<String> {
        if let Some(url) = submitted.get("status_url").and_then(Value::as_str) {
            return Ok(url.to_string());
        }

        let job = JOB_ID_KEYS.iter().find_map(|key| match submitted.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        });

        match (job, &self.config.status_url) {
            (Some(job), Some(template)) => Ok(template.replace("{job}", &urlencoding::encode(&job))),
            _ => Err(BackendError::Unrecognized {
                payload: submitted.clone(),
            }),
        }
    }

    async fn poll_once(&self, status_url: &str) -> Result<Value> {
        let response = self.with_auth(self.http.get(status_url)).send().await?;
        read_json(response).await
    }
}

fn poll_outcome(payload: &Value) -> PollOutcome {
    if let Some(url) = payload
        .get("download_url")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    {
        return PollOutcome::Done(url.to_string());
    }

    // Converters fill `error` with "", 0 or false while a job is healthy
    match payload.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => {}
        Some(Value::String(s)) if s.trim().is_empty() => {}
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => {}
        Some(Value::String(s)) => return PollOutcome::Failed(Some(s.clone())),
        Some(other) => return PollOutcome::Failed(Some(other.to_string())),
    }

    let failed = payload
        .get("status")
        .and_then(Value::as_str)
        .map_or(false, |s| s.eq_ignore_ascii_case("failed"));

    if failed {
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        return PollOutcome::Failed(message);
    }

    PollOutcome::Pending
}

#[async_trait]
impl MediaBackend for ConverterBackend {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Converter
    }

    async fn resolve(&self, request: &ResolveRequest) -> Result<MediaResult> {
        let submitted = self.submit(request).await?;

        match poll_outcome(&submitted) {
            PollOutcome::Done(url) => return Ok(MediaResult::redirect(url, None)),
            PollOutcome::Failed(message) => {
                return Err(BackendError::Upstream {
                    code: "converter.failed".to_string(),
                    message,
                })
            }
            PollOutcome::Pending => {}
        }

        let status_url = self.status_location(&submitted)?;
        debug!("{} polling {}", self.config.name, status_url);

        for attempt in 1..=self.config.max_attempts {
            tokio::time::sleep(self.poll_interval()).await;

            let payload = self.poll_once(&status_url).await?;
            match poll_outcome(&payload) {
                PollOutcome::Done(url) => {
                    info!(
                        "Conversion for {} finished after {} polls",
                        request.url, attempt
                    );
                    return Ok(MediaResult::redirect(url, None));
                }
                PollOutcome::Failed(message) => {
                    return Err(BackendError::Upstream {
                        code: "converter.failed".to_string(),
                        message,
                    })
                }
                PollOutcome::Pending => {}
            }
        }

        Err(BackendError::Timeout {
            attempts: self.config.max_attempts,
        })
    }
}
