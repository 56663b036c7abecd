//! Cobalt protocol backend
//!
//! Talks to public or self-hosted Cobalt instances. Instances are tried one
//! after another; the first one answering with `redirect`, `tunnel` or
//! `picker` wins.
//! Reference: https://github.com/imputnet/cobalt/blob/main/docs/api.md

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{
    BackendConfig, BackendError, BackendType, MediaBackend, MediaResult, PickerItem, PickerType,
    ResolveRequest, Result,
};
use crate::platform::MediaKind;

pub struct CobaltBackend {
    config: BackendConfig,
    http: Client,
}

impl CobaltBackend {
    pub fn new(config: BackendConfig, http: Client) -> Result<Self> {
        if config.instances.is_empty() {
            return Err(BackendError::NotConfigured(format!(
                "{}: no cobalt instances",
                config.name
            )));
        }

        Ok(Self { config, http })
    }

    fn request_body(&self, request: &ResolveRequest) -> Value {
        let download_mode = match request.kind {
            MediaKind::Video => "auto",
            MediaKind::Audio => "audio",
        };

        json!({
            "url": request.url,
            "downloadMode": download_mode,
            "videoQuality": self.config.video_quality,
            "audioFormat": "mp3",
            "filenameStyle": "basic",
        })
    }

    async fn try_instance(&self, base: &str, body: &Value, kind: MediaKind) -> Result<MediaResult> {
        let url = format!("{}/", base.trim_end_matches('/'));

        let mut request = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(body);

        if let Some(ref key) = self.config.api_key {
            request = request.header(AUTHORIZATION, format!("Api-Key {}", key));
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        // Cobalt reports its own errors with 4xx statuses and a JSON body
        let payload: Value = match serde_json::from_str(&text) {
            Ok(payload) => payload,
            Err(_) if !status.is_success() => {
                return Err(BackendError::Status {
                    status: status.as_u16(),
                    message: text.chars().take(200).collect(),
                })
            }
            Err(_) => {
                return Err(BackendError::Unrecognized {
                    payload: Value::String(text.chars().take(2000).collect()),
                })
            }
        };

        // Anything else answering with an error status (proxy, CDN) keeps that status
        let cobalt_error = payload.get("status").and_then(Value::as_str) == Some("error");
        if !status.is_success() && !cobalt_error {
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        let parsed: CobaltResponse = serde_json::from_value(payload.clone())
            .map_err(|_| BackendError::Unrecognized { payload: payload.clone() })?;

        parsed.into_result(kind, payload)
    }
}

#[async_trait]
impl MediaBackend for CobaltBackend {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Cobalt
    }

    async fn resolve(&self, request: &ResolveRequest) -> Result<MediaResult> {
        let body = self.request_body(request);
        let mut last_error = None;

        for instance in &self.config.instances {
            match self.try_instance(instance, &body, request.kind).await {
                Ok(result) => {
                    info!("Resolved {} via cobalt instance {}", request.url, instance);
                    return Ok(result);
                }
                Err(e) => {
                    warn!("Cobalt instance {} failed: {}", instance, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BackendError::NotConfigured(format!("{}: no cobalt instances", self.config.name))
        }))
    }
}

// Cobalt API response types

#[derive(Debug, Deserialize)]
struct CobaltResponse {
    status: String,
    url: Option<String>,
    filename: Option<String>,
    #[serde(default)]
    picker: Vec<CobaltPickerItem>,
    /// Background audio offered alongside a picker
    audio: Option<String>,
    error: Option<CobaltError>,
}

#[derive(Debug, Deserialize)]
struct CobaltPickerItem {
    #[serde(rename = "type")]
    item_type: Option<String>,
    url: String,
    thumb: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CobaltError {
    code: String,
    context: Option<Value>,
}

impl CobaltResponse {
    fn into_result(self, kind: MediaKind, payload: Value) -> Result<MediaResult> {
        match self.status.as_str() {
            "redirect" | "tunnel" => match self.url {
                Some(url) if !url.is_empty() => Ok(MediaResult::redirect(url, self.filename)),
                _ => Err(BackendError::Unrecognized { payload }),
            },
            "picker" => {
                let mut items: Vec<PickerItem> = self
                    .picker
                    .into_iter()
                    .map(|item| PickerItem {
                        url: item.url,
                        item_type: item
                            .item_type
                            .as_deref()
                            .map(PickerType::from_upstream)
                            .unwrap_or(PickerType::Video),
                        quality: None,
                        thumbnail: item.thumb,
                    })
                    .collect();

                if let (MediaKind::Audio, Some(audio)) = (kind, self.audio) {
                    items.push(PickerItem {
                        url: audio,
                        item_type: PickerType::Audio,
                        quality: None,
                        thumbnail: None,
                    });
                }

                MediaResult::picker(items, self.filename)
                    .ok_or(BackendError::Unrecognized { payload })
            }
            "error" => {
                let (code, message) = match self.error {
                    Some(error) => (error.code, error.context.map(|c| c.to_string())),
                    None => ("cobalt.error".to_string(), None),
                };
                Err(BackendError::Upstream { code, message })
            }
            other => Err(BackendError::Upstream {
                code: "cobalt.unexpected_status".to_string(),
                message: Some(format!("unexpected status: {}", other)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{dead_upstream, http_client, spawn_upstream};
    use crate::platform::Platform;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    type HitLog = Arc<Mutex<Vec<String>>>;

    /// An instance that records the hit and answers with a fixed status/body
    async fn instance(name: &str, hits: HitLog, status: StatusCode, body: Value) -> String {
        let name = name.to_string();
        let router = Router::new().route(
            "/",
            post(move |Json(req): Json<Value>| {
                let hits = hits.clone();
                let name = name.clone();
                let body = body.clone();
                async move {
                    assert!(req.get("url").is_some());
                    hits.lock().unwrap().push(name);
                    (status, Json(body))
                }
            }),
        );
        spawn_upstream(router).await
    }

    fn backend(instances: Vec<String>) -> CobaltBackend {
        let mut config = BackendConfig::new("cobalt", BackendType::Cobalt);
        config.instances = instances;
        CobaltBackend::new(config, http_client()).unwrap()
    }

    fn request(kind: MediaKind) -> ResolveRequest {
        ResolveRequest {
            url: "https://www.tiktok.com/@u/video/1".into(),
            platform: Platform::Tiktok,
            identifier: Some("1".into()),
            kind,
        }
    }

    #[test]
    fn test_requires_instances() {
        let config = BackendConfig::new("cobalt", BackendType::Cobalt);
        assert!(matches!(
            CobaltBackend::new(config, http_client()),
            Err(BackendError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_falls_through_network_errors_to_last_instance() {
        let hits: HitLog = Arc::default();
        let good = instance(
            "good",
            hits.clone(),
            StatusCode::OK,
            json!({"status": "redirect", "url": "https://cdn.example/v.mp4", "filename": "v.mp4"}),
        )
        .await;

        let instances = vec![dead_upstream().await, dead_upstream().await, good];
        let result = backend(instances).resolve(&request(MediaKind::Video)).await.unwrap();

        assert_eq!(
            result,
            MediaResult::redirect("https://cdn.example/v.mp4", Some("v.mp4".into()))
        );
        assert_eq!(*hits.lock().unwrap(), vec!["good".to_string()]);
    }

    #[tokio::test]
    async fn test_tries_every_instance_in_order() {
        let hits: HitLog = Arc::default();
        let first = instance(
            "first",
            hits.clone(),
            StatusCode::BAD_GATEWAY,
            json!({"oops": true}),
        )
        .await;
        let second = instance(
            "second",
            hits.clone(),
            StatusCode::BAD_REQUEST,
            json!({"status": "error", "error": {"code": "error.api.fetch.fail"}}),
        )
        .await;
        let third = instance(
            "third",
            hits.clone(),
            StatusCode::OK,
            json!({"status": "local-processing"}),
        )
        .await;
        let fourth = instance(
            "fourth",
            hits.clone(),
            StatusCode::OK,
            json!({"status": "tunnel", "url": "https://inst.example/tunnel?id=1"}),
        )
        .await;

        let result = backend(vec![first, second, third, fourth])
            .resolve(&request(MediaKind::Video))
            .await
            .unwrap();

        assert_eq!(result, MediaResult::redirect("https://inst.example/tunnel?id=1", None));
        assert_eq!(
            *hits.lock().unwrap(),
            vec!["first", "second", "third", "fourth"]
        );
    }

    #[tokio::test]
    async fn test_all_failed_returns_last_error() {
        let hits: HitLog = Arc::default();
        let only = instance(
            "only",
            hits.clone(),
            StatusCode::BAD_REQUEST,
            json!({"status": "error", "error": {"code": "error.api.content.video.unavailable"}}),
        )
        .await;

        let err = backend(vec![dead_upstream().await, only])
            .resolve(&request(MediaKind::Video))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "error.api.content.video.unavailable");
    }

    #[tokio::test]
    async fn test_foreign_error_body_keeps_http_status() {
        let inst = instance(
            "busy",
            Arc::default(),
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"message": "overloaded"}),
        )
        .await;

        let err = backend(vec![inst])
            .resolve(&request(MediaKind::Video))
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Status { status: 503, .. }));
        assert_eq!(err.http_status(), Some(503));
        assert_eq!(err.code(), "backend.http_error");
    }

    #[tokio::test]
    async fn test_picker_keeps_order_and_adds_audio() {
        let hits: HitLog = Arc::default();
        let inst = instance(
            "picker",
            hits,
            StatusCode::OK,
            json!({
                "status": "picker",
                "audio": "https://cdn.example/bg.mp3",
                "picker": [
                    {"type": "photo", "url": "https://cdn.example/1.jpg"},
                    {"type": "video", "url": "https://cdn.example/2.mp4", "thumb": "https://cdn.example/2.jpg"}
                ]
            }),
        )
        .await;

        let backend = backend(vec![inst]);

        match backend.resolve(&request(MediaKind::Video)).await.unwrap() {
            MediaResult::Picker { picker, .. } => {
                assert_eq!(picker.len(), 2);
                assert_eq!(picker[0].item_type, PickerType::Image);
                assert_eq!(picker[1].url, "https://cdn.example/2.mp4");
            }
            other => panic!("expected picker, got {:?}", other),
        }

        match backend.resolve(&request(MediaKind::Audio)).await.unwrap() {
            MediaResult::Picker { picker, .. } => {
                assert_eq!(picker.len(), 3);
                assert_eq!(picker[2].item_type, PickerType::Audio);
            }
            other => panic!("expected picker, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_picker_is_unrecognized() {
        let inst = instance(
            "empty",
            Arc::default(),
            StatusCode::OK,
            json!({"status": "picker", "picker": []}),
        )
        .await;

        let err = backend(vec![inst])
            .resolve(&request(MediaKind::Video))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unrecognized { .. }));
    }
}
