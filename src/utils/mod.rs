//! Utility functions

use axum::http::HeaderMap;
use std::net::SocketAddr;

use crate::platform::{MediaKind, Platform};

/// Address used to key rate limits.
///
/// Proxy headers are only honoured when the deployment says a trusted proxy
/// sets them; otherwise any client could pick its own key.
pub fn client_address(headers: &HeaderMap, peer: SocketAddr, trust_proxy: bool) -> String {
    if trust_proxy {
        forwarded_address(headers).unwrap_or_else(|| peer.ip().to_string())
    } else {
        peer.ip().to_string()
    }
}

fn forwarded_address(headers: &HeaderMap) -> Option<String> {
    let header = |key: &str| {
        headers
            .get(key)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
    };

    let first_forwarded = header("x-forwarded-for").and_then(|forwarded| {
        forwarded
            .split(',')
            .next()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
    });

    first_forwarded
        .or_else(|| header("cf-connecting-ip"))
        .or_else(|| header("x-real-ip"))
}

/// Filename offered when a backend names none:
/// `<platform>_<identifier or unix seconds>.<mp4|mp3>`
pub fn media_filename(platform: Platform, identifier: Option<&str>, kind: MediaKind) -> String {
    let stem = match identifier {
        Some(id) if !id.is_empty() => sanitize(id),
        _ => chrono::Utc::now().timestamp().to_string(),
    };
    format!("{}_{}.{}", platform, stem, kind.extension())
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "192.0.2.10:51234".parse().unwrap()
    }

    #[test]
    fn test_client_address_ignores_headers_by_default() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5"));
        assert_eq!(client_address(&headers, peer(), false), "192.0.2.10");
    }

    #[test]
    fn test_client_address_behind_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.5 , 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.9.9.9"));
        assert_eq!(client_address(&headers, peer(), true), "203.0.113.5");

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" ,"));
        headers.insert("cf-connecting-ip", HeaderValue::from_static("198.51.100.7"));
        assert_eq!(client_address(&headers, peer(), true), "198.51.100.7");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.9.9.9"));
        assert_eq!(client_address(&headers, peer(), true), "10.9.9.9");

        assert_eq!(client_address(&HeaderMap::new(), peer(), true), "192.0.2.10");
    }

    #[test]
    fn test_media_filename() {
        assert_eq!(
            media_filename(Platform::Youtube, Some("dQw4w9WgXcQ"), MediaKind::Audio),
            "youtube_dQw4w9WgXcQ.mp3"
        );
        assert_eq!(
            media_filename(Platform::Tiktok, Some("7234/x"), MediaKind::Video),
            "tiktok_7234_x.mp4"
        );

        let name = media_filename(Platform::Unknown, None, MediaKind::Video);
        let stem = name
            .strip_prefix("unknown_")
            .and_then(|s| s.strip_suffix(".mp4"))
            .unwrap();
        assert!(stem.parse::<i64>().unwrap() > 1_600_000_000);
    }
}
