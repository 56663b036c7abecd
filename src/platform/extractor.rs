//! Identifier extraction
//!
//! Each platform has an ordered list of patterns. The first pattern that
//! matches supplies the identifier through its first capture group.

use regex::Regex;
use std::sync::LazyLock;

use super::Platform;

const YOUTUBE_PATTERNS: &[&str] = &[
    r"youtu\.be/([A-Za-z0-9_-]{11})",
    r"[?&]v=([A-Za-z0-9_-]{11})",
    r"/shorts/([A-Za-z0-9_-]{11})",
    r"/embed/([A-Za-z0-9_-]{11})",
    r"/live/([A-Za-z0-9_-]{11})",
];

const INSTAGRAM_PATTERNS: &[&str] = &[
    r"/p/([A-Za-z0-9_-]+)",
    r"/reels?/([A-Za-z0-9_-]+)",
    r"/tv/([A-Za-z0-9_-]+)",
];

const TIKTOK_PATTERNS: &[&str] = &[r"/video/(\d+)", r"/photo/(\d+)"];

const FACEBOOK_PATTERNS: &[&str] = &[r"/videos/(\d+)", r"[?&]v=(\d+)", r"/reel/(\d+)"];

const TWITTER_PATTERNS: &[&str] = &[r"/status(?:es)?/(\d+)"];

struct PatternSet {
    youtube: Vec<Regex>,
    instagram: Vec<Regex>,
    tiktok: Vec<Regex>,
    facebook: Vec<Regex>,
    twitter: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("builtin identifier pattern must compile"))
        .collect()
}

static PATTERNS: LazyLock<PatternSet> = LazyLock::new(|| PatternSet {
    youtube: compile(YOUTUBE_PATTERNS),
    instagram: compile(INSTAGRAM_PATTERNS),
    tiktok: compile(TIKTOK_PATTERNS),
    facebook: compile(FACEBOOK_PATTERNS),
    twitter: compile(TWITTER_PATTERNS),
});

/// Extract the platform identifier from a link.
///
/// Returns `None` when nothing matches; whether that is fatal is up to the
/// backend that needs the identifier.
pub fn extract(url: &str, platform: Platform) -> Option<String> {
    let patterns: &[Regex] = match platform {
        Platform::Youtube | Platform::YoutubeMusic => &PATTERNS.youtube,
        Platform::Instagram => &PATTERNS.instagram,
        Platform::Tiktok => &PATTERNS.tiktok,
        Platform::Facebook => &PATTERNS.facebook,
        Platform::Twitter => &PATTERNS.twitter,
        Platform::Unknown => return None,
    };

    patterns
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
