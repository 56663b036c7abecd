//! Platform identification
//!
//! This module classifies submitted links by the social platform that hosts
//! them, and pulls platform-specific identifiers (video ids, shortcodes) out
//! of the link.

mod detector;
mod extractor;

pub use detector::detect;
pub use extractor::extract;

use serde::{Deserialize, Serialize};

/// Supported platforms
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Tiktok,
    Instagram,
    Facebook,
    Youtube,
    YoutubeMusic,
    Twitter,
    Unknown,
}

impl Platform {
    /// All known platforms, excluding `Unknown`
    pub const KNOWN: [Platform; 6] = [
        Platform::Tiktok,
        Platform::Instagram,
        Platform::Facebook,
        Platform::Youtube,
        Platform::YoutubeMusic,
        Platform::Twitter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Youtube => "youtube",
            Platform::YoutubeMusic => "youtube_music",
            Platform::Twitter => "twitter",
            Platform::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Platform::Unknown)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiktok" => Ok(Platform::Tiktok),
            "instagram" | "ig" => Ok(Platform::Instagram),
            "facebook" | "fb" => Ok(Platform::Facebook),
            "youtube" | "yt" => Ok(Platform::Youtube),
            "youtube_music" | "ytmusic" => Ok(Platform::YoutubeMusic),
            "twitter" | "x" => Ok(Platform::Twitter),
            "unknown" => Ok(Platform::Unknown),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

/// What the user wants out of a link
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// File extension used for derived filenames
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "video" | "mp4" => Ok(MediaKind::Video),
            "audio" | "mp3" => Ok(MediaKind::Audio),
            _ => Err(format!("Unknown media kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trips_through_str() {
        for platform in Platform::KNOWN {
            assert_eq!(platform.as_str().parse::<Platform>(), Ok(platform));
        }
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_serializes_snake_case() {
        let json = serde_json::to_string(&Platform::YoutubeMusic).unwrap();
        assert_eq!(json, "\"youtube_music\"");
    }

    #[test]
    fn test_media_kind_defaults_to_video() {
        assert_eq!(MediaKind::default(), MediaKind::Video);
        assert_eq!(MediaKind::Audio.extension(), "mp3");
    }
}
