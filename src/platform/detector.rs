//! Platform detection from submitted links
//!
//! Matches a link against an ordered table of domain fragments. The first
//! fragment contained in the lowercased link decides the platform.

use std::sync::LazyLock;

use super::Platform;

static DEFAULT_DETECTOR: LazyLock<PlatformDetector> = LazyLock::new(PlatformDetector::new);

/// Detect the platform of a link using the built-in domain table
pub fn detect(url: &str) -> Platform {
    DEFAULT_DETECTOR.detect(url)
}

/// Identifies platforms from link substrings
pub struct PlatformDetector {
    /// (fragment, platform), checked in order
    table: Vec<(String, Platform)>,
}

impl PlatformDetector {
    pub fn new() -> Self {
        let mut detector = Self { table: Vec::new() };
        detector.register_builtin_domains();
        detector
    }

    fn register_builtin_domains(&mut self) {
        let mappings = [
            // TikTok
            ("vm.tiktok.com", Platform::Tiktok),
            ("vt.tiktok.com", Platform::Tiktok),
            ("tiktok.com", Platform::Tiktok),
            // Instagram
            ("instagram.com", Platform::Instagram),
            ("instagr.am", Platform::Instagram),
            // Facebook
            ("facebook.com", Platform::Facebook),
            ("fb.watch", Platform::Facebook),
            ("fb.com", Platform::Facebook),
            // YouTube Music must come before YouTube
            ("music.youtube.com", Platform::YoutubeMusic),
            ("youtube.com", Platform::Youtube),
            ("youtu.be", Platform::Youtube),
            // Twitter / X
            ("twitter.com", Platform::Twitter),
            ("//x.com", Platform::Twitter),
            (".x.com", Platform::Twitter),
        ];

        for (fragment, platform) in mappings {
            self.register(fragment, platform);
        }
    }

    /// Classify a link. Unrecognized input yields `Platform::Unknown`.
    pub fn detect(&self, url: &str) -> Platform {
        let lowered = url.to_lowercase();

        self.table
            .iter()
            .find(|(fragment, _)| lowered.contains(fragment.as_str()))
            .map(|(_, platform)| *platform)
            .unwrap_or(Platform::Unknown)
    }

    /// Append a custom fragment; it is checked after every existing entry
    pub fn register(&mut self, fragment: &str, platform: Platform) {
        self.table.push((fragment.to_lowercase(), platform));
    }
}

impl Default for PlatformDetector {
    fn default() -> Self {
        Self::new()
    }
}
