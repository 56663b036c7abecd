//! Rendition selection
//!
//! When an upstream offers several renditions of the same media, pick the
//! one the user most likely wants: for video, muxed audio+video beats
//! video-only, and higher named quality wins within the same class.

use crate::platform::MediaKind;

/// One rendition offered by an upstream
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub url: String,
    pub quality: Option<String>,
    pub has_video: bool,
    pub has_audio: bool,
}

/// Named quality tiers, highest first
const RANK_TABLE: &[(&str, u32)] = &[
    ("2160p", 8),
    ("4k", 8),
    ("1440p", 7),
    ("1080p", 6),
    ("fullhd", 6),
    ("720p", 5),
    ("hd", 5),
    ("480p", 4),
    ("360p", 3),
    ("sd", 3),
    ("240p", 2),
    ("144p", 1),
];

/// Rank a quality label. Unranked or missing labels rank 0.
///
/// Accepts table names directly, bare heights (`1080`), heights with a
/// frame rate suffix (`1080p60`) and `WxH` resolutions (`1920x1080`).
pub fn quality_rank(label: Option<&str>) -> u32 {
    let Some(label) = label else {
        return 0;
    };
    let label = label.trim().to_lowercase();

    if let Some(rank) = lookup(&label) {
        return rank;
    }

    let height = match label.split_once('x') {
        Some((_, h)) => leading_digits(h),
        None => leading_digits(&label),
    };

    height
        .and_then(|h| lookup(&format!("{}p", h)))
        .unwrap_or(0)
}

fn lookup(label: &str) -> Option<u32> {
    RANK_TABLE
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, rank)| *rank)
}

fn leading_digits(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Preference between track layouts for a media kind
fn track_class(candidate: &Candidate, kind: MediaKind) -> u8 {
    match (kind, candidate.has_video, candidate.has_audio) {
        (MediaKind::Video, true, true) => 2,
        (MediaKind::Video, true, false) => 1,
        (MediaKind::Audio, false, true) => 2,
        (MediaKind::Audio, true, true) => 1,
        _ => 0,
    }
}

/// Pick the best candidate. Ties keep the earliest candidate.
pub fn select_best(candidates: &[Candidate], kind: MediaKind) -> Option<&Candidate> {
    let mut best: Option<(&Candidate, (u8, u32))> = None;

    for candidate in candidates {
        let key = (
            track_class(candidate, kind),
            quality_rank(candidate.quality.as_deref()),
        );
        match best {
            Some((_, best_key)) if key <= best_key => {}
            _ => best = Some((candidate, key)),
        }
    }

    best.map(|(candidate, _)| candidate)
}
