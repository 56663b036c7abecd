//! Extraction rules for loosely-shaped upstream responses
//!
//! Keyless and RapidAPI services answer with whatever JSON they like. The
//! rules below are tried in order against the payload; the first rule that
//! yields a media URL decides the result. New upstream shapes are handled by
//! adding a rule, not by touching the matching code.

use serde_json::Value;

use super::quality::{select_best, Candidate};
use super::result::{MediaResult, PickerItem, PickerType};
use crate::platform::MediaKind;

/// How the value found at a rule's pointer is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A string holding the media URL
    Direct,
    /// An array of renditions of one media; the best rendition is chosen
    Renditions,
    /// An array of distinct media items, all offered in a picker
    Carousel,
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractionRule {
    /// JSON pointer into the payload
    pub pointer: &'static str,
    pub shape: Shape,
    /// Restrict the rule to one media kind
    pub kind: Option<MediaKind>,
}

const fn rule(pointer: &'static str, shape: Shape) -> ExtractionRule {
    ExtractionRule {
        pointer,
        shape,
        kind: None,
    }
}

const fn rule_for(pointer: &'static str, shape: Shape, kind: MediaKind) -> ExtractionRule {
    ExtractionRule {
        pointer,
        shape,
        kind: Some(kind),
    }
}

/// Built-in rules, in priority order
pub const DEFAULT_RULES: &[ExtractionRule] = &[
    // Direct link fields
    rule("/download_url", Shape::Direct),
    rule("/url", Shape::Direct),
    rule("/link", Shape::Direct),
    rule_for("/data/music", Shape::Direct, MediaKind::Audio),
    rule_for("/data/hdplay", Shape::Direct, MediaKind::Video),
    rule_for("/data/play", Shape::Direct, MediaKind::Video),
    rule("/data/url", Shape::Direct),
    rule("/data/link", Shape::Direct),
    rule("/data/download_url", Shape::Direct),
    // Rendition lists
    rule("/links", Shape::Renditions),
    rule("/data/links", Shape::Renditions),
    rule("/formats", Shape::Renditions),
    rule("/data/formats", Shape::Renditions),
    rule("/medias", Shape::Renditions),
    rule("/data/medias", Shape::Renditions),
    rule("/media", Shape::Renditions),
    rule("/data/media", Shape::Renditions),
    // Carousels
    rule("/data/carousel", Shape::Carousel),
    rule("/carousel_media", Shape::Carousel),
    rule("/data/carousel_media", Shape::Carousel),
    rule("/data/items", Shape::Carousel),
    rule("/data/images", Shape::Carousel),
];

const URL_KEYS: &[&str] = &["url", "link", "download_url", "downloadUrl", "src", "href"];
const QUALITY_KEYS: &[&str] = &["quality", "qualityLabel", "resolution", "label", "format_note"];
const TYPE_KEYS: &[&str] = &["type", "media_type", "mediaType", "kind"];
const THUMBNAIL_KEYS: &[&str] = &["thumbnail", "thumb", "cover", "display_url", "preview"];
const AUDIO_FLAG_KEYS: &[&str] = &["audioAvailable", "hasAudio", "has_audio"];
const VIDEO_FLAG_KEYS: &[&str] = &["videoAvailable", "hasVideo", "has_video"];
/// Nested arrays that hold the actual media of a carousel item
const NESTED_MEDIA_KEYS: &[(&str, PickerType)] = &[
    ("video_versions", PickerType::Video),
    ("videos", PickerType::Video),
    ("resources", PickerType::Video),
    ("image_versions2/candidates", PickerType::Image),
    ("images", PickerType::Image),
];

/// Apply the rules in order; the first rule that produces media wins
pub fn apply_rules(payload: &Value, rules: &[ExtractionRule], kind: MediaKind) -> Option<MediaResult> {
    rules
        .iter()
        .filter(|rule| rule.kind.map_or(true, |k| k == kind))
        .find_map(|rule| {
            let value = payload.pointer(rule.pointer)?;
            match rule.shape {
                Shape::Direct => direct(value),
                Shape::Renditions => renditions(value, kind),
                Shape::Carousel => carousel(value),
            }
        })
}

/// Detect an explicit upstream failure: `error: true`, `error: "<msg>"`,
/// `success: false` or a `status` of `error`/`fail`/`failed`.
pub fn upstream_error(payload: &Value) -> Option<(String, Option<String>)> {
    let message = string_at(payload, &["message", "msg", "detail"]);

    match payload.get("error") {
        Some(Value::Bool(true)) => return Some(("upstream.error".to_string(), message)),
        Some(Value::String(s)) if !s.is_empty() => {
            return Some(("upstream.error".to_string(), Some(s.clone())))
        }
        Some(Value::Object(obj)) => {
            let code = obj
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("upstream.error")
                .to_string();
            let message = obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or(message);
            return Some((code, message));
        }
        _ => {}
    }

    if payload.get("success") == Some(&Value::Bool(false)) {
        return Some(("upstream.error".to_string(), message));
    }

    let status = payload.get("status").and_then(Value::as_str)?;
    match status.to_lowercase().as_str() {
        "error" | "fail" | "failed" => Some(("upstream.error".to_string(), message)),
        _ => None,
    }
}

fn direct(value: &Value) -> Option<MediaResult> {
    let url = value.as_str().filter(|s| is_http(s))?;
    Some(MediaResult::redirect(url, None))
}

fn renditions(value: &Value, kind: MediaKind) -> Option<MediaResult> {
    let entries = value.as_array()?;

    let items: Vec<(Candidate, PickerType, Option<String>)> = entries
        .iter()
        .filter_map(|entry| {
            let url = entry_url(entry)?;
            let type_str = string_at(entry, TYPE_KEYS).map(|s| s.to_lowercase());
            let item_type = type_str
                .as_deref()
                .map(PickerType::from_upstream)
                .unwrap_or(PickerType::Video);

            let (has_video, has_audio) = match item_type {
                PickerType::Audio => (false, true),
                PickerType::Image => (false, false),
                PickerType::Video => {
                    let video_only = type_str
                        .as_deref()
                        .map_or(false, |t| t.contains("video_only") || t.contains("video-only"));
                    let has_audio = bool_at(entry, AUDIO_FLAG_KEYS).unwrap_or(!video_only);
                    let has_video = bool_at(entry, VIDEO_FLAG_KEYS).unwrap_or(true);
                    (has_video, has_audio)
                }
            };

            let candidate = Candidate {
                url,
                quality: string_at(entry, QUALITY_KEYS),
                has_video,
                has_audio,
            };
            Some((candidate, item_type, string_at(entry, THUMBNAIL_KEYS)))
        })
        .collect();

    if items.is_empty() {
        return None;
    }

    // A list holding images is a set of distinct posts, not renditions
    if items.iter().any(|(_, t, _)| *t == PickerType::Image) {
        let picker = items
            .into_iter()
            .map(|(candidate, item_type, thumbnail)| PickerItem {
                url: candidate.url,
                item_type,
                quality: candidate.quality,
                thumbnail,
            })
            .collect();
        return MediaResult::picker(picker, None);
    }

    let candidates: Vec<Candidate> = items.into_iter().map(|(c, _, _)| c).collect();
    let best = select_best(&candidates, kind)?;
    Some(MediaResult::redirect(best.url.clone(), None))
}

fn carousel(value: &Value) -> Option<MediaResult> {
    let entries = value.as_array()?;

    let picker: Vec<PickerItem> = entries
        .iter()
        .filter_map(|entry| {
            let declared = string_at(entry, TYPE_KEYS).map(|t| PickerType::from_upstream(&t));

            let (url, nested_type) = match entry_url(entry) {
                Some(url) => (url, None),
                None => nested_media(entry)?,
            };

            Some(PickerItem {
                url,
                item_type: declared.or(nested_type).unwrap_or(PickerType::Image),
                quality: string_at(entry, QUALITY_KEYS),
                thumbnail: string_at(entry, THUMBNAIL_KEYS),
            })
        })
        .collect();

    MediaResult::picker(picker, None)
}

/// First media URL inside a known nested array of a carousel item
fn nested_media(entry: &Value) -> Option<(String, Option<PickerType>)> {
    NESTED_MEDIA_KEYS.iter().find_map(|(path, item_type)| {
        let pointer = format!("/{}", path);
        let first = entry.pointer(&pointer)?.as_array()?.first()?;
        Some((entry_url(first)?, Some(*item_type)))
    })
}

fn entry_url(entry: &Value) -> Option<String> {
    match entry {
        Value::String(s) if is_http(s) => Some(s.clone()),
        Value::Object(_) => string_at(entry, URL_KEYS).filter(|s| is_http(s)),
        _ => None,
    }
}

fn string_at(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn bool_at(value: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|key| value.get(*key).and_then(Value::as_bool))
}

fn is_http(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}
