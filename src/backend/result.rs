//! Canonical result returned for every resolved link

use serde::{Deserialize, Serialize};

/// Normalized outcome of a resolution.
///
/// Exactly one of a direct url, a non-empty picker, or an error is carried.
/// Only built through the constructors below, never deserialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MediaResult {
    Redirect {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    Picker {
        picker: Vec<PickerItem>,
        #[serde(skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    Error {
        error: ErrorInfo,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickerType {
    Video,
    Audio,
    Image,
}

impl PickerType {
    /// Lenient mapping used for upstream `type` fields
    pub fn from_upstream(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "photo" | "image" | "img" | "jpg" | "jpeg" | "png" | "webp" => {
                PickerType::Image
            }
            "audio" | "mp3" | "m4a" => PickerType::Audio,
            _ => PickerType::Video,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickerItem {
    pub url: String,
    #[serde(rename = "type")]
    pub item_type: PickerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Raw upstream payload, kept for diagnosis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl MediaResult {
    pub fn redirect(url: impl Into<String>, filename: Option<String>) -> Self {
        MediaResult::Redirect {
            url: url.into(),
            filename,
        }
    }

    /// Build a picker result. An empty item list is not a valid picker and
    /// yields `None`.
    pub fn picker(items: Vec<PickerItem>, filename: Option<String>) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        Some(MediaResult::Picker {
            picker: items,
            filename,
        })
    }

    pub fn error(code: impl Into<String>, message: Option<String>) -> Self {
        MediaResult::Error {
            error: ErrorInfo {
                code: code.into(),
                message,
                context: None,
            },
        }
    }

    #[cfg(test)]
    pub fn is_error(&self) -> bool {
        matches!(self, MediaResult::Error { .. })
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            MediaResult::Redirect { filename, .. } | MediaResult::Picker { filename, .. } => {
                filename.as_deref()
            }
            MediaResult::Error { .. } => None,
        }
    }

    /// Set the filename if the backend did not provide one
    pub fn with_default_filename(mut self, default: impl FnOnce() -> String) -> Self {
        match &mut self {
            MediaResult::Redirect { filename, .. } | MediaResult::Picker { filename, .. } => {
                if filename.as_deref().map_or(true, str::is_empty) {
                    *filename = Some(default());
                }
            }
            MediaResult::Error { .. } => {}
        }
        self
    }
}
