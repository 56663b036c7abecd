//! Download usage logging and admin statistics
//!
//! Logging is best-effort telemetry: writes happen on a blocking task and
//! failures are only traced, never returned to the request that caused them.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Longest platform/format label stored
const MAX_LABEL_LEN: usize = 64;

/// Upper bound on entries returned by `recent`
pub const MAX_RECENT: usize = 50;

/// One logged download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub id: String,
    pub platform: String,
    pub format: String,
    pub created_at: DateTime<Utc>,
}

impl UsageEntry {
    pub fn new(platform: &str, format: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            platform: clean_label(platform),
            format: clean_label(format),
            created_at: Utc::now(),
        }
    }
}

fn clean_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "unknown".to_string();
    }
    trimmed.chars().take(MAX_LABEL_LEN).collect::<String>().to_lowercase()
}

/// Append-only storage for usage entries
pub trait UsageStore: Send + Sync {
    fn append(&self, entry: &UsageEntry) -> Result<()>;

    /// Newest entries first
    fn recent(&self, limit: usize) -> Result<Vec<UsageEntry>>;

    /// Every entry, oldest first
    fn all(&self) -> Result<Vec<UsageEntry>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformCount {
    pub platform: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    pub total: u64,
    pub today: u64,
    /// Histogram in first-seen order
    pub by_platform: Vec<PlatformCount>,
    pub top_platform: Option<String>,
}

/// Aggregate entries relative to `now`'s local calendar day
pub fn compute_stats(entries: &[UsageEntry], now: DateTime<Local>) -> UsageStats {
    let today = now.date_naive();
    let mut stats = UsageStats::default();

    for entry in entries {
        stats.total += 1;

        if entry.created_at.with_timezone(&Local).date_naive() == today {
            stats.today += 1;
        }

        match stats
            .by_platform
            .iter_mut()
            .find(|p| p.platform == entry.platform)
        {
            Some(bucket) => bucket.count += 1,
            None => stats.by_platform.push(PlatformCount {
                platform: entry.platform.clone(),
                count: 1,
            }),
        }
    }

    // Strictly greater keeps the earliest platform on ties
    let mut top: Option<&PlatformCount> = None;
    for bucket in &stats.by_platform {
        if top.map_or(true, |t| bucket.count > t.count) {
            top = Some(bucket);
        }
    }
    stats.top_platform = top.map(|t| t.platform.clone());

    stats
}

/// Usage logger; a logger without a store records nothing and reports
/// zeroed statistics
#[derive(Clone)]
pub struct UsageLogger {
    store: Option<Arc<dyn UsageStore>>,
}

impl UsageLogger {
    pub fn new(store: Option<Arc<dyn UsageStore>>) -> Self {
        Self { store }
    }

    pub fn disabled() -> Self {
        Self { store: None }
    }

    #[cfg(test)]
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Fire-and-forget append. The handle is only useful to tests.
    pub fn record(&self, platform: &str, format: &str) -> Option<JoinHandle<()>> {
        let store = self.store.clone()?;
        let entry = UsageEntry::new(platform, format);

        Some(tokio::task::spawn_blocking(move || {
            if let Err(e) = store.append(&entry) {
                warn!(
                    "Failed to log download ({} / {}): {:#}",
                    entry.platform, entry.format, e
                );
            }
        }))
    }

    /// Newest entries first, at most `MAX_RECENT`
    pub fn recent(&self, limit: usize) -> Result<Vec<UsageEntry>> {
        match self.store {
            Some(ref store) => store.recent(limit.min(MAX_RECENT)),
            None => Ok(Vec::new()),
        }
    }

    pub fn stats(&self) -> Result<UsageStats> {
        match self.store {
            Some(ref store) => Ok(compute_stats(&store.all()?, Local::now())),
            None => Ok(UsageStats::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{Duration, TimeZone};

    fn entry(platform: &str, created_at: DateTime<Utc>) -> UsageEntry {
        UsageEntry {
            id: uuid::Uuid::new_v4().to_string(),
            platform: platform.to_string(),
            format: "video".to_string(),
            created_at,
        }
    }

    struct BrokenStore;

    impl UsageStore for BrokenStore {
        fn append(&self, _entry: &UsageEntry) -> Result<()> {
            anyhow::bail!("database is locked")
        }

        fn recent(&self, _limit: usize) -> Result<Vec<UsageEntry>> {
            anyhow::bail!("database is locked")
        }

        fn all(&self) -> Result<Vec<UsageEntry>> {
            anyhow::bail!("database is locked")
        }
    }

    #[test]
    fn test_compute_stats() {
        let now = Local.with_ymd_and_hms(2026, 5, 10, 15, 0, 0).unwrap();
        let today = now.with_timezone(&Utc);
        let yesterday = today - Duration::days(1);

        let entries = vec![
            entry("tiktok", yesterday),
            entry("youtube", today),
            entry("youtube", today),
            entry("tiktok", today),
            entry("instagram", yesterday),
        ];

        let stats = compute_stats(&entries, now);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.today, 3);
        assert_eq!(
            stats.by_platform,
            vec![
                PlatformCount { platform: "tiktok".into(), count: 2 },
                PlatformCount { platform: "youtube".into(), count: 2 },
                PlatformCount { platform: "instagram".into(), count: 1 },
            ]
        );
        // tie between tiktok and youtube goes to the first seen
        assert_eq!(stats.top_platform.as_deref(), Some("tiktok"));
    }

    #[test]
    fn test_today_uses_local_midnight() {
        let now = Local.with_ymd_and_hms(2026, 5, 10, 0, 30, 0).unwrap();
        let just_after_midnight = Local.with_ymd_and_hms(2026, 5, 10, 0, 0, 1).unwrap();
        let just_before_midnight = Local.with_ymd_and_hms(2026, 5, 9, 23, 59, 59).unwrap();

        let entries = vec![
            entry("facebook", just_after_midnight.with_timezone(&Utc)),
            entry("facebook", just_before_midnight.with_timezone(&Utc)),
        ];

        assert_eq!(compute_stats(&entries, now).today, 1);
    }

    #[test]
    fn test_empty_stats() {
        let stats = compute_stats(&[], Local::now());
        assert_eq!(stats, UsageStats::default());
        assert_eq!(stats.top_platform, None);
    }

    #[test]
    fn test_entry_labels_are_cleaned() {
        let entry = UsageEntry::new("  TikTok ", "");
        assert_eq!(entry.platform, "tiktok");
        assert_eq!(entry.format, "unknown");
        assert_eq!(UsageEntry::new(&"x".repeat(500), "mp4").platform.len(), MAX_LABEL_LEN);
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let db = Database::in_memory().unwrap();
        let logger = UsageLogger::new(Some(Arc::new(db)));

        logger.record("youtube", "audio").unwrap().await.unwrap();
        logger.record("tiktok", "video").unwrap().await.unwrap();

        let recent = logger.recent(50).unwrap();
        assert_eq!(recent.len(), 2);

        let stats = logger.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.today, 2);
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let logger = UsageLogger::new(Some(Arc::new(BrokenStore)));
        // The task completes without panicking; the error is only traced
        logger.record("youtube", "video").unwrap().await.unwrap();
        assert!(logger.stats().is_err());
    }

    #[test]
    fn test_disabled_logger_reports_zeroes() {
        let logger = UsageLogger::disabled();
        assert!(!logger.is_enabled());
        assert!(logger.record("youtube", "video").is_none());
        assert!(logger.recent(50).unwrap().is_empty());
        assert_eq!(logger.stats().unwrap(), UsageStats::default());
    }
}
