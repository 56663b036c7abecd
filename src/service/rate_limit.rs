//! Per-client daily download limits
//!
//! Counts successful downloads per client address and media kind for each
//! server-local calendar day. Checking never writes; the counter is bumped
//! only after a link was actually resolved.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::config::LimitSettings;
use crate::platform::MediaKind;

/// Identifies one counter row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub address: String,
    pub kind: MediaKind,
    pub day: NaiveDate,
}

/// Storage for download counters.
///
/// `increment` must be atomic per key: concurrent increments never lose
/// updates.
pub trait CounterStore: Send + Sync {
    /// Current count, zero for a key never seen
    fn count(&self, key: &CounterKey) -> Result<u32>;

    /// Add one and return the new count
    fn increment(&self, key: &CounterKey) -> Result<u32>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    settings: LimitSettings,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, settings: LimitSettings) -> Self {
        Self { store, settings }
    }

    pub fn limit_for(&self, kind: MediaKind) -> u32 {
        match kind {
            MediaKind::Video => self.settings.video_per_day,
            MediaKind::Audio => self.settings.audio_per_day,
        }
    }

    /// Check whether the client may download today
    pub fn check(&self, address: &str, kind: MediaKind) -> RateDecision {
        self.check_on(address, kind, today())
    }

    /// Record a successful download; returns what is left for today
    pub fn consume(&self, address: &str, kind: MediaKind) -> u32 {
        self.consume_on(address, kind, today())
    }

    /// Check and, when allowed, consume in one call
    #[cfg(test)]
    pub fn check_and_consume(&self, address: &str, kind: MediaKind) -> RateDecision {
        let day = today();
        let decision = self.check_on(address, kind, day);
        if !decision.allowed {
            return decision;
        }

        RateDecision {
            allowed: true,
            remaining: self.consume_on(address, kind, day),
        }
    }

    pub fn check_on(&self, address: &str, kind: MediaKind, day: NaiveDate) -> RateDecision {
        let limit = self.limit_for(kind);

        if !self.settings.enabled {
            return RateDecision {
                allowed: true,
                remaining: limit,
            };
        }

        let key = key(address, kind, day);
        match self.store.count(&key) {
            Ok(count) => RateDecision {
                allowed: count < limit,
                remaining: limit.saturating_sub(count),
            },
            Err(e) => {
                // Fail open: a broken counter store must not take downloads down
                warn!("Rate limit check failed for {}: {:#}", address, e);
                RateDecision {
                    allowed: true,
                    remaining: limit,
                }
            }
        }
    }

    pub fn consume_on(&self, address: &str, kind: MediaKind, day: NaiveDate) -> u32 {
        let limit = self.limit_for(kind);

        if !self.settings.enabled {
            return limit;
        }

        match self.store.increment(&key(address, kind, day)) {
            Ok(count) => limit.saturating_sub(count),
            Err(e) => {
                warn!("Failed to record download for {}: {:#}", address, e);
                limit
            }
        }
    }
}

fn key(address: &str, kind: MediaKind, day: NaiveDate) -> CounterKey {
    CounterKey {
        address: address.to_string(),
        kind,
        day,
    }
}

/// Server-local calendar day
fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
