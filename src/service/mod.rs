//! Business logic services

pub mod rate_limit;
pub mod resolver;
pub mod usage;

pub use rate_limit::RateLimiter;
pub use resolver::{ResolveError, ResolverService};
pub use usage::{UsageEntry, UsageLogger, UsageStats, UsageStore};
