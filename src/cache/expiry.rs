//! Expiry Module
//!
//! Time-to-live policy. Expired entries are treated as absent; they are
//! removed lazily on access or eagerly by the sweep task.

use std::time::Duration;

use crate::cache::CacheEntry;

const SECS_PER_HOUR: u64 = 60 * 60;

// == Is Expired ==
/// An entry is expired once `now` reaches its expiration timestamp.
pub fn is_expired(entry: &CacheEntry, now: u64) -> bool {
    now >= entry.expires_at
}

// == Expiry Policy ==
/// Resolves the TTL applied to each write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    default_ttl: Duration,
}

impl ExpiryPolicy {
    pub fn new(default_ttl: Duration) -> Self {
        Self { default_ttl }
    }

    /// Policy whose default TTL is `hours` long. Zero hours expires
    /// entries immediately.
    pub fn from_hours(hours: u64) -> Self {
        Self::new(Duration::from_secs(hours.saturating_mul(SECS_PER_HOUR)))
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Per-entry override wins over the default.
    pub fn ttl_for(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or(self.default_ttl)
    }
}
