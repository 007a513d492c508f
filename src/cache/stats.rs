//! Cache Statistics Module
//!
//! Lock-free counters for hits, misses, evictions and response time, plus
//! the snapshot shape reported to callers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

// == Stats Collector ==
/// Running counters updated on the request path.
///
/// Counters are independent relaxed atomics: a snapshot taken during
/// writes may mix values from slightly different moments.
#[derive(Debug, Default)]
pub struct StatsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    /// Sum of timed request durations in microseconds
    response_micros: AtomicU64,
    /// Number of timed requests
    timed_requests: AtomicU64,
}

impl StatsCollector {
    // == Constructor ==
    /// Creates a new collector with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        if count > 0 {
            self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    /// Adds one request's wall-clock time to the running average.
    pub fn record_response_time(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.response_micros.fetch_add(micros, Ordering::Relaxed);
        self.timed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits(), self.hits() + self.misses())
    }

    pub fn miss_rate(&self) -> f64 {
        ratio(self.misses(), self.hits() + self.misses())
    }

    /// Mean timed request duration in milliseconds.
    pub fn average_response_ms(&self) -> f64 {
        let count = self.timed_requests.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.response_micros.load(Ordering::Relaxed) as f64 / count as f64 / 1000.0
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.response_micros.store(0, Ordering::Relaxed);
        self.timed_requests.store(0, Ordering::Relaxed);
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

// == Stats Snapshot ==
/// Point-in-time view of cache health.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Entries currently stored, expired or not yet swept included
    pub total_entries: usize,
    pub hit_rate: f64,
    pub miss_rate: f64,
    /// Milliseconds
    pub average_response_time: f64,
    /// Bytes held by stored payloads
    pub memory_usage: usize,
    pub top_hit_keys: Vec<String>,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub max_cache_size: usize,
    pub compressed_entries: usize,
}
