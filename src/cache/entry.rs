//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and
//! hit-count metadata.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::cache::compress::Payload;

// == Cache Entry ==
/// A single stored value plus the metadata used for expiry, eviction and
/// reporting.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Caller-supplied key, unique within the store
    pub key: String,
    /// Serialized value, raw or gzip-compressed
    pub payload: Vec<u8>,
    /// Whether `payload` must be decompressed before use
    pub compressed: bool,
    /// Length of `payload` as stored
    pub size_bytes: usize,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Last successful read (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Number of hits served from this entry
    pub hit_count: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry created at `now` that lives for `ttl`.
    pub fn new(key: String, payload: Payload, ttl: Duration, now: u64) -> Self {
        let size_bytes = payload.bytes.len();
        Self {
            key,
            payload: payload.bytes,
            compressed: payload.compressed,
            size_bytes,
            created_at: now,
            expires_at: now.saturating_add(duration_ms(ttl)),
            last_accessed_at: now,
            hit_count: 0,
        }
    }

    /// Snapshot of the entry's metadata without the payload.
    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            key: self.key.clone(),
            compressed: self.compressed,
            size_bytes: self.size_bytes,
            created_at: self.created_at,
            expires_at: self.expires_at,
            last_accessed_at: self.last_accessed_at,
            hit_count: self.hit_count,
        }
    }
}

// == Entry Metadata ==
/// Read-only view of an entry, returned by `peek`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryMetadata {
    pub key: String,
    pub compressed: bool,
    pub size_bytes: usize,
    pub created_at: u64,
    pub expires_at: u64,
    pub last_accessed_at: u64,
    pub hit_count: u64,
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as zero.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_ms)
        .unwrap_or(0)
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
