//! Request DTOs for the cache administration API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::cache::WarmEntry;

/// Maximum accepted key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl_secs`: Optional TTL in seconds (uses the default expiry if absent)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.key)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

impl From<SetRequest> for WarmEntry<Value> {
    fn from(req: SetRequest) -> Self {
        WarmEntry {
            ttl: req.ttl(),
            key: req.key,
            value: req.value,
        }
    }
}

/// Request body for the WARM operation (POST /warm)
///
/// Entries are listed oldest first; when there are more than the cache
/// holds, the last ones win.
#[derive(Debug, Clone, Deserialize)]
pub struct WarmRequest {
    pub entries: Vec<SetRequest>,
}

impl WarmRequest {
    /// Returns the first validation error among the entries, if any.
    pub fn validate(&self) -> Option<String> {
        self.entries.iter().find_map(SetRequest::validate)
    }
}

fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    None
}
