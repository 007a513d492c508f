//! Configuration Module
//!
//! Handles loading and managing cache and server configuration from
//! environment variables.

use std::env;
use std::str::FromStr;

use crate::cache::DEFAULT_COMPRESSION_THRESHOLD;

// == Cache Config ==
/// Options recognised by the cache itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries before LRU eviction triggers
    pub max_cache_size: usize,
    /// TTL applied to entries that don't specify one
    pub default_expiry_hours: u64,
    /// Compress payloads above `compression_threshold`
    pub enable_compression: bool,
    /// Maintain per-key hit counters
    pub enable_hit_tracking: bool,
    /// Size in bytes above which payloads are compressed
    pub compression_threshold: usize,
    /// Number of keys reported in `topHitKeys`
    pub top_hit_keys: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 1000,
            default_expiry_hours: 24,
            enable_compression: true,
            enable_hit_tracking: true,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            top_hit_keys: 10,
        }
    }
}

impl CacheConfig {
    /// Loads cache options from the environment.
    ///
    /// # Environment Variables
    /// - `MAX_CACHE_SIZE` - Maximum live entries (default: 1000)
    /// - `DEFAULT_EXPIRY_HOURS` - Default TTL in hours (default: 24)
    /// - `ENABLE_COMPRESSION` - Compress large payloads (default: true)
    /// - `ENABLE_HIT_TRACKING` - Per-key hit counters (default: true)
    /// - `COMPRESSION_THRESHOLD` - Compression threshold in bytes (default: 1024)
    /// - `TOP_HIT_KEYS` - Keys listed in stats (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_cache_size: env_parse("MAX_CACHE_SIZE", defaults.max_cache_size),
            default_expiry_hours: env_parse("DEFAULT_EXPIRY_HOURS", defaults.default_expiry_hours),
            enable_compression: env_flag("ENABLE_COMPRESSION", defaults.enable_compression),
            enable_hit_tracking: env_flag("ENABLE_HIT_TRACKING", defaults.enable_hit_tracking),
            compression_threshold: env_parse(
                "COMPRESSION_THRESHOLD",
                defaults.compression_threshold,
            ),
            top_hit_keys: env_parse("TOP_HIT_KEYS", defaults.top_hit_keys),
        }
    }
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache options
    pub cache: CacheConfig,
    /// HTTP server port
    pub server_port: u16,
    /// Expiry sweep interval in seconds, 0 disables the sweep
    pub sweep_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - Everything read by [`CacheConfig::from_env`]
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Expiry sweep frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        Self {
            cache: CacheConfig::from_env(),
            server_port: env_parse("SERVER_PORT", 3000),
            sweep_interval: env_parse("SWEEP_INTERVAL", 60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server_port: 3000,
            sweep_interval: 60,
        }
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
