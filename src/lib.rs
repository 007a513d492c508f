//! Knowledge Cache - in-process cache for knowledge-broker responses
//!
//! Bounded LRU storage with TTL expiry, transparent compression of large
//! payloads, single-flight loading and hit/miss statistics.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{KnowledgeCache, StatsSnapshot, WarmEntry};
pub use config::{CacheConfig, Config};
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;
