//! Cache Module
//!
//! In-process knowledge-response caching with LRU eviction, TTL expiry,
//! transparent compression and single-flight loading.

mod compress;
mod entry;
mod expiry;
mod facade;
mod lru;
mod single_flight;
mod stats;
mod store;


// Re-export public types
pub use compress::{Compressor, Payload, DEFAULT_COMPRESSION_THRESHOLD};
pub use entry::{current_timestamp_ms, CacheEntry, EntryMetadata};
pub use expiry::{is_expired, ExpiryPolicy};
pub use facade::{KnowledgeCache, WarmEntry};
pub use lru::{Handle, RecencyIndex};
pub use single_flight::{Flight, Role, SingleFlight};
pub use stats::{StatsCollector, StatsSnapshot};
pub use store::{EntryStore, Lookup};
