//! Entry Store Module
//!
//! Bounded key → entry map. Entries live inside the recency arena and the
//! map holds their handles, so the two structures cannot drift apart.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::compress::Payload;
use crate::cache::expiry::is_expired;
use crate::cache::lru::{Handle, RecencyIndex};
use crate::cache::CacheEntry;

// == Lookup ==
/// Outcome of [`EntryStore::get`].
#[derive(Debug)]
pub enum Lookup<'a> {
    /// Live entry; already touched
    Hit(&'a CacheEntry),
    /// Entry was present but expired and has been removed
    Expired,
    Missing,
}

// == Entry Store ==
/// Capacity-bounded entry storage with LRU eviction.
#[derive(Debug)]
pub struct EntryStore {
    /// Key → arena handle
    index: HashMap<String, Handle>,
    /// Entries ordered by recency
    recency: RecencyIndex<CacheEntry>,
    /// Sum of `size_bytes` over all entries
    memory_bytes: usize,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Whether hits bump per-entry hit counters
    track_hits: bool,
}

impl EntryStore {
    // == Constructor ==
    /// Creates a store holding at most `max_entries` entries.
    pub fn new(max_entries: usize, track_hits: bool) -> Self {
        Self {
            index: HashMap::with_capacity(max_entries.min(4096)),
            recency: RecencyIndex::with_capacity(max_entries.min(4096)),
            memory_bytes: 0,
            max_entries,
            track_hits,
        }
    }

    // == Get ==
    /// Looks up a live entry and marks it most recently used.
    ///
    /// An expired entry is removed on this call and reported as
    /// [`Lookup::Expired`].
    pub fn get(&mut self, key: &str, now: u64) -> Lookup<'_> {
        let Some(&handle) = self.index.get(key) else {
            return Lookup::Missing;
        };

        let expired = self
            .recency
            .get(handle)
            .map_or(true, |entry| is_expired(entry, now));
        if expired {
            self.remove(key);
            return Lookup::Expired;
        }

        self.recency.touch(handle);
        let track_hits = self.track_hits;
        match self.recency.get_mut(handle) {
            Some(entry) => {
                entry.last_accessed_at = now;
                if track_hits {
                    entry.hit_count += 1;
                }
                Lookup::Hit(&*entry)
            }
            None => Lookup::Missing,
        }
    }

    // == Insert ==
    /// Inserts or replaces an entry.
    ///
    /// Replacing keeps the entry count unchanged. A new key at capacity
    /// first reclaims expired entries, then evicts live ones from the least
    /// recently used end. Returns the keys of evicted live entries.
    pub fn insert(&mut self, key: String, payload: Payload, ttl: Duration, now: u64) -> Vec<String> {
        let mut evicted = Vec::new();
        if self.max_entries == 0 {
            return evicted;
        }

        if let Some(&handle) = self.index.get(&key) {
            let entry = CacheEntry::new(key, payload, ttl, now);
            if let Some(slot) = self.recency.get_mut(handle) {
                self.memory_bytes = self.memory_bytes - slot.size_bytes + entry.size_bytes;
                *slot = entry;
            }
            self.recency.touch(handle);
            return evicted;
        }

        if self.index.len() >= self.max_entries {
            self.purge_expired(now);
        }
        while self.index.len() >= self.max_entries {
            match self.evict_lru() {
                Some(entry) => evicted.push(entry.key),
                None => break,
            }
        }

        let entry = CacheEntry::new(key.clone(), payload, ttl, now);
        self.memory_bytes += entry.size_bytes;
        let handle = self.recency.push_front(entry);
        self.index.insert(key, handle);

        debug_assert!(self.index.len() <= self.max_entries);
        debug_assert_eq!(self.index.len(), self.recency.len());
        evicted
    }

    // == Remove ==
    /// Removes an entry and its recency node together.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let handle = self.index.remove(key)?;
        let entry = self.recency.remove(handle)?;
        self.memory_bytes -= entry.size_bytes;
        Some(entry)
    }

    // == Evict LRU ==
    /// Removes the least recently used entry.
    pub fn evict_lru(&mut self) -> Option<CacheEntry> {
        let entry = self.recency.pop_back()?;
        self.index.remove(&entry.key);
        self.memory_bytes -= entry.size_bytes;
        Some(entry)
    }

    // == Purge Expired ==
    /// Removes every expired entry. Returns the number removed.
    pub fn purge_expired(&mut self, now: u64) -> usize {
        let expired_keys: Vec<String> = self
            .recency
            .iter()
            .filter(|entry| is_expired(entry, now))
            .map(|entry| entry.key.clone())
            .collect();

        for key in &expired_keys {
            self.remove(key);
        }
        expired_keys.len()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.index.clear();
        self.recency.clear();
        self.memory_bytes = 0;
    }

    // == Peek ==
    /// Returns an entry without touching recency, expired or not.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.index
            .get(key)
            .and_then(|&handle| self.recency.get(handle))
    }

    // == Top Hit Keys ==
    /// Up to `n` live keys with the highest hit counts.
    ///
    /// Ties go to the more recently used key. Keys that were never hit are
    /// not reported.
    pub fn top_hit_keys(&self, n: usize, now: u64) -> Vec<String> {
        let mut ranked: Vec<&CacheEntry> = self
            .recency
            .iter()
            .filter(|entry| entry.hit_count > 0 && !is_expired(entry, now))
            .collect();
        // Stable sort keeps recency order among equal counts.
        ranked.sort_by(|a, b| b.hit_count.cmp(&a.hit_count));
        ranked
            .into_iter()
            .take(n)
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.recency.iter().map(|entry| entry.key.clone()).collect()
    }

    pub fn compressed_count(&self) -> usize {
        self.recency.iter().filter(|entry| entry.compressed).count()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Entries not yet expired at `now`.
    pub fn live_len(&self, now: u64) -> usize {
        self.recency
            .iter()
            .filter(|entry| !is_expired(entry, now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn memory_usage(&self) -> usize {
        self.memory_bytes
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}
