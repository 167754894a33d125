//! Thread-safe key/value store for cached payloads
//!
//! Provides a `ConcurrentStore` backed by `DashMap`, so readers never block
//! each other and a writer only locks the shard that owns its key.

use dashmap::DashMap;

use crate::data::{CacheKey, Payload};

/// Storage operations the gateway needs from a cache
///
/// None of these operations fail. Absence is reported as `None`.
pub trait CacheStore: Send + Sync + 'static {
    /// Returns the payload stored under `key`, if any
    fn get(&self, key: &CacheKey) -> Option<Payload>;

    /// Inserts or overwrites the payload stored under `key`
    fn put(&self, key: CacheKey, value: Payload);

    /// Returns whether `key` currently has an entry
    ///
    /// Under concurrency this is a snapshot and may race with `put` or `clear`.
    fn contains_key(&self, key: &CacheKey) -> bool;

    /// Removes every entry
    fn clear(&self);

    /// Number of entries, for diagnostics only
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local concurrent map from cache key to payload
#[derive(Debug, Default)]
pub struct ConcurrentStore {
    entries: DashMap<CacheKey, Payload>,
}

impl ConcurrentStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for ConcurrentStore {
    fn get(&self, key: &CacheKey) -> Option<Payload> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: CacheKey, value: Payload) {
        self.entries.insert(key, value);
    }

    fn contains_key(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
