//! TTL-bounded cache of decoded shards.

use quick_cache::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::address::Address;
use crate::shard::Shard;

#[derive(Clone)]
struct Entry<A> {
    loaded_at: Instant,
    shard: Arc<Shard<A>>,
}

/// Decoded shards of one address family, keyed by shard key.
///
/// Concurrent misses on the same key each decode and insert; the last
/// insert wins. Readers never wait on another reader's fetch.
pub struct ShardCache<A: Address> {
    cache: Cache<A::Key, Entry<A>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<A: Address> ShardCache<A> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Cache::new(capacity),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a live entry. Expired entries count as a miss and stay in place
    /// until the caller's refreshed insert overwrites them.
    pub fn get(&self, key: &A::Key) -> Option<Arc<Shard<A>>> {
        match self.cache.get(key) {
            Some(entry) if entry.loaded_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.shard)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: A::Key, shard: Arc<Shard<A>>) {
        self.cache.insert(
            key,
            Entry {
                loaded_at: Instant::now(),
                shard,
            },
        );
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
