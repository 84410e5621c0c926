//! Best-effort IP geolocation against shard trees.
//!
//! [`GeoLookup`] resolves an address by loading the one shard its high-order
//! bits select and binary searching it. Every failure (bad input, missing or
//! corrupt shard, storage error, exhausted budget) degrades to
//! [`Location::unknown`]; nothing is ever raised to the caller.
//!
//! # Example
//!
//! ```ignore
//! use geoshard::GeoLookup;
//! use std::time::Duration;
//!
//! let lookup = GeoLookup::open("ip2l", "ip2l6");
//! let location = lookup.lookup_within("1.0.0.84", Duration::from_millis(50));
//! println!("{:?}", location.country);
//! ```

mod cache;
mod source;

pub use cache::ShardCache;
pub use source::{DirSource, HttpSource, ShardSource};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::address::Address;
use crate::shard::{RangeRecord, Shard};
use crate::{Error, Result};

/// Default number of decoded shards kept per family.
const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Default time a decoded shard stays cached.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Location attributes of a resolved address. All `None` means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

impl Location {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.country.is_none() && self.region.is_none() && self.city.is_none()
    }
}

impl<A> From<&RangeRecord<A>> for Location {
    fn from(record: &RangeRecord<A>) -> Self {
        Self {
            country: record.country.clone(),
            region: record.region.clone(),
            city: record.city.clone(),
        }
    }
}

/// Configuration for [`GeoLookup`].
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Maximum decoded shards cached per family.
    pub cache_capacity: usize,
    /// How long a decoded shard stays valid.
    pub cache_ttl: Duration,
    /// Whether to cache decoded shards at all.
    pub cache_enabled: bool,
    /// Budget applied by [`GeoLookup::lookup`] and [`GeoLookup::lookup_ip`].
    pub default_budget: Option<Duration>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_enabled: true,
            default_budget: None,
        }
    }
}

impl LookupConfig {
    /// Create a new configuration with the specified cache capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache_capacity: capacity,
            ..Self::default()
        }
    }

    /// Create a configuration with caching disabled.
    pub fn no_cache() -> Self {
        Self {
            cache_capacity: 0,
            cache_enabled: false,
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.default_budget = Some(budget);
        self
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Maximum cached shards per family.
    pub capacity: usize,
    /// Currently cached shards across both families.
    pub len: usize,
    pub hits: u64,
    pub misses: u64,
    /// Lookups that degraded to unknown because of an error.
    pub failures: u64,
    /// Whether caching is enabled.
    pub enabled: bool,
}

/// Shard sources together with the caches filled from them.
///
/// Swapped as one unit on reload, so a lookup still holding the old
/// backend can only ever populate the old caches.
struct Backend {
    v4: Box<dyn ShardSource>,
    v6: Box<dyn ShardSource>,
    v4_cache: Option<ShardCache<u32>>,
    v6_cache: Option<ShardCache<u128>>,
}

impl Backend {
    fn new(v4: Box<dyn ShardSource>, v6: Box<dyn ShardSource>, config: &LookupConfig) -> Self {
        let (v4_cache, v6_cache) = if config.cache_enabled && config.cache_capacity > 0 {
            (
                Some(ShardCache::new(config.cache_capacity, config.cache_ttl)),
                Some(ShardCache::new(config.cache_capacity, config.cache_ttl)),
            )
        } else {
            (None, None)
        };

        Self {
            v4,
            v6,
            v4_cache,
            v6_cache,
        }
    }
}

/// Geolocation lookup over an IPv4 and an IPv6 shard tree.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct GeoLookup {
    backend: ArcSwap<Backend>,
    config: LookupConfig,
    failures: AtomicU64,
    generation: AtomicU64,
}

impl GeoLookup {
    /// Open shard trees in local directories with default configuration.
    pub fn open(v4_dir: impl AsRef<Path>, v6_dir: impl AsRef<Path>) -> Self {
        Self::with_sources(
            DirSource::new(v4_dir),
            DirSource::new(v6_dir),
            LookupConfig::default(),
        )
    }

    /// Create from arbitrary shard sources.
    pub fn with_sources(
        v4: impl ShardSource + 'static,
        v6: impl ShardSource + 'static,
        config: LookupConfig,
    ) -> Self {
        Self {
            backend: ArcSwap::from_pointee(Backend::new(Box::new(v4), Box::new(v6), &config)),
            config,
            failures: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Resolve a textual address using the configured default budget.
    pub fn lookup(&self, ip: &str) -> Location {
        match parse_query(ip) {
            Some(addr) => self.lookup_ip(addr),
            None => Location::unknown(),
        }
    }

    /// Resolve a parsed address using the configured default budget.
    pub fn lookup_ip(&self, ip: IpAddr) -> Location {
        let deadline = self.config.default_budget.map(|b| Instant::now() + b);
        self.resolve(ip, deadline)
    }

    /// Resolve a textual address, giving up once `budget` has elapsed.
    pub fn lookup_within(&self, ip: &str, budget: Duration) -> Location {
        let deadline = Instant::now() + budget;
        match parse_query(ip) {
            Some(addr) => self.resolve(addr, Some(deadline)),
            None => Location::unknown(),
        }
    }

    /// Fallible lookup core.
    ///
    /// `Ok(None)` means the address is not covered by its shard; a shard
    /// that does not exist is `Err(Error::ShardNotFound)`.
    pub fn try_lookup(&self, ip: IpAddr, deadline: Option<Instant>) -> Result<Option<Location>> {
        let backend = self.backend.load();
        match canonical(ip) {
            IpAddr::V4(v4) => find(
                backend.v4.as_ref(),
                backend.v4_cache.as_ref(),
                u32::from(v4),
                deadline,
            ),
            IpAddr::V6(v6) => find(
                backend.v6.as_ref(),
                backend.v6_cache.as_ref(),
                u128::from(v6),
                deadline,
            ),
        }
    }

    fn resolve(&self, ip: IpAddr, deadline: Option<Instant>) -> Location {
        match self.try_lookup(ip, deadline) {
            Ok(Some(location)) => location,
            Ok(None) => Location::unknown(),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                log::debug!("geo lookup for {} degraded to unknown: {}", ip, e);
                Location::unknown()
            }
        }
    }

    /// Swap in new shard sources, e.g. after a re-conversion.
    ///
    /// New lookups start with empty caches. In-flight lookups finish
    /// against the old sources and whatever they decode lands in the old
    /// caches, which are dropped with them. Hit and miss counters restart.
    pub fn reload(&self, v4: impl ShardSource + 'static, v6: impl ShardSource + 'static) {
        let description = format!("{} / {}", v4.describe(), v6.describe());
        self.backend
            .store(Arc::new(Backend::new(Box::new(v4), Box::new(v6), &self.config)));
        self.generation.fetch_add(1, Ordering::SeqCst);

        log::info!("reloaded shard sources from {}", description);
    }

    /// Clear both shard caches.
    pub fn clear_cache(&self) {
        let backend = self.backend.load();
        if let Some(ref cache) = backend.v4_cache {
            cache.clear();
        }
        if let Some(ref cache) = backend.v6_cache {
            cache.clear();
        }
    }

    /// Get cache statistics. Hits and misses count since the last reload.
    pub fn cache_stats(&self) -> CacheStats {
        let failures = self.failures.load(Ordering::Relaxed);
        let backend = self.backend.load();
        match (&backend.v4_cache, &backend.v6_cache) {
            (Some(v4), Some(v6)) => CacheStats {
                capacity: self.config.cache_capacity,
                len: v4.len() + v6.len(),
                hits: v4.hits() + v6.hits(),
                misses: v4.misses() + v6.misses(),
                failures,
                enabled: true,
            },
            _ => CacheStats {
                failures,
                ..CacheStats::default()
            },
        }
    }

    /// Get the current generation (incremented on each reload).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }
}

/// Parse a query address; surrounding whitespace is ignored.
fn parse_query(ip: &str) -> Option<IpAddr> {
    ip.trim().parse::<IpAddr>().ok()
}

/// IPv4-mapped IPv6 addresses are looked up in the IPv4 tree.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => ip,
        },
        v4 => v4,
    }
}

/// Time left before `deadline`, or `DeadlineExceeded` once it has passed.
fn remaining(deadline: Option<Instant>) -> Result<Option<Duration>> {
    match deadline {
        None => Ok(None),
        Some(deadline) => {
            let now = Instant::now();
            if now >= deadline {
                Err(Error::DeadlineExceeded)
            } else {
                Ok(Some(deadline - now))
            }
        }
    }
}

fn find<A: Address>(
    source: &dyn ShardSource,
    cache: Option<&ShardCache<A>>,
    addr: A,
    deadline: Option<Instant>,
) -> Result<Option<Location>> {
    let key = addr.shard_key();

    let shard = match cache.and_then(|c| c.get(&key)) {
        Some(shard) => shard,
        None => {
            let path = A::shard_path(key);
            let timeout = remaining(deadline)?;
            let data = source.fetch(&path, timeout)?;
            let shard = Arc::new(Shard::<A>::from_slice(&path, &data)?);
            if let Some(cache) = cache {
                cache.insert(key, Arc::clone(&shard));
            }
            shard
        }
    };

    remaining(deadline)?;
    Ok(shard.find(addr).map(Location::from))
}
