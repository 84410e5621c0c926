//! geoshard - Sharded IP-range geolocation.
//!
//! This crate turns flat CSV dumps of IP-range-to-location records into a
//! sharded on-disk format and answers "where is this address" queries
//! against it with a strict best-effort contract.
//!
//! # Features
//!
//! - **IPv4 and IPv6**: native `u32` / `u128` range arithmetic
//! - **Prefix sharding**: one artifact per first octet (IPv4) or per top two
//!   bytes (IPv6), so a lookup only ever decodes one small shard
//! - **Binary search**: O(log n) range lookup inside a shard
//! - **TTL cache**: decoded shards are cached per lookup instance
//! - **Best effort**: lookups never fail; errors and timeouts degrade to an
//!   all-`None` [`Location`]
//! - **Pluggable storage**: local directories or HTTP object storage
//!
//! # Converting
//!
//! ```ignore
//! use geoshard::converter::V4Converter;
//! use std::path::Path;
//!
//! let report = V4Converter::new("ip2l").convert_file(Path::new("ip2location.csv"))?;
//! for shard in &report.shards {
//!     println!("{}: {} records", shard.path, shard.records);
//! }
//! ```
//!
//! # Looking up
//!
//! ```ignore
//! use geoshard::GeoLookup;
//!
//! let lookup = GeoLookup::open("ip2l", "ip2l6");
//! let location = lookup.lookup("1.0.0.84");
//! assert_eq!(location.country.as_deref(), Some("US"));
//! ```
//!
//! # Shard layout
//!
//! - IPv4: `ip2l/<octet>.json`
//! - IPv6: `ip2l6/<b0>/<b1>.json`
//!
//! Each artifact is a JSON array of `{s, e, c, r, ci}` objects sorted by `s`.
//! IPv6 bounds are decimal strings.

mod error;
mod metadata;

pub mod address;
pub mod converter;
pub mod csv;
pub mod lookup;
pub mod shard;

// Re-export core types
pub use address::{Address, Family};
pub use error::{Error, Result};
pub use metadata::ShardManifest;

// Re-export conversion types
pub use converter::{ConvertOptions, ConvertReport, ConvertStats, Converter, V4Converter, V6Converter};

// Re-export lookup types
pub use lookup::{
    CacheStats, DirSource, GeoLookup, HttpSource, Location, LookupConfig, ShardSource,
};

// Re-export shard types for advanced usage
pub use shard::{RangeRecord, Shard, ShardWriter, WrittenShard};
