//! Address families and their shard keying.
//!
//! IPv4 ranges are keyed by the first octet of `start` and stored flat as
//! `<octet>.json`. IPv6 ranges are keyed by the top two bytes and stored as
//! `<b0>/<b1>.json`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{self, Debug, Display};
use std::hash::Hash;
use std::net::Ipv4Addr;

/// Address family of a shard tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    V4,
    V6,
}

impl Family {
    /// Default output directory for this family.
    pub fn default_dir(&self) -> &'static str {
        match self {
            Family::V4 => "ip2l",
            Family::V6 => "ip2l6",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::V4 => "v4",
            Family::V6 => "v6",
        }
    }
}

impl Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An integer-encoded address that can be sharded.
pub trait Address:
    Copy + Ord + Hash + Debug + Display + Send + Sync + 'static
{
    /// Shard key derived from the high-order bits.
    type Key: Copy + Ord + Hash + Debug + Send + Sync + 'static;

    /// Representation of `s`/`e` inside a shard artifact.
    type Wire: Serialize + DeserializeOwned;

    const FAMILY: Family;

    /// Parse an address column from the source CSV.
    fn parse_source(s: &str) -> Option<Self>;

    fn shard_key(self) -> Self::Key;

    /// Artifact path of a shard relative to the family root, `/`-separated.
    fn shard_path(key: Self::Key) -> String;

    /// Inverse of [`Address::shard_path`]; `None` for anything else.
    fn parse_shard_path(path: &str) -> Option<Self::Key>;

    fn to_wire(self) -> Self::Wire;

    fn from_wire(wire: Self::Wire) -> Option<Self>;
}

impl Address for u32 {
    type Key = u8;
    type Wire = u32;

    const FAMILY: Family = Family::V4;

    fn parse_source(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.contains('.') {
            parse_dotted_quad(s)
        } else if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse::<u32>().ok()
        } else {
            None
        }
    }

    fn shard_key(self) -> u8 {
        ((self >> 24) & 0xFF) as u8
    }

    fn shard_path(key: u8) -> String {
        format!("{}.json", key)
    }

    fn parse_shard_path(path: &str) -> Option<u8> {
        parse_octet(path.strip_suffix(".json")?)
    }

    fn to_wire(self) -> u32 {
        self
    }

    fn from_wire(wire: u32) -> Option<Self> {
        Some(wire)
    }
}

impl Address for u128 {
    type Key = (u8, u8);
    type Wire = String;

    const FAMILY: Family = Family::V6;

    fn parse_source(s: &str) -> Option<Self> {
        parse_decimal_u128(s.trim())
    }

    fn shard_key(self) -> (u8, u8) {
        (((self >> 120) & 0xFF) as u8, ((self >> 112) & 0xFF) as u8)
    }

    fn shard_path((b0, b1): (u8, u8)) -> String {
        format!("{}/{}.json", b0, b1)
    }

    fn parse_shard_path(path: &str) -> Option<(u8, u8)> {
        let (dir, file) = path.split_once('/')?;
        let b0 = parse_octet(dir)?;
        let b1 = parse_octet(file.strip_suffix(".json")?)?;
        Some((b0, b1))
    }

    fn to_wire(self) -> String {
        self.to_string()
    }

    fn from_wire(wire: String) -> Option<Self> {
        parse_decimal_u128(&wire)
    }
}

/// Parse `a.b.c.d` with exactly four decimal components in `[0, 255]`.
pub fn parse_dotted_quad(s: &str) -> Option<u32> {
    let mut value: u32 = 0;
    let mut parts = 0;

    for part in s.split('.') {
        parts += 1;
        if parts > 4 {
            return None;
        }
        let octet = parse_octet(part)?;
        value = (value << 8) | octet as u32;
    }

    if parts == 4 {
        Some(value)
    } else {
        None
    }
}

/// Render a `u32` as dotted quad.
pub fn format_dotted_quad(value: u32) -> String {
    Ipv4Addr::from(value).to_string()
}

pub(crate) fn parse_octet(s: &str) -> Option<u8> {
    if s.is_empty() || s.len() > 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u8>().ok()
}

fn parse_decimal_u128(s: &str) -> Option<u128> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u128>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_v4_integer() {
        assert_eq!(u32::parse_source("16777216"), Some(16777216));
        assert_eq!(u32::parse_source("4294967295"), Some(u32::MAX));
        assert_eq!(u32::parse_source("4294967296"), None);
        assert_eq!(u32::parse_source("-1"), None);
        assert_eq!(u32::parse_source(""), None);
    }

    #[test]
    fn test_parse_v4_dotted_quad() {
        assert_eq!(u32::parse_source("1.0.0.0"), Some(16777216));
        assert_eq!(u32::parse_source("255.255.255.255"), Some(u32::MAX));
        assert_eq!(u32::parse_source("192.168.1.1"), Some(0xC0A80101));
    }

    #[test]
    fn test_parse_v4_rejects_bad_quads() {
        assert_eq!(parse_dotted_quad("1.2.3"), None);
        assert_eq!(parse_dotted_quad("1.2.3.4.5"), None);
        assert_eq!(parse_dotted_quad("1.2.3.256"), None);
        assert_eq!(parse_dotted_quad("1..3.4"), None);
        assert_eq!(parse_dotted_quad("1.2.3.x"), None);
        assert_eq!(parse_dotted_quad("1.2.3.+4"), None);
    }

    #[test]
    fn test_dotted_quad_roundtrip() {
        for quad in ["0.0.0.0", "1.0.0.0", "8.8.4.4", "10.20.30.40", "255.255.255.255"] {
            let encoded = parse_dotted_quad(quad).unwrap();
            assert_eq!(format_dotted_quad(encoded), quad);
        }
    }

    #[test]
    fn test_v4_shard_key() {
        assert_eq!(16777216u32.shard_key(), 1);
        assert_eq!(0xC0A80101u32.shard_key(), 192);
        assert_eq!(u32::MAX.shard_key(), 255);
        assert_eq!(u32::shard_path(1), "1.json");
        assert_eq!(u32::parse_shard_path("1.json"), Some(1));
        assert_eq!(u32::parse_shard_path("256.json"), None);
        assert_eq!(u32::parse_shard_path("manifest.json"), None);
        assert_eq!(u32::parse_shard_path("1.json.tmp"), None);
    }

    #[test]
    fn test_v6_shard_key() {
        let start = u128::parse_source("42540528726795050063891204319802818560").unwrap();
        let (b0, b1) = start.shard_key();
        assert_eq!(b0 as u128, (start >> 120) & 0xFF);
        assert_eq!(b1 as u128, (start >> 112) & 0xFF);
        // 2001::/32
        assert_eq!((b0, b1), (0x20, 0x01));
        assert_eq!(u128::shard_path((b0, b1)), "32/1.json");
        assert_eq!(u128::parse_shard_path("32/1.json"), Some((32, 1)));
        assert_eq!(u128::parse_shard_path("32.json"), None);
        assert_eq!(u128::parse_shard_path("300/1.json"), None);
    }

    #[test]
    fn test_v6_wire_is_exact_decimal() {
        let source = "42540528726795050063891204319802818560";
        let value = u128::parse_source(source).unwrap();
        assert_eq!(value.to_wire(), source);
        assert_eq!(u128::from_wire(source.to_string()), Some(value));
        assert_eq!(u128::parse_source(&u128::MAX.to_string()), Some(u128::MAX));
        assert_eq!(u128::parse_source("2001:db8::"), None);
        assert_eq!(u128::parse_source("1e30"), None);
    }
}
