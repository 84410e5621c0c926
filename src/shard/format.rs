//! Shard artifact format.
//!
//! A shard is a JSON array of range records sorted by `s`:
//! ```text
//! [
//!   {"s": 16777216, "e": 16777471, "c": "US", "r": "California", "ci": "Los Angeles"},
//!   ...
//! ]
//! ```
//! IPv6 shards carry `s`/`e` as decimal strings so no consumer loses
//! precision on 128-bit values.

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::address::Address;

/// Name of the run manifest written next to the shards.
pub const MANIFEST_FILE: &str = "manifest.json";

/// An inclusive address range with its location attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRecord<A> {
    pub start: A,
    pub end: A,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

impl<A: Address> RangeRecord<A> {
    pub fn contains(&self, addr: A) -> bool {
        self.start <= addr && addr <= self.end
    }
}

#[derive(serde::Serialize)]
struct WireRef<'a, W> {
    s: W,
    e: W,
    c: Option<&'a str>,
    r: Option<&'a str>,
    ci: Option<&'a str>,
}

#[derive(serde::Deserialize)]
struct WireOwned<W> {
    s: W,
    e: W,
    #[serde(default)]
    c: Option<String>,
    #[serde(default)]
    r: Option<String>,
    #[serde(default)]
    ci: Option<String>,
}

impl<A: Address> Serialize for RangeRecord<A> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireRef {
            s: self.start.to_wire(),
            e: self.end.to_wire(),
            c: self.country.as_deref(),
            r: self.region.as_deref(),
            ci: self.city.as_deref(),
        }
        .serialize(serializer)
    }
}

impl<'de, A: Address> Deserialize<'de> for RangeRecord<A> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireOwned::<A::Wire>::deserialize(deserializer)?;
        let start = A::from_wire(wire.s).ok_or_else(|| de::Error::custom("invalid range start"))?;
        let end = A::from_wire(wire.e).ok_or_else(|| de::Error::custom("invalid range end"))?;

        Ok(Self {
            start,
            end,
            country: wire.c,
            region: wire.r,
            city: wire.ci,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v4_record_shape() {
        let record = RangeRecord {
            start: 16777216u32,
            end: 16777471u32,
            country: Some("US".to_string()),
            region: Some("California".to_string()),
            city: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"s": 16777216, "e": 16777471, "c": "US", "r": "California", "ci": null})
        );

        let back: RangeRecord<u32> = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_v6_record_uses_decimal_strings() {
        let start: u128 = 42540528726795050063891204319802818560;
        let record = RangeRecord {
            start,
            end: start + 0xFFFF,
            country: None,
            region: None,
            city: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""s":"42540528726795050063891204319802818560""#));

        let back: RangeRecord<u128> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.start, start);
        assert_eq!(back.end, start + 0xFFFF);
    }

    #[test]
    fn test_v6_record_rejects_numeric_start() {
        let result: Result<RangeRecord<u128>, _> =
            serde_json::from_str(r#"{"s": 1, "e": "2", "c": null, "r": null, "ci": null}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_attributes_default_to_none() {
        let record: RangeRecord<u32> = serde_json::from_str(r#"{"s": 1, "e": 2}"#).unwrap();
        assert_eq!(record.country, None);
        assert_eq!(record.city, None);
        assert!(record.contains(1));
        assert!(record.contains(2));
        assert!(!record.contains(3));
    }
}
