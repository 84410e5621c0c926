//! Decoded shard with range search.

use super::format::RangeRecord;
use crate::address::Address;
use crate::{Error, Result};

/// A decoded shard: records sorted by `start`, each `start <= end`.
#[derive(Debug, Clone)]
pub struct Shard<A> {
    records: Vec<RangeRecord<A>>,
}

impl<A: Address> Shard<A> {
    /// Decode a shard artifact.
    ///
    /// `path` is only used for error messages. Unsorted or inverted ranges
    /// make the whole shard corrupt; binary search over them would silently
    /// return wrong answers.
    pub fn from_slice(path: &str, data: &[u8]) -> Result<Self> {
        let records: Vec<RangeRecord<A>> =
            serde_json::from_slice(data).map_err(|e| Error::CorruptShard {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        for (i, record) in records.iter().enumerate() {
            if record.end < record.start {
                return Err(Error::CorruptShard {
                    path: path.to_string(),
                    reason: format!("record {} has end < start", i),
                });
            }
            if i > 0 && records[i - 1].start > record.start {
                return Err(Error::CorruptShard {
                    path: path.to_string(),
                    reason: format!("record {} out of order", i),
                });
            }
        }

        Ok(Self { records })
    }

    /// Build from records already sorted by `start`.
    pub fn from_sorted(records: Vec<RangeRecord<A>>) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].start <= w[1].start));
        Self { records }
    }

    /// Find the record whose `[start, end]` contains `addr`.
    pub fn find(&self, addr: A) -> Option<&RangeRecord<A>> {
        self.locate(addr).0.map(|idx| &self.records[idx])
    }

    /// Binary search returning the hit index and the number of probes.
    fn locate(&self, addr: A) -> (Option<usize>, u32) {
        // Half-open [low, high) so `high = mid - 1` never underflows.
        let mut low = 0usize;
        let mut high = self.records.len();
        let mut probes = 0u32;

        while low < high {
            let mid = low + (high - low) / 2;
            let record = &self.records[mid];
            probes += 1;

            if addr < record.start {
                high = mid;
            } else if addr > record.end {
                low = mid + 1;
            } else {
                return (Some(mid), probes);
            }
        }

        (None, probes)
    }

    pub fn records(&self) -> &[RangeRecord<A>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(start: u32, end: u32, city: &str) -> RangeRecord<u32> {
        RangeRecord {
            start,
            end,
            country: Some("US".to_string()),
            region: None,
            city: Some(city.to_string()),
        }
    }

    #[test]
    fn test_find_in_small_shard() {
        let shard = Shard::from_sorted(vec![
            record(10, 19, "a"),
            record(20, 29, "b"),
            record(40, 49, "c"),
        ]);

        assert_eq!(shard.find(10).unwrap().city.as_deref(), Some("a"));
        assert_eq!(shard.find(19).unwrap().city.as_deref(), Some("a"));
        assert_eq!(shard.find(25).unwrap().city.as_deref(), Some("b"));
        assert_eq!(shard.find(49).unwrap().city.as_deref(), Some("c"));
        assert!(shard.find(9).is_none());
        assert!(shard.find(30).is_none());
        assert!(shard.find(50).is_none());
    }

    #[test]
    fn test_find_in_empty_shard() {
        let shard: Shard<u32> = Shard::from_sorted(Vec::new());
        assert!(shard.is_empty());
        assert!(shard.find(0).is_none());
        assert!(shard.find(u32::MAX).is_none());
    }

    #[test]
    fn test_find_at_extremes() {
        let shard = Shard::from_sorted(vec![record(0, 0, "zero"), record(u32::MAX, u32::MAX, "max")]);
        assert_eq!(shard.find(0).unwrap().city.as_deref(), Some("zero"));
        assert_eq!(shard.find(u32::MAX).unwrap().city.as_deref(), Some("max"));
        assert!(shard.find(1).is_none());
    }

    #[test]
    fn test_locate_is_logarithmic() {
        let records: Vec<_> = (0..65_536u32)
            .map(|i| record(i * 4, i * 4 + 1, "x"))
            .collect();
        let shard = Shard::from_sorted(records);

        for addr in [0u32, 1, 2, 3, 131_072, 262_141, 262_142, 262_143] {
            let (hit, probes) = shard.locate(addr);
            assert!(probes <= 17, "addr {} took {} probes", addr, probes);
            match addr % 4 {
                0 | 1 => assert_eq!(hit, Some((addr / 4) as usize)),
                _ => assert_eq!(hit, None),
            }
        }
    }

    #[test]
    fn test_from_slice_accepts_sorted() {
        let data = br#"[{"s":1,"e":5,"c":"US","r":null,"ci":null},{"s":6,"e":9,"c":null,"r":null,"ci":"Oslo"}]"#;
        let shard: Shard<u32> = Shard::from_slice("1.json", data).unwrap();
        assert_eq!(shard.len(), 2);
        assert_eq!(shard.find(7).unwrap().city.as_deref(), Some("Oslo"));
    }

    #[test]
    fn test_from_slice_rejects_unsorted() {
        let data = br#"[{"s":6,"e":9},{"s":1,"e":5}]"#;
        let result: Result<Shard<u32>> = Shard::from_slice("1.json", data);
        assert!(matches!(result, Err(Error::CorruptShard { .. })));
    }

    #[test]
    fn test_from_slice_rejects_inverted_range() {
        let data = br#"[{"s":9,"e":5}]"#;
        let result: Result<Shard<u32>> = Shard::from_slice("1.json", data);
        assert!(matches!(result, Err(Error::CorruptShard { .. })));
    }

    #[test]
    fn test_from_slice_rejects_garbage() {
        let result: Result<Shard<u128>> = Shard::from_slice("32/1.json", b"not json");
        assert!(matches!(result, Err(Error::CorruptShard { .. })));
    }

    #[test]
    fn test_find_v6() {
        let base: u128 = 42540528726795050063891204319802818560;
        let shard = Shard::from_sorted(vec![RangeRecord {
            start: base,
            end: base + (1u128 << 80) - 1,
            country: Some("DE".to_string()),
            region: None,
            city: None,
        }]);
        assert!(shard.find(base + 12345).is_some());
        assert!(shard.find(base + (1u128 << 80)).is_none());
        assert!(shard.find(base - 1).is_none());
    }
}
