//! Manifest describing one conversion run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use crate::address::Family;
use crate::error::Result;
use crate::shard::{write_atomic, WrittenShard, MANIFEST_FILE};

/// Summary written as `manifest.json` at the root of a shard tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardManifest {
    pub family: Family,
    #[serde(with = "system_time_serde")]
    pub generated_at: Option<SystemTime>,
    /// Records written across all shards.
    pub records: usize,
    /// Lines dropped as malformed.
    pub dropped: usize,
    /// Record count per shard, keyed by relative artifact path.
    pub shards: BTreeMap<String, usize>,
}

mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => {
                let duration = t.duration_since(UNIX_EPOCH).unwrap_or_default();
                Some(duration.as_secs()).serialize(serializer)
            }
            None => None::<u64>.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(|s| UNIX_EPOCH + Duration::from_secs(s)))
    }
}

impl ShardManifest {
    /// Build a manifest stamped with the current time.
    pub fn now(family: Family, written: &[WrittenShard], dropped: usize) -> Self {
        let shards: BTreeMap<String, usize> = written
            .iter()
            .map(|s| (s.path.clone(), s.records))
            .collect();

        Self {
            family,
            generated_at: Some(SystemTime::now()),
            records: shards.values().sum(),
            dropped,
            shards,
        }
    }

    /// Load the manifest of the shard tree at `dir`.
    ///
    /// Returns `None` if the tree has no manifest.
    pub fn load(dir: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Save into the shard tree at `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        write_atomic(&dir.as_ref().join(MANIFEST_FILE), self)
    }
}
