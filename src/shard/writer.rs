//! Shard tree writer.

use ahash::{AHashMap, AHashSet};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::format::{RangeRecord, MANIFEST_FILE};
use crate::address::{parse_octet, Address, Family};
use crate::{Error, Result};

/// One artifact written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenShard {
    /// Path relative to the family root, e.g. `1.json` or `32/1.json`.
    pub path: String,
    /// Number of records in the artifact.
    pub records: usize,
}

/// Accumulates records per shard key and writes the shard tree.
pub struct ShardWriter<A: Address> {
    shards: AHashMap<A::Key, Vec<RangeRecord<A>>>,
    records: usize,
}

impl<A: Address> Default for ShardWriter<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Address> ShardWriter<A> {
    pub fn new() -> Self {
        Self {
            shards: AHashMap::new(),
            records: 0,
        }
    }

    /// Add a record to the shard selected by its `start`.
    pub fn push(&mut self, record: RangeRecord<A>) {
        self.shards
            .entry(record.start.shard_key())
            .or_default()
            .push(record);
        self.records += 1;
    }

    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Sort every shard by `start` and return them ordered by key.
    pub fn into_sorted(self) -> Vec<(A::Key, Vec<RangeRecord<A>>)> {
        let mut shards: Vec<_> = self
            .shards
            .into_iter()
            .map(|(key, mut records)| {
                records.sort_by_key(|r| r.start);
                (key, records)
            })
            .collect();
        shards.sort_by_key(|(key, _)| *key);
        shards
    }

    /// Write every populated shard under `dir`.
    ///
    /// Each artifact is written to a temp file in its target directory and
    /// renamed into place. Unless `keep_stale` is set, shard artifacts left
    /// over from earlier runs whose key got no records this time are removed.
    /// A writer with no records never prunes.
    pub fn write_to(self, dir: &Path, keep_stale: bool) -> Result<Vec<WrittenShard>> {
        fs::create_dir_all(dir)?;

        let shards = self.into_sorted();
        let mut written = Vec::with_capacity(shards.len());
        let mut keys = AHashSet::with_capacity(shards.len());

        for (key, records) in shards {
            let rel = A::shard_path(key);
            write_atomic(&dir.join(&rel), &records)?;
            log::debug!("wrote shard {} ({} records)", rel, records.len());

            keys.insert(key);
            written.push(WrittenShard {
                path: rel,
                records: records.len(),
            });
        }

        if keys.is_empty() {
            log::warn!("no {} records to write, leaving {:?} untouched", A::FAMILY, dir);
        } else if !keep_stale {
            let removed = prune_stale::<A>(dir, &keys)?;
            if removed > 0 {
                log::info!("removed {} stale {} shards from {:?}", removed, A::FAMILY, dir);
            }
        }

        Ok(written)
    }
}

/// Serialize `value` as JSON into `path` via temp file and rename.
pub(crate) fn write_atomic<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Config(format!("no parent directory for {:?}", path)))?;
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut out, value)?;
        out.flush()?;
    }
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Remove shard artifacts under `dir` whose key is not in `keep`.
///
/// IPv6 key directories (`<b0>/`) left empty are removed too. Nothing else
/// in `dir` is touched.
fn prune_stale<A: Address>(dir: &Path, keep: &AHashSet<A::Key>) -> Result<usize> {
    let depth = match A::FAMILY {
        Family::V4 => 0,
        Family::V6 => 1,
    };
    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    collect_files(dir, "", depth, &mut files, &mut subdirs)?;

    let mut removed = 0;
    for (rel, path) in files {
        if rel == MANIFEST_FILE {
            continue;
        }
        match A::parse_shard_path(&rel) {
            Some(key) if !keep.contains(&key) => {
                fs::remove_file(&path)?;
                log::debug!("removed stale shard {}", rel);
                removed += 1;
            }
            _ => {}
        }
    }

    for subdir in subdirs {
        if fs::read_dir(&subdir)?.next().is_none() {
            fs::remove_dir(&subdir)?;
        }
    }

    Ok(removed)
}

fn collect_files(
    dir: &Path,
    prefix: &str,
    depth: usize,
    files: &mut Vec<(String, PathBuf)>,
    subdirs: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = match entry.file_name().into_string() {
            Ok(n) => n,
            Err(_) => continue,
        };
        let rel = format!("{}{}", prefix, name);
        let file_type = entry.file_type()?;

        if file_type.is_file() {
            files.push((rel, entry.path()));
        } else if file_type.is_dir() && depth > 0 && parse_octet(&name).is_some() {
            collect_files(&entry.path(), &format!("{}/", rel), depth - 1, files, subdirs)?;
            subdirs.push(entry.path());
        }
    }
    Ok(())
}
