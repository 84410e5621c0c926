//! CSV dump to shard tree conversion.
//!
//! The converter is a single pass over the input: every line is classified,
//! usable records are grouped per shard key in memory, and all shards are
//! written once the input is exhausted.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::address::Address;
use crate::csv::{classify_line, Line, RawRecord};
use crate::metadata::ShardManifest;
use crate::shard::{RangeRecord, ShardWriter, WrittenShard};
use crate::{Error, Result};

/// Options for a conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Root directory of the shard tree.
    pub output_dir: PathBuf,
    /// Leave shards from earlier runs in place even if their key is now empty.
    pub keep_stale: bool,
    /// Write `manifest.json` next to the shards.
    pub write_manifest: bool,
}

impl ConvertOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            keep_stale: false,
            write_manifest: true,
        }
    }

    pub fn keep_stale(mut self, keep: bool) -> Self {
        self.keep_stale = keep;
        self
    }

    pub fn write_manifest(mut self, write: bool) -> Self {
        self.write_manifest = write;
        self
    }
}

/// Line accounting for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertStats {
    /// Lines read, including skipped ones.
    pub lines: usize,
    /// Records accepted.
    pub records: usize,
    /// Blank and comment lines.
    pub skipped: usize,
    /// First line taken as a header.
    pub header: bool,
    /// Lines dropped for too few fields or unparseable addresses.
    pub dropped: usize,
}

/// Outcome of a conversion run.
#[derive(Debug, Clone)]
pub struct ConvertReport {
    pub stats: ConvertStats,
    pub shards: Vec<WrittenShard>,
}

/// Converts a CSV dump of one address family into a shard tree.
pub struct Converter<A: Address> {
    options: ConvertOptions,
    _family: PhantomData<A>,
}

/// IPv4 converter, keyed by first octet.
pub type V4Converter = Converter<u32>;

/// IPv6 converter, keyed by the top two bytes.
pub type V6Converter = Converter<u128>;

impl<A: Address> Converter<A> {
    /// Create a converter writing to `output_dir` with default options.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::with_options(ConvertOptions::new(output_dir))
    }

    pub fn with_options(options: ConvertOptions) -> Self {
        Self {
            options,
            _family: PhantomData,
        }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Parse every line of `reader` into a populated writer.
    ///
    /// Lines are decoded lossily so a stray non-UTF-8 byte only affects its
    /// own attributes.
    pub fn parse<R: Read>(&self, reader: R) -> Result<(ShardWriter<A>, ConvertStats)> {
        let mut reader = BufReader::new(reader);
        let mut writer = ShardWriter::new();
        let mut stats = ConvertStats::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let index = stats.lines;
            stats.lines += 1;

            let line = String::from_utf8_lossy(&buf);
            match classify_line(index, &line) {
                Line::Skip => stats.skipped += 1,
                Line::Header => stats.header = true,
                Line::Malformed => {
                    stats.dropped += 1;
                    log::debug!("line {}: too few fields, dropped", index + 1);
                }
                Line::Data(raw) => match parse_record::<A>(raw) {
                    Some(record) => {
                        writer.push(record);
                        stats.records += 1;
                    }
                    None if index == 0 => stats.header = true,
                    None => {
                        stats.dropped += 1;
                        log::debug!("line {}: unparseable address range, dropped", index + 1);
                    }
                },
            }
        }

        Ok((writer, stats))
    }

    /// Convert `reader` and write the shard tree.
    ///
    /// Input that yields no records is rejected before anything under the
    /// output directory is written or removed.
    pub fn convert<R: Read>(&self, reader: R) -> Result<ConvertReport> {
        let (writer, stats) = self.parse(reader)?;
        let dir = &self.options.output_dir;

        if stats.records == 0 {
            return Err(Error::Config(format!(
                "no {} records parsed from input ({} lines, {} dropped)",
                A::FAMILY,
                stats.lines,
                stats.dropped
            )));
        }

        let shards = writer.write_to(dir, self.options.keep_stale)?;
        if self.options.write_manifest {
            ShardManifest::now(A::FAMILY, &shards, stats.dropped).save(dir)?;
        }

        log::info!(
            "converted {} {} records into {} shards under {:?} ({} dropped)",
            stats.records,
            A::FAMILY,
            shards.len(),
            dir,
            stats.dropped
        );

        Ok(ConvertReport { stats, shards })
    }

    /// Convert a file; names ending in `.gz` are decompressed on the fly.
    pub fn convert_file(&self, path: &Path) -> Result<ConvertReport> {
        let file = File::open(path)?;
        if path.extension().map_or(false, |ext| ext == "gz") {
            self.convert(GzDecoder::new(file))
        } else {
            self.convert(file)
        }
    }
}

/// Turn a raw CSV row into a range record.
///
/// Returns `None` when either bound fails to parse or `end < start`.
pub fn parse_record<A: Address>(raw: RawRecord) -> Option<RangeRecord<A>> {
    let start = A::parse_source(&raw.start)?;
    let end = A::parse_source(&raw.end)?;
    if end < start {
        return None;
    }

    Some(RangeRecord {
        start,
        end,
        country: raw.country,
        region: raw.region,
        city: raw.city,
    })
}
