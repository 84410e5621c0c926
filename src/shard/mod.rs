//! Sharded range storage.
//!
//! A shard tree is a directory of JSON artifacts, one per populated shard key:
//!
//! ```text
//! ip2l/                 ip2l6/
//! ├── 1.json            ├── 32/
//! ├── 2.json            │   ├── 1.json
//! ├── ...               │   └── 2.json
//! └── manifest.json     ├── 42/
//!                       │   └── 0.json
//!                       └── manifest.json
//! ```
//!
//! Records inside each artifact are sorted by `start`, so a lookup only
//! needs the one shard its address keys into and a binary search.

mod format;
mod reader;
mod writer;

pub use format::{RangeRecord, MANIFEST_FILE};
pub use reader::Shard;
pub use writer::{ShardWriter, WrittenShard};

pub(crate) use writer::write_atomic;
