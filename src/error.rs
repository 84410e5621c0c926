//! Error types for geoshard.

use thiserror::Error;

/// Error type for geoshard operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shard or manifest JSON could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid IP address
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// No artifact exists for the requested shard
    #[error("shard not found: {0}")]
    ShardNotFound(String),

    /// Shard decoded but violates the sorted-range layout
    #[error("corrupt shard {path}: {reason}")]
    CorruptShard { path: String, reason: String },

    /// Remote shard fetch failed
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Lookup budget ran out
    #[error("lookup deadline exceeded")]
    DeadlineExceeded,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for geoshard operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        Error::Fetch(e.to_string())
    }
}
