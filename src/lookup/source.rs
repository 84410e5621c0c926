//! Where shard artifacts are fetched from.

use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Upper bound on a single shard artifact fetched over HTTP.
const MAX_SHARD_BYTES: u64 = 64 * 1024 * 1024;

/// A read-only store of shard artifacts addressed by relative path.
pub trait ShardSource: Send + Sync {
    /// Fetch the raw bytes of `path` (e.g. `1.json`, `32/1.json`).
    ///
    /// `timeout` is the time left in the caller's budget, if any. A missing
    /// artifact must surface as [`Error::ShardNotFound`].
    fn fetch(&self, path: &str, timeout: Option<Duration>) -> Result<Vec<u8>>;

    /// Human readable location for logs.
    fn describe(&self) -> String;
}

/// Shards stored in a local directory tree.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ShardSource for DirSource {
    fn fetch(&self, path: &str, _timeout: Option<Duration>) -> Result<Vec<u8>> {
        match fs::read(self.root.join(path)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::ShardNotFound(path.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("{:?}", self.root)
    }
}

/// Shards served over HTTP, e.g. from an object storage bucket.
pub struct HttpSource {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpSource {
    /// Create a source for `base_url`; artifacts live at `<base_url>/<path>`.
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(5))
    }

    /// Create a source whose requests never exceed `timeout`.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    /// Full URL of an artifact.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl ShardSource for HttpSource {
    fn fetch(&self, path: &str, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let mut request = self.agent.get(&self.url_for(path));
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Err(Error::ShardNotFound(path.to_string())),
            Err(e) => return Err(e.into()),
        };

        let mut data = Vec::new();
        response
            .into_reader()
            .take(MAX_SHARD_BYTES)
            .read_to_end(&mut data)?;
        Ok(data)
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
