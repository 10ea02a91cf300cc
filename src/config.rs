//! Stage configuration.
//!
//! The orchestrator hands every partitioner instance the reducer count
//! through the `REDUCERS` environment variable. It is read exactly once at
//! process start, validated into a [`Config`], and passed into component
//! constructors; no component reads the environment itself.

use crate::{Error, Result};

/// Environment variable naming the number of reducer shards.
pub const REDUCERS_VAR: &str = "REDUCERS";

/// Validated stage configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    workers: u32,
}

impl Config {
    /// Build a config with an explicit worker count.
    ///
    /// A zero count can route no record anywhere and is rejected up front.
    pub fn new(workers: u32) -> Result<Self> {
        if workers == 0 {
            return Err(Error::Config("worker count must be positive".into()));
        }
        Ok(Self { workers })
    }

    /// Read and validate the worker count from [`REDUCERS_VAR`].
    ///
    /// Absence or a non-integer value is fatal, not a recoverable default.
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var(REDUCERS_VAR)
            .map_err(|_| Error::Config(format!("{REDUCERS_VAR} is not set")))?;
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Result<Self> {
        let workers = raw
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::Config(format!("{REDUCERS_VAR} is not an integer: {raw:?}")))?;
        Self::new(workers)
    }

    /// Number of reducer shards; always positive.
    #[inline]
    pub fn workers(&self) -> u32 {
        self.workers
    }
}
