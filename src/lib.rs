//! Filter stages for an externally-orchestrated batch pipeline.
//!
//! Each stage is a single-pass filter over line-oriented records: the
//! partitioner routes records to shards, the reducer folds contiguous
//! runs of identical keys into counts, and the verifier proves after the
//! fact that the sharded pipeline preserved every record exactly once.
//! Scheduling, process placement and parallelism belong to an external
//! orchestrator; nothing in this crate spawns or coordinates processes.

use std::hash::Hasher;

pub mod cmd;
pub mod config;
pub mod partition;
pub mod reduce;
pub mod verify;

/////////////////////////////////////////////////////////////////////////////
// Errors
/////////////////////////////////////////////////////////////////////////////

/// Failures a stage can hit before or while consuming its input.
///
/// Verification mismatches are deliberately *not* represented here: the
/// verifier reporting a broken pipeline is its normal mode of operation,
/// surfaced as a [`verify::Report`] value rather than an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or missing configuration, detected before any input is read.
    #[error("configuration error: {0}")]
    Config(String),

    /// A record the current strategy cannot interpret. Fatal at the point
    /// of encounter: skipping it would silently break the multiset
    /// invariant the verifier depends on.
    #[error("malformed record ({reason}): {line:?}")]
    MalformedRecord { reason: String, line: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/////////////////////////////////////////////////////////////////////////////
// Records
/////////////////////////////////////////////////////////////////////////////

/// A single line-protocol record: a key, and optionally a value after the
/// first tab. Key-only lines are plain word tokens; both shapes flow
/// through the partitioner unchanged.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Record {
    /// The key.
    pub key: String,
    /// The value, if the line carried one.
    pub value: Option<String>,
}

impl Record {
    /// Parse one line (without its trailing newline) into a record.
    ///
    /// Never fails: a line without a tab is a key-only record.
    pub fn parse(line: &str) -> Self {
        match line.split_once('\t') {
            Some((key, value)) => Self {
                key: key.to_string(),
                value: Some(value.to_string()),
            },
            None => Self {
                key: line.to_string(),
                value: None,
            },
        }
    }

    /// Get the key of this record.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serialize back into line-protocol form, without a trailing newline.
    pub fn to_line(&self) -> String {
        match &self.value {
            Some(value) => format!("{}\t{}", self.key, value),
            None => self.key.clone(),
        }
    }
}

/// Hashes an intermediate key. Compute a shard for a given key by
/// calculating `ihash(key) % workers`.
///
/// Uses FNV with a fixed zero key so that the assignment is stable across
/// processes and restarts; a language-default hasher would re-shard a
/// restarted pipeline and break key co-location.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::with_key(0);
    hasher.write(key);
    let value = hasher.finish() & 0x7fffffff;
    // Masked to 31 bits above, always fits.
    value as u32
}
