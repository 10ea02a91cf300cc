//! Multiset equivalence verification.
//!
//! The acceptance oracle for a finished pipeline run: recompute the
//! expected aggregate straight from the original input and compare it,
//! as an unordered multiset, against the concatenation of every shard
//! output file. Any record the pipeline dropped, duplicated or corrupted
//! shows up here. Runs only after all producers have terminated and
//! never mutates anything.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::Result;

/// How the expected side is derived from the original input.
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Word-count pipelines: aggregate the input into one `count\tkey`
    /// line per distinct key.
    Counts,
    /// Sort/identity pipelines: every original line is expected back
    /// exactly once.
    Identity,
}

/// Outcome of a verification run. Mismatches are results, not errors;
/// reporting a broken pipeline is this tool's job, not a crash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Pass,
    /// The two sides differ in size. Caught before any content
    /// comparison; loss and duplication are detectable from counts alone.
    CardinalityMismatch { expected: usize, actual: usize },
    /// Same size but, after sorting both sides, some position differs:
    /// a wrong count or a corrupted key/value.
    ContentMismatch { expected: String, actual: String },
}

impl Report {
    #[inline]
    pub fn passed(&self) -> bool {
        matches!(self, Report::Pass)
    }
}

/// Verify that the shard outputs under `output_dir` reconstitute the
/// original input at `reference` (a single file or a directory of input
/// fragments), under the given mode.
///
/// Sorting both sides on the full serialized line and comparing
/// element-wise is equivalent to multiset equality, needs no auxiliary
/// structure sized by key cardinality, and lets the cheap length check
/// run first.
pub fn verify(mode: Mode, reference: &Path, output_dir: &Path) -> Result<Report> {
    let input = collect_lines(reference)?;
    let mut expected = match mode {
        Mode::Counts => aggregate(&input),
        Mode::Identity => input,
    };
    let mut actual = collect_lines(output_dir)?;

    if expected.len() != actual.len() {
        tracing::error!(
            expected = expected.len(),
            actual = actual.len(),
            "cardinality mismatch"
        );
        return Ok(Report::CardinalityMismatch {
            expected: expected.len(),
            actual: actual.len(),
        });
    }

    expected.sort_unstable();
    actual.sort_unstable();
    for (want, got) in expected.into_iter().zip(actual) {
        if want != got {
            tracing::error!(expected = %want, actual = %got, "content mismatch");
            return Ok(Report::ContentMismatch {
                expected: want,
                actual: got,
            });
        }
    }
    Ok(Report::Pass)
}

/// One `count\tkey` line per distinct input line, matching the reduce
/// stage's output shape.
fn aggregate(lines: &[String]) -> Vec<String> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for line in lines {
        *counts.entry(line).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(key, count)| format!("{count}\t{key}"))
        .collect()
}

/// Every line of `path` if it is a file, or of each of its entries if it
/// is a directory. Enumeration is non-recursive; a nested directory is a
/// layout this tool does not accept and fails the run rather than being
/// skipped.
fn collect_lines(path: &Path) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    if path.is_dir() {
        for entry in fs::read_dir(path)? {
            read_into(&entry?.path(), &mut lines)?;
        }
    } else {
        read_into(path, &mut lines)?;
    }
    Ok(lines)
}

fn read_into(path: &Path, lines: &mut Vec<String>) -> Result<()> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        lines.push(line?);
    }
    Ok(())
}
