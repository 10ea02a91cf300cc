//! Sorted-run reduction.
//!
//! Folds each maximal contiguous run of identical keys into a single
//! `(key, count)` pair. Input must arrive grouped: the upstream partition
//! and sort/group phases put all occurrences of a key next to each other.
//! That is a caller precondition, not something this stage can detect; a
//! key reappearing non-contiguously simply produces split counts.

use std::io::{self, BufRead, Write};

use crate::Result;

/// Lazy run-length fold over a stream of lines.
///
/// A run is never flushed until a different key is observed or input
/// ends, so the output is restartable only at run boundaries and a
/// partial count is never emitted for a run that might continue. Empty
/// input yields nothing.
pub struct Runs<I> {
    lines: I,
    current: Option<(String, u64)>,
}

/// Fold contiguous runs of identical lines into `(line, run_length)`.
pub fn runs<I>(lines: I) -> Runs<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    Runs {
        lines,
        current: None,
    }
}

impl<I> Iterator for Runs<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = Result<(String, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next() {
                Some(Err(err)) => return Some(Err(err.into())),
                Some(Ok(line)) => match &mut self.current {
                    None => self.current = Some((line, 1)),
                    Some(run) if run.0 == line => run.1 += 1,
                    Some(run) => {
                        let finished = std::mem::replace(run, (line, 1));
                        return Some(Ok(finished));
                    }
                },
                // End of input: flush the final run, if any.
                None => return self.current.take().map(Ok),
            }
        }
    }
}

/// The reduce stage: one `count\tkey` line per run, in input order.
pub fn run(input: impl BufRead, mut output: impl Write) -> Result<()> {
    let mut emitted = 0u64;
    for item in runs(input.lines()) {
        let (key, count) = item?;
        writeln!(output, "{count}\t{key}")?;
        emitted += 1;
    }
    tracing::debug!(emitted, "reduce stage done");
    Ok(())
}
