//! Deterministic shard assignment.
//!
//! Every strategy is a pure function of the record and the worker count:
//! the same record always lands on the same shard across processes and
//! runs. The whole pipeline leans on that: it is the only thing that
//! guarantees no two reducer instances ever see the same key, which is
//! why the reducers need no coordination at all.

use std::io::{BufRead, Write};

use itertools::Itertools;

use crate::config::Config;
use crate::{ihash, Error, Record, Result};

/// Key byte offsets the positional strategy reads, and the divisor that
/// scales their concatenated decimal value into shard space.
const POSITIONS: [usize; 3] = [0, 5, 10];
const POSITION_SPAN: u64 = 1000;

/// Shard assignment strategies. All deterministic; they differ in what
/// they trade for it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    /// `ihash(key) % workers`. Near-uniform load for uniformly distributed
    /// keys; a skewed key distribution sharing a hash residue collapses
    /// onto one shard, which is accepted rather than guarded against.
    Hash,
    /// Rank of the key's first two lowercase letters within `aa..zz`,
    /// split into `workers` contiguous ranges of equal cardinality. Gives
    /// key-range locality (shard outputs concatenate into sorted order)
    /// at the cost of skew when key frequency is non-uniform.
    Range,
    /// Decimal number formed by the digit bytes at key offsets 0, 5 and
    /// 10, scaled into `[0, workers)`. For fixed-width synthetic keys.
    Positional,
}

/// Assigns records to shards. Construct once per stage from a validated
/// [`Config`]; holds no mutable state.
pub struct Partitioner {
    workers: u32,
    strategy: Strategy,
    normalize: bool,
    // Shard per prefix rank, aa..zz in lexicographic order. Only the
    // range strategy reads it.
    prefix_shards: Vec<u32>,
}

impl Partitioner {
    pub fn new(strategy: Strategy, normalize: bool, config: &Config) -> Self {
        let workers = config.workers();
        Self {
            workers,
            strategy,
            normalize,
            prefix_shards: prefix_table(workers),
        }
    }

    /// Assign `record` a shard in `[0, workers)`.
    ///
    /// Fails on records the strategy cannot read (key too short, byte
    /// outside the strategy's alphabet); malformed input is never routed
    /// to a default shard, that would mask corruption downstream.
    pub fn assign(&self, record: &Record) -> Result<u32> {
        match self.strategy {
            Strategy::Hash => {
                let shard = if self.normalize {
                    ihash(record.key.to_lowercase().as_bytes())
                } else {
                    ihash(record.key.as_bytes())
                };
                Ok(shard % self.workers)
            }
            Strategy::Range => self.assign_by_range(record),
            Strategy::Positional => self.assign_by_position(record),
        }
    }

    fn assign_by_range(&self, record: &Record) -> Result<u32> {
        let key = record.key.as_bytes();
        let prefix: [u8; 2] = match key {
            [a, b, ..] => [*a, *b],
            _ => return Err(malformed("key shorter than 2 bytes", record)),
        };
        if !prefix.iter().all(u8::is_ascii_lowercase) {
            return Err(malformed("key prefix outside a..z", record));
        }
        let rank = (prefix[0] - b'a') as usize * 26 + (prefix[1] - b'a') as usize;
        Ok(self.prefix_shards[rank])
    }

    fn assign_by_position(&self, record: &Record) -> Result<u32> {
        let key = record.key.as_bytes();
        let mut score: u64 = 0;
        for offset in POSITIONS {
            let byte = *key
                .get(offset)
                .ok_or_else(|| malformed("key shorter than byte offset 10", record))?;
            if !byte.is_ascii_digit() {
                return Err(malformed("non-digit at scored byte offset", record));
            }
            score = score * 10 + u64::from(byte - b'0');
        }
        // score < 1000, so this never reaches `workers`.
        Ok((score * u64::from(self.workers) / POSITION_SPAN) as u32)
    }

    #[inline]
    pub fn workers(&self) -> u32 {
        self.workers
    }
}

/// Shard per two-letter prefix rank: `workers` contiguous ranges of equal
/// cardinality over the 676-entry ordered prefix space, remainder clamped
/// onto the last shard.
fn prefix_table(workers: u32) -> Vec<u32> {
    let prefixes = ('a'..='z').cartesian_product('a'..='z');
    let range_size = (26 * 26 / workers).max(1);
    prefixes
        .enumerate()
        .map(|(rank, _)| (rank as u32 / range_size).min(workers - 1))
        .collect()
}

fn malformed(reason: &str, record: &Record) -> Error {
    Error::MalformedRecord {
        reason: reason.to_string(),
        line: record.to_line(),
    }
}

/// The partition stage: read records from `input`, write each back out
/// prefixed by its shard id. The record itself is echoed verbatim so the
/// downstream sort/group phase sees it unchanged.
pub fn run(input: impl BufRead, mut output: impl Write, partitioner: &Partitioner) -> Result<()> {
    let mut routed = 0u64;
    for line in input.lines() {
        let line = line?;
        let record = Record::parse(&line);
        let shard = partitioner.assign(&record)?;
        writeln!(output, "{shard}\t{line}")?;
        routed += 1;
    }
    tracing::debug!(routed, workers = partitioner.workers(), "partition stage done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partitioner(strategy: Strategy, workers: u32) -> Partitioner {
        let config = Config::new(workers).unwrap();
        Partitioner::new(strategy, false, &config)
    }

    fn key(k: &str) -> Record {
        Record::parse(k)
    }

    #[test]
    fn every_strategy_is_deterministic_and_in_range() {
        let records = [key("apple"), key("mango\tsweet"), key("12345678901")];
        for strategy in [Strategy::Hash, Strategy::Range, Strategy::Positional] {
            for workers in 1..=8 {
                let p = partitioner(strategy, workers);
                for record in &records {
                    let shard = match p.assign(record) {
                        Ok(shard) => shard,
                        // Range/positional reject some of these keys;
                        // rejection must be deterministic too.
                        Err(_) => {
                            assert!(p.assign(record).is_err());
                            continue;
                        }
                    };
                    assert_eq!(p.assign(record).unwrap(), shard);
                    assert!(shard < workers, "{strategy:?} {workers} {shard}");
                }
            }
        }
    }

    #[test]
    fn equal_keys_share_a_shard() {
        let p = partitioner(Strategy::Hash, 7);
        let a = p.assign(&Record::parse("apple\tone")).unwrap();
        let b = p.assign(&Record::parse("apple\ttwo")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn hash_assignment_is_stable_across_instances() {
        let first = partitioner(Strategy::Hash, 11).assign(&key("apple")).unwrap();
        let second = partitioner(Strategy::Hash, 11).assign(&key("apple")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn hash_normalization_folds_case() {
        let config = Config::new(11).unwrap();
        let p = Partitioner::new(Strategy::Hash, true, &config);
        assert_eq!(
            p.assign(&key("Apple")).unwrap(),
            p.assign(&key("apple")).unwrap()
        );
    }

    #[test]
    fn range_splits_the_prefix_space_evenly() {
        let p = partitioner(Strategy::Range, 2);
        // 676 prefixes, range size 338: "mz" is rank 337, "na" rank 338.
        assert_eq!(p.assign(&key("mzzzz")).unwrap(), 0);
        assert_eq!(p.assign(&key("naaaa")).unwrap(), 1);
        assert_eq!(p.assign(&key("aa")).unwrap(), 0);
        assert_eq!(p.assign(&key("zz")).unwrap(), 1);
    }

    #[test]
    fn range_clamps_the_remainder_onto_the_last_shard() {
        // 676 / 3 = 225, so ranks 675.. would compute shard 3 without the
        // clamp.
        let p = partitioner(Strategy::Range, 3);
        assert_eq!(p.assign(&key("zz")).unwrap(), 2);
    }

    #[test]
    fn range_preserves_key_order_across_shards() {
        let p = partitioner(Strategy::Range, 4);
        let mut last = 0;
        for k in ["ab", "ha", "mm", "sz", "zq"] {
            let shard = p.assign(&key(k)).unwrap();
            assert!(shard >= last, "{k} went backwards");
            last = shard;
        }
    }

    #[test]
    fn range_rejects_short_or_foreign_keys() {
        let p = partitioner(Strategy::Range, 2);
        assert!(matches!(
            p.assign(&key("a")),
            Err(Error::MalformedRecord { .. })
        ));
        assert!(matches!(
            p.assign(&key("A9key")),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn positional_scales_the_digit_score() {
        // Offsets 0, 5, 10 hold '1', '2', '3': score 123.
        let record = key("1abcd2efgh3");
        assert_eq!(
            partitioner(Strategy::Positional, 10).assign(&record).unwrap(),
            1
        );
        assert_eq!(
            partitioner(Strategy::Positional, 1000)
                .assign(&record)
                .unwrap(),
            123
        );
    }

    #[test]
    fn positional_rejects_short_or_non_digit_keys() {
        let p = partitioner(Strategy::Positional, 4);
        assert!(matches!(
            p.assign(&key("12345")),
            Err(Error::MalformedRecord { .. })
        ));
        assert!(matches!(
            p.assign(&key("1abcdXefgh3")),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn stage_echoes_records_after_the_shard_id() {
        let p = partitioner(Strategy::Hash, 1);
        let input = "apple\tred\nbanana\n";
        let mut output = Vec::new();
        run(input.as_bytes(), &mut output, &p).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "0\tapple\tred\n0\tbanana\n"
        );
    }

    #[test]
    fn stage_fails_fast_on_malformed_input() {
        let p = partitioner(Strategy::Positional, 4);
        let mut output = Vec::new();
        let err = run("short\n".as_bytes(), &mut output, &p).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
        assert!(output.is_empty());
    }
}
