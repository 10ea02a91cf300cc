use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::partition::Strategy;
use crate::verify::Mode;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Route each stdin record to a shard, stdin to stdout
    Partition {
        /// Shard assignment strategy
        #[arg(short, long, value_enum, default_value = "hash")]
        strategy: Strategy,

        /// Lowercase keys before hashing (hash strategy only)
        #[arg(long)]
        normalize: bool,
    },

    /// Fold grouped stdin lines into run-length counts, stdin to stdout
    Reduce,

    /// Check shard outputs against the original input
    Check {
        /// How the expected aggregate is derived
        #[arg(short, long, value_enum, default_value = "counts")]
        mode: Mode,

        /// Original input: a single file or a directory of fragments
        input: PathBuf,

        /// Directory of shard output files
        output: PathBuf,
    },
}
