use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelforge")]
#[command(author, version, about = "Queue-driven short video automation")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Produce and publish videos for pending queue items
    Run {
        /// Process every eligible item instead of one batch
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of items to process
        #[arg(long)]
        limit: Option<usize>,

        /// Also pick up items that previously failed
        #[arg(long)]
        retry_failed: bool,

        /// Keep scratch files from earlier runs
        #[arg(long)]
        keep_scratch: bool,

        /// Generate ideas first when the queue is running low
        #[arg(long)]
        replenish: bool,

        /// Show which items would be processed without touching them
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate new video ideas and append them to the queue
    Ideas {
        /// Number of ideas to request
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Show queue counts and the next pending items
    Status,

    /// Move items stuck in progress back to pending
    ResetStale,

    /// Validate configuration and credentials
    Validate,

    /// Check that required external tools are available
    CheckTools,

    /// Display version information
    Version,
}
