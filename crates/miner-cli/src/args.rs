//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use miner_core::{SearchConfig, SearchMode};

/// Search a block template for a nonce meeting its proof-of-work target.
#[derive(Debug, Clone, Parser)]
#[command(name = "goblin-miner", version, about)]
pub struct Args {
    #[arg(env = "GOBLIN_MINER_TEMPLATE", help = "Path to a <BLOCK_TEMPLATE> JSON file.")]
    pub template: PathBuf,

    #[arg(
        long,
        env = "GOBLIN_MINER_START_NONCE",
        default_value_t = 0,
        help = "First <NONCE> to try."
    )]
    pub start_nonce: u32,

    #[arg(
        long,
        env = "GOBLIN_MINER_MODE",
        value_enum,
        default_value_t = Mode::Batched,
        help = "Search loop <MODE>."
    )]
    pub mode: Mode,

    #[arg(
        long,
        env = "GOBLIN_MINER_BATCH_SIZE",
        default_value_t = 1 << 20,
        help = "Nonces per <BATCH_SIZE> in batched mode."
    )]
    pub batch_size: u32,

    #[arg(
        long,
        env = "GOBLIN_MINER_MAX_BATCHES",
        default_value_t = 1000,
        help = "Give up after <MAX_BATCHES> batches."
    )]
    pub max_batches: u32,

    #[arg(
        long,
        env = "GOBLIN_MINER_REPORT_INTERVAL",
        default_value_t = 5,
        help = "Log progress every <SECONDS>. 0 disables reporting."
    )]
    pub report_interval: u64,

    #[arg(
        long,
        env = "GOBLIN_MINER_LOG_LEVEL",
        default_value = "info",
        help = "Log <FILTER>, e.g. `debug` or `miner_core=debug`."
    )]
    pub log_level: String,

    #[arg(
        long,
        env = "GOBLIN_MINER_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text,
        help = "Log <FORMAT>."
    )]
    pub log_format: LogFormat,

    #[arg(long, env = "GOBLIN_MINER_JSON", help = "Print the result as JSON.")]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// One nonce per iteration
    Direct,
    /// Fixed-size batches through the CPU batch hasher
    Batched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Args {
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            start_nonce: self.start_nonce,
            mode: match self.mode {
                Mode::Direct => SearchMode::Direct,
                Mode::Batched => SearchMode::Batched,
            },
            batch_size: self.batch_size,
            max_batches: self.max_batches,
            ..SearchConfig::default()
        }
    }

    /// Interval between status reports, if enabled.
    pub fn report_interval(&self) -> Option<Duration> {
        (self.report_interval > 0).then(|| Duration::from_secs(self.report_interval))
    }
}
