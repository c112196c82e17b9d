pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::app_config::SourceKind;

/// Capture lakehouse query history on a schedule into an append-only log.
///
/// Run exactly one `qhlog run` per log file: two writers on the same file
/// can interleave lines.
#[derive(Parser, Debug)]
#[command(name = "qhlog", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a config file (default: ./qhlog.toml, then the user config dir)
    #[arg(long, global = true, env = "QHLOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Capture log file (default: query_history_log.jsonl)
    #[arg(long, global = true, env = "QHLOG_LOG_PATH")]
    pub log_path: Option<PathBuf>,

    /// Diagnostics level: error, warn, info, debug, trace
    #[arg(long, global = true, env = "QHLOG_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Quiet mode: no banners or run summary, diagnostics at error level only
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the source on a fixed interval and append each poll to the log
    Run(RunArgs),

    /// Show captured queries
    Read {
        /// Only captures from the last H hours
        #[arg(long, default_value_t = 24, conflicts_with = "all")]
        hours: u64,
        /// Include every capture regardless of age
        #[arg(long)]
        all: bool,
        /// Case-insensitive text the query must contain
        #[arg(long)]
        search: Option<String>,
        /// Minimum CPU time in milliseconds
        #[arg(long)]
        min_cpu: Option<f64>,
        /// Show only the last N rows
        #[arg(long)]
        last: Option<usize>,
        /// Print rows as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Most frequent query patterns with CPU totals
    Summary {
        /// Only captures from the last H hours
        #[arg(long, default_value_t = 24, conflicts_with = "all")]
        hours: u64,
        /// Include every capture regardless of age
        #[arg(long)]
        all: bool,
        /// Number of patterns to show
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Show the state of the capture log
    Status,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Seconds between the start of two polls (default: 300)
    #[arg(long, env = "QHLOG_INTERVAL_SECS")]
    pub interval: Option<u64>,

    /// Maximum records per poll (default: 100)
    #[arg(long, env = "QHLOG_TOP_N")]
    pub top_n: Option<usize>,

    /// Where records come from (default: tds)
    #[arg(long, value_enum, env = "QHLOG_SOURCE")]
    pub source: Option<SourceKind>,

    /// SQL endpoint host[:port] for tds, gateway URL for http
    #[arg(long, env = "QHLOG_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Lakehouse (database) name sent with each query
    #[arg(long, env = "QHLOG_LAKEHOUSE")]
    pub lakehouse: Option<String>,

    /// JSON fixture for the file source
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Capture once and exit (for cron / Task Scheduler)
    #[arg(long, conflicts_with = "max_cycles")]
    pub once: bool,

    /// Stop after N polls
    #[arg(long)]
    pub max_cycles: Option<u64>,
}
