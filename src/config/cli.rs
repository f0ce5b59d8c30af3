//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Log verbosity for the `dperf` crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// dperf - parallel drive throughput benchmark
///
/// Writes and reads back a file per IO slot on every PATH using direct IO,
/// then reports write and read throughput per drive and in total.
#[derive(Parser, Debug)]
#[command(name = "dperf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Mount points to test
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Size of each IO request (e.g. 4MiB, 1M, 512k) [default: 4MiB]
    #[arg(short = 'b', long = "blocksize", value_name = "SIZE", env = "DPERF_BLOCKSIZE")]
    pub block_size: Option<String>,

    /// Bytes written and read per IO slot (e.g. 1GiB, 100M) [default: 1GiB]
    #[arg(short = 'f', long = "filesize", value_name = "SIZE", env = "DPERF_FILESIZE")]
    pub file_size: Option<String>,

    /// Concurrent IO slots per drive [default: 4]
    #[arg(short = 'i', long = "ioperdrive", value_name = "N", env = "DPERF_IOPERDRIVE")]
    pub io_per_drive: Option<usize>,

    /// Test drives one at a time instead of all at once
    #[arg(long, env = "DPERF_SERIAL")]
    pub serial: bool,

    /// Skip the read test
    #[arg(long, env = "DPERF_WRITE_ONLY")]
    pub write_only: bool,

    /// Print per-drive results
    #[arg(short, long, env = "DPERF_VERBOSE")]
    pub verbose: bool,

    /// TOML file with test settings; command-line options take precedence
    #[arg(long, value_name = "FILE", env = "DPERF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Stop the run after this long (e.g. 90s, 5m, 1h)
    #[arg(long, value_name = "DURATION", env = "DPERF_TIMEOUT")]
    pub timeout: Option<String>,

    /// Print results as JSON
    #[arg(long, env = "DPERF_JSON")]
    pub json: bool,

    /// Disable the live progress display on stderr
    #[arg(long, env = "DPERF_NO_PROGRESS")]
    pub no_progress: bool,

    /// Log level (RUST_LOG overrides)
    #[arg(long, value_enum, default_value = "warn", env = "DPERF_LOG_LEVEL")]
    pub log_level: LogLevel,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments that clap cannot check on its own
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.io_per_drive == Some(0) {
            anyhow::bail!("ioperdrive must be at least 1");
        }
        Ok(())
    }
}
