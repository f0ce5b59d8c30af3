//! Logger setup for the `dperf` binary
//!
//! Logs go to stderr so that stdout carries only results (text tables or
//! JSON). `RUST_LOG` still overrides the level picked on the command line.

use env_logger::Builder;
use log::LevelFilter;
use std::sync::Once;

static INIT: Once = Once::new();

/// Install the global logger once; later calls are no-ops
pub fn initialize_logger(level: LevelFilter) {
    INIT.call_once_force(|_| {
        let mut builder = Builder::new();

        builder
            .filter_level(LevelFilter::Warn)
            .filter_module("dperf", level)
            .format_timestamp_millis()
            .target(env_logger::Target::Stderr)
            .parse_default_env();

        // Tests may have installed a logger already
        let _ = builder.try_init();
    });
}
