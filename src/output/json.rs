//! JSON output formatting
//!
//! One document per run:
//!
//! ```json
//! {
//!   "timestamp": "2024-05-01T12:00:00.000+00:00",
//!   "run_id": "5f0c...",
//!   "config": { "block_size": 4194304, "file_size": 1073741824, ... },
//!   "results": [
//!     { "path": "/mnt/d1", "write_throughput": { "bytes_per_sec": 1, "human": "1 B/s" }, ... }
//!   ],
//!   "totals": { ... },
//!   "error": null
//! }
//! ```
//!
//! Throughputs of failed paths are `null`.

use crate::config::TestConfig;
use crate::coordinator::RunReport;
use crate::util::time::format_throughput;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

/// Throughput with bytes/sec and human-readable format
#[derive(Debug, Clone, Serialize)]
pub struct JsonThroughput {
    pub bytes_per_sec: u64,
    pub human: String,
}

impl JsonThroughput {
    pub fn new(bytes_per_sec: u64) -> Self {
        let human = format_throughput(bytes_per_sec);
        Self {
            bytes_per_sec,
            human,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonPathResult {
    pub path: PathBuf,
    pub write_throughput: Option<JsonThroughput>,
    pub read_throughput: Option<JsonThroughput>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonTotals {
    pub write_throughput: JsonThroughput,
    pub read_throughput: JsonThroughput,
}

/// Complete JSON report
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport<'a> {
    pub timestamp: String,
    pub run_id: &'a str,
    pub config: &'a TestConfig,
    pub results: Vec<JsonPathResult>,
    pub totals: JsonTotals,
    /// Cancellation or deadline error for the run as a whole
    pub error: Option<String>,
}

impl<'a> JsonReport<'a> {
    pub fn new(config: &'a TestConfig, report: &'a RunReport) -> Self {
        let results = report
            .results
            .iter()
            .map(|r| JsonPathResult {
                path: r.path().to_path_buf(),
                write_throughput: r.write_throughput().map(JsonThroughput::new),
                read_throughput: r.read_throughput().map(JsonThroughput::new),
                error: r.error().map(ToString::to_string),
            })
            .collect();

        Self {
            timestamp: chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, false),
            run_id: &report.run_id,
            config,
            results,
            totals: JsonTotals {
                write_throughput: JsonThroughput::new(report.totals.write),
                read_throughput: JsonThroughput::new(report.totals.read),
            },
            error: report.cancelled.as_ref().map(ToString::to_string),
        }
    }
}

/// Write the report as pretty-printed JSON followed by a newline
pub fn write_json_report(
    out: &mut impl Write,
    config: &TestConfig,
    report: &RunReport,
) -> crate::Result<()> {
    serde_json::to_writer_pretty(&mut *out, &JsonReport::new(config, report))?;
    writeln!(out)?;
    Ok(())
}
