//! Measurement results
//!
//! - [`IOSlotOutcome`]: what one IO slot measured
//! - [`PathResult`]: the final, immutable result for one mount point
//! - [`progress`]: ephemeral progress events streamed while slots run
//! - [`aggregator`]: sorting and totals over a finished run
//!
//! All throughputs are whole bytes per second.

pub mod aggregator;
pub mod progress;

use crate::error::PerfError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

/// Phase of a slot's work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Write,
    Read,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Write => write!(f, "write"),
            Phase::Read => write!(f, "read"),
        }
    }
}

/// Measured throughput of one IO slot
#[derive(Debug, Clone, Default)]
pub struct IOSlotOutcome {
    pub slot: usize,
    pub write_throughput: u64,
    /// Zero when the read phase did not run (write-only, or write failed)
    pub read_throughput: u64,
    pub error: Option<PerfError>,
}

impl IOSlotOutcome {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            ..Self::default()
        }
    }
}

fn serialize_error<S: Serializer>(error: &Option<PerfError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

/// Final result for one path under test
///
/// When `error` is set both throughputs are unavailable: the accessors return
/// `None` whatever raw values were recorded, and totals skip the path.
#[derive(Debug, Clone, Serialize)]
pub struct PathResult {
    path: PathBuf,
    write_throughput: u64,
    read_throughput: u64,
    #[serde(serialize_with = "serialize_error")]
    error: Option<PerfError>,
}

impl PathResult {
    pub fn new(
        path: impl Into<PathBuf>,
        write_throughput: u64,
        read_throughput: u64,
        error: Option<PerfError>,
    ) -> Self {
        Self {
            path: path.into(),
            write_throughput,
            read_throughput,
            error,
        }
    }

    /// Successful result
    pub fn success(path: impl Into<PathBuf>, write_throughput: u64, read_throughput: u64) -> Self {
        Self::new(path, write_throughput, read_throughput, None)
    }

    /// Failed result; throughputs are unavailable
    pub fn failed(path: impl Into<PathBuf>, error: PerfError) -> Self {
        Self::new(path, 0, 0, Some(error))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_throughput(&self) -> Option<u64> {
        match self.error {
            Some(_) => None,
            None => Some(self.write_throughput),
        }
    }

    pub fn read_throughput(&self) -> Option<u64> {
        match self.error {
            Some(_) => None,
            None => Some(self.read_throughput),
        }
    }

    pub fn error(&self) -> Option<&PerfError> {
        self.error.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_exposes_throughputs() {
        let result = PathResult::success("/mnt/d1", 100, 200);
        assert!(result.is_ok());
        assert_eq!(result.write_throughput(), Some(100));
        assert_eq!(result.read_throughput(), Some(200));
        assert_eq!(result.path(), Path::new("/mnt/d1"));
    }

    #[test]
    fn test_error_hides_stale_throughputs() {
        let result = PathResult::new("/mnt/d1", 100, 200, Some(PerfError::Cancelled));
        assert!(!result.is_ok());
        assert_eq!(result.write_throughput(), None);
        assert_eq!(result.read_throughput(), None);
    }

    #[test]
    fn test_serialize_error_as_message() {
        let result = PathResult::failed("/mnt/d1", PerfError::NotImplemented);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"], "not implemented");
        assert_eq!(json["path"], "/mnt/d1");

        let ok = serde_json::to_value(PathResult::success("/mnt/d2", 1, 2)).unwrap();
        assert!(ok["error"].is_null());
        assert_eq!(ok["read_throughput"], 2);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Write.to_string(), "write");
        assert_eq!(Phase::Read.to_string(), "read");
    }
}
