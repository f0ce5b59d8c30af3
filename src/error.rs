//! Error taxonomy for the benchmark core
//!
//! Errors fall into four groups:
//!
//! - **Configuration**: rejected before any IO is issued (`InvalidConfig`)
//! - **Per-slot IO**: open/read/write/sync failures, short transfers and size
//!   mismatches. These are scoped to one path and embedded in its `PathResult`.
//! - **Cancellation**: the shared signal was tripped or its deadline passed.
//! - **Platform**: the selected backend has no direct IO support.
//!
//! `PerfError` is `Clone` so the first error of a path can be stored in the
//! result and echoed in a progress event at the same time.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors produced by the benchmark core
#[derive(Debug, Clone, Error)]
pub enum PerfError {
    /// Block size, file size or concurrency violates the configuration invariants
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A syscall on a test file or run directory failed
    #[error("{op} failed on {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// The sink accepted fewer bytes than it was handed
    #[error("short transfer: expected {expected} bytes, got {actual}")]
    ShortTransfer { expected: usize, actual: usize },

    /// Total bytes moved does not match the requested size
    #[error("expected to transfer {expected} bytes, transferred {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// No direct IO backend exists for this platform
    #[error("not implemented")]
    NotImplemented,

    /// A slot thread panicked before reporting an outcome
    #[error("io slot {slot} panicked")]
    WorkerPanicked { slot: usize },
}

impl PerfError {
    /// Wrap an `io::Error` with the failing operation and path
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        PerfError::Io {
            op,
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// True for errors raised by the shared cancellation signal
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PerfError::Cancelled | PerfError::DeadlineExceeded)
    }
}
