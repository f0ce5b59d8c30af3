//! dperf - parallel drive throughput benchmark
//!
//! dperf measures the sequential write and read throughput of every drive
//! mounted at the given paths, bypassing the page cache with direct IO, so
//! that slow or failing drives stand out next to their peers.
//!
//! # Architecture
//!
//! - **Aligned direct IO**: page-aligned buffers, one-way fallback to buffered
//!   IO for unaligned tails or devices that reject `O_DIRECT`
//! - **Incompressible payload**: ChaCha20 keystream defeats compression and dedup
//! - **Concurrency**: N paths x M IO slots on scoped threads, with a per-path
//!   barrier between the write and read phases
//! - **Failure isolation**: a failing drive never aborts the others
//! - **Cancellation**: cooperative, checked at every chunk boundary
//! - **Pluggable backends**: Linux `O_DIRECT`, an unsupported sentinel, and an
//!   in-memory mock for tests

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod output;
pub mod stats;
pub mod target;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::TestConfig;
pub use coordinator::{DriveTestCoordinator, RunReport};
pub use engine::{select_backend, IOBackend};
pub use error::PerfError;
pub use stats::PathResult;

/// Result type used by the binary and configuration layer
pub type Result<T> = anyhow::Result<T>;
