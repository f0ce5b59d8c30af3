//! Drive test coordinator
//!
//! Fans one run out over every path and, within a path, over
//! `io_per_drive` concurrent IO slots:
//!
//! - **Parallel mode**: all paths start at once, so the run has
//!   `paths x io_per_drive` slots in flight.
//! - **Serial mode**: one path at a time; its slots still run concurrently.
//!
//! Within a path, every write slot is joined before any read slot starts. The
//! barrier is per path: a slow drive never holds back another drive's reads.
//!
//! A path's throughput is the sum of its slots' throughputs. The first slot
//! error (in wall-clock order) becomes the path's error and discards the other
//! slots' numbers; it never affects another path. Cancellation stops slots at
//! the next chunk boundary and is reported once for the whole run, alongside
//! whatever results were collected.
//!
//! # Example
//!
//! ```
//! use dperf::config::TestConfig;
//! use dperf::coordinator::DriveTestCoordinator;
//! use dperf::engine::mock::MockBackend;
//! use dperf::util::cancel::CancelSignal;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let config = TestConfig {
//!     block_size: 64 * 1024,
//!     file_size: 256 * 1024,
//!     io_per_drive: 2,
//!     ..TestConfig::default()
//! };
//! let coordinator = DriveTestCoordinator::new(config, Arc::new(MockBackend::new()))?;
//!
//! let paths = vec![PathBuf::from("/mnt/d1"), PathBuf::from("/mnt/d2")];
//! let report = coordinator.run(&paths, &CancelSignal::new(), None)?;
//!
//! assert_eq!(report.results.len(), 2);
//! assert!(report.cancelled.is_none());
//! assert!(report.results.iter().all(|r| r.is_ok()));
//! # Ok::<(), dperf::error::PerfError>(())
//! ```

use crate::config::TestConfig;
use crate::engine::IOBackend;
use crate::error::PerfError;
use crate::stats::aggregator::{ResultAggregator, Totals};
use crate::stats::progress::ProgressSink;
use crate::stats::{IOSlotOutcome, PathResult, Phase};
use crate::target::{generate_run_id, PathUnderTest};
use crate::util::cancel::CancelSignal;
use crate::worker::{IOWorker, SlotContext};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::thread;

/// Outcome of one invocation
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Identifier naming this run's temporary directories
    pub run_id: String,
    /// Per-path results, highest read throughput first
    pub results: Vec<PathResult>,
    /// Totals over the paths without an error
    pub totals: Totals,
    /// Set when the run was cancelled or hit its deadline
    pub cancelled: Option<PerfError>,
}

/// Runs the write/read test across paths
pub struct DriveTestCoordinator {
    config: TestConfig,
    backend: Arc<dyn IOBackend>,
}

impl DriveTestCoordinator {
    /// Validate `config` and bind it to a backend
    ///
    /// Configuration errors surface here, before any IO is issued.
    pub fn new(config: TestConfig, backend: Arc<dyn IOBackend>) -> Result<Self, PerfError> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Test every path and collect one result per path
    ///
    /// Returns `Err(NotImplemented)` without touching any path when the backend
    /// has no direct IO. Per-path failures never become an `Err`; they are
    /// embedded in the path's [`PathResult`]. The run directories are removed
    /// before this returns on every exit path.
    pub fn run(
        &self,
        paths: &[PathBuf],
        cancel: &CancelSignal,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<RunReport, PerfError> {
        if !self.backend.capabilities().direct_io {
            return Err(PerfError::NotImplemented);
        }

        let run_id = generate_run_id();
        info!(
            "Run {}: {} path(s), {}, {} backend",
            run_id,
            paths.len(),
            self.config,
            self.backend.name()
        );

        let ctx = SlotContext {
            config: &self.config,
            backend: self.backend.as_ref(),
            cancel,
            progress,
        };

        let results = if self.config.serial {
            self.run_serial(paths, &run_id, ctx)
        } else {
            self.run_parallel(paths, &run_id, ctx)
        };

        let cancelled = cancel.check().err();
        if let Some(ref e) = cancelled {
            info!("Run {} stopped early: {}", run_id, e);
        }

        let (results, totals) = ResultAggregator::new(results).into_parts();
        Ok(RunReport {
            run_id,
            results,
            totals,
            cancelled,
        })
    }

    fn run_serial(&self, paths: &[PathBuf], run_id: &str, ctx: SlotContext<'_>) -> Vec<PathResult> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            // Paths not yet started are left out once cancelled
            if ctx.cancel.is_cancelled() {
                break;
            }
            results.push(self.test_path(path, run_id, ctx));
        }
        results
    }

    fn run_parallel(&self, paths: &[PathBuf], run_id: &str, ctx: SlotContext<'_>) -> Vec<PathResult> {
        if ctx.cancel.is_cancelled() {
            return Vec::new();
        }

        thread::scope(|s| {
            let handles: Vec<_> = paths
                .iter()
                .map(|path| (path, s.spawn(move || self.test_path(path, run_id, ctx))))
                .collect();

            handles
                .into_iter()
                .map(|(path, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        PathResult::failed(path.as_path(), PerfError::WorkerPanicked { slot: 0 })
                    })
                })
                .collect()
        })
    }

    /// Run every slot of one path through the write phase, then the read phase
    fn test_path(&self, root: &Path, run_id: &str, ctx: SlotContext<'_>) -> PathResult {
        info!("Testing {}", root.display());

        let target = PathUnderTest::new(root, run_id, Arc::clone(&self.backend));
        let event_path: Arc<Path> = Arc::from(root);
        let first_error = OnceLock::new();

        let workers: Vec<IOWorker<'_>> = (0..self.config.io_per_drive)
            .map(|slot| IOWorker::new(slot, &target, Arc::clone(&event_path), ctx))
            .collect();

        let mut workers = run_phase(workers, Phase::Write, &first_error);
        if first_error.get().is_none() && !self.config.write_only {
            workers = run_phase(workers, Phase::Read, &first_error);
        }

        let outcomes: Vec<IOSlotOutcome> = workers.into_iter().map(IOWorker::finish).collect();
        drop(target);

        let result = match first_error.into_inner() {
            Some(error) => PathResult::failed(root, error),
            None => {
                let write = outcomes.iter().map(|o| o.write_throughput).sum();
                let read = outcomes.iter().map(|o| o.read_throughput).sum();
                PathResult::success(root, write, read)
            }
        };

        match result.error() {
            Some(e) => info!("{}: failed: {}", root.display(), e),
            None => debug!(
                "{}: write {} B/s, read {} B/s",
                root.display(),
                result.write_throughput().unwrap_or(0),
                result.read_throughput().unwrap_or(0)
            ),
        }
        result
    }
}

/// Run one phase on every slot concurrently and wait for all of them
///
/// The first error from any slot is stored in `first_error`. A slot whose
/// thread panicked is reported as `WorkerPanicked` and does not come back.
fn run_phase<'a>(
    workers: Vec<IOWorker<'a>>,
    phase: Phase,
    first_error: &OnceLock<PerfError>,
) -> Vec<IOWorker<'a>> {
    thread::scope(|s| {
        let handles: Vec<_> = workers
            .into_iter()
            .map(|mut worker| {
                let slot = worker.slot();
                let handle = s.spawn(move || {
                    let result = match phase {
                        Phase::Write => worker.write_phase(),
                        Phase::Read => worker.read_phase(),
                    };
                    if let Err(e) = result {
                        let _ = first_error.set(e);
                    }
                    worker
                });
                (slot, handle)
            })
            .collect();

        handles
            .into_iter()
            .filter_map(|(slot, handle)| match handle.join() {
                Ok(worker) => Some(worker),
                Err(_) => {
                    let _ = first_error.set(PerfError::WorkerPanicked { slot });
                    None
                }
            })
            .collect()
    })
}
