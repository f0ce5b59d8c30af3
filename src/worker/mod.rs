//! IO slot worker
//!
//! An [`IOWorker`] is one concurrent IO slot against one path. It writes a
//! file of `file_size` bytes filled with incompressible payload, then (unless
//! write-only) reads it back, timing each phase from open through close.
//!
//! # State machine
//!
//! ```text
//! Idle -> Writing -> WriteDone -> Reading -> ReadDone -> Complete
//!                 \-> WriteFailed          \-> ReadFailed -> Failed
//! ```
//!
//! The coordinator drives the phases separately so it can hold a barrier
//! between every slot's write and the first read on the same path. Any error
//! aborts the slot at once; nothing is retried and partially written data is
//! left for the run directory cleanup.

use crate::config::TestConfig;
use crate::engine::copy::{copy_aligned, Transfer};
use crate::engine::IOBackend;
use crate::error::PerfError;
use crate::stats::progress::{ProgressEvent, ProgressSink};
use crate::stats::{IOSlotOutcome, Phase};
use crate::target::PathUnderTest;
use crate::util::buffer::AlignedBuffer;
use crate::util::cancel::CancelSignal;
use crate::util::payload::PayloadSource;
use crate::util::time::throughput;
use log::debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Writing,
    WriteDone,
    WriteFailed,
    Reading,
    ReadDone,
    ReadFailed,
    Complete,
    Failed,
}

/// Shared, read-only context every slot of a run borrows
#[derive(Clone, Copy)]
pub struct SlotContext<'a> {
    pub config: &'a TestConfig,
    pub backend: &'a dyn IOBackend,
    pub cancel: &'a CancelSignal,
    pub progress: Option<&'a dyn ProgressSink>,
}

/// One IO slot: write then read one file
pub struct IOWorker<'a> {
    slot: usize,
    target: &'a PathUnderTest,
    /// Path reported in progress events
    path: Arc<Path>,
    ctx: SlotContext<'a>,
    buffer: AlignedBuffer,
    state: SlotState,
    outcome: IOSlotOutcome,
}

/// Emits progress events for one phase of one slot
struct PhaseReporter<'a> {
    sink: Option<&'a dyn ProgressSink>,
    path: Arc<Path>,
    slot: usize,
    phase: Phase,
    total: u64,
    started: Instant,
}

impl PhaseReporter<'_> {
    fn chunk(&self, done: u64) {
        self.emit(done, None);
    }

    fn failed(&self, done: u64, error: &PerfError) {
        self.emit(done, Some(error.clone()));
    }

    fn emit(&self, done: u64, error: Option<PerfError>) {
        if let Some(sink) = self.sink {
            sink.emit(ProgressEvent {
                path: Arc::clone(&self.path),
                phase: self.phase,
                slot: self.slot,
                bytes_processed: done,
                bytes_total: self.total,
                throughput: throughput(done, self.started.elapsed()),
                error,
            });
        }
    }
}

impl<'a> IOWorker<'a> {
    pub fn new(slot: usize, target: &'a PathUnderTest, path: Arc<Path>, ctx: SlotContext<'a>) -> Self {
        Self {
            slot,
            target,
            path,
            buffer: AlignedBuffer::block(ctx.config.block_len()),
            ctx,
            state: SlotState::Idle,
            outcome: IOSlotOutcome::new(slot),
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    fn reporter(&self, phase: Phase, started: Instant) -> PhaseReporter<'a> {
        PhaseReporter {
            sink: self.ctx.progress,
            path: Arc::clone(&self.path),
            slot: self.slot,
            phase,
            total: self.ctx.config.file_size,
            started,
        }
    }

    /// Write the slot's file and record the write throughput
    ///
    /// The file is always synced before it is closed, and a sync failure fails
    /// the phase. Elapsed time covers open, transfer and sync.
    pub fn write_phase(&mut self) -> Result<u64, PerfError> {
        debug_assert_eq!(self.state, SlotState::Idle);
        self.state = SlotState::Writing;

        match self.write_file() {
            Ok(rate) => {
                self.outcome.write_throughput = rate;
                self.state = SlotState::WriteDone;
                Ok(rate)
            }
            Err(e) => {
                self.outcome.error = Some(e.clone());
                self.state = SlotState::WriteFailed;
                Err(e)
            }
        }
    }

    /// Read the slot's file back and record the read throughput
    pub fn read_phase(&mut self) -> Result<u64, PerfError> {
        debug_assert_eq!(self.state, SlotState::WriteDone);
        self.state = SlotState::Reading;

        match self.read_file() {
            Ok(rate) => {
                self.outcome.read_throughput = rate;
                self.state = SlotState::ReadDone;
                Ok(rate)
            }
            Err(e) => {
                self.outcome.error = Some(e.clone());
                self.state = SlotState::ReadFailed;
                Err(e)
            }
        }
    }

    fn write_file(&mut self) -> Result<u64, PerfError> {
        self.ctx.cancel.check()?;
        self.target.ensure_run_dir()?;

        let file_path = self.target.slot_file(self.slot);
        let total = self.ctx.config.file_size;
        let started = Instant::now();
        let reporter = self.reporter(Phase::Write, started);
        let mut done = 0u64;

        let result = (|| -> Result<u64, PerfError> {
            let mut file = self
                .ctx
                .backend
                .open_write(&file_path)
                .map_err(|e| PerfError::io("open", &file_path, e))?;
            let mut source = PayloadSource::new(self.ctx.cancel.clone());

            let copied = copy_aligned(
                file.as_mut(),
                &file_path,
                Transfer::ToFile(&mut source),
                &mut self.buffer,
                total,
                self.ctx.cancel,
                |n| {
                    done = n;
                    reporter.chunk(n);
                },
            );
            let synced = file
                .sync_data()
                .map_err(|e| PerfError::io("fdatasync", &file_path, e));
            drop(file);

            let copied = copied?;
            synced?;
            Ok(copied)
        })();

        self.finish_phase(&reporter, result, done, started)
    }

    fn read_file(&mut self) -> Result<u64, PerfError> {
        self.ctx.cancel.check()?;

        let file_path = self.target.slot_file(self.slot);
        let total = self.ctx.config.file_size;
        let started = Instant::now();
        let reporter = self.reporter(Phase::Read, started);
        let mut done = 0u64;

        let result = (|| -> Result<u64, PerfError> {
            let mut file = self
                .ctx
                .backend
                .open_read(&file_path, total)
                .map_err(|e| PerfError::io("open", &file_path, e))?;

            let copied = copy_aligned(
                file.as_mut(),
                &file_path,
                Transfer::FromFile,
                &mut self.buffer,
                total,
                self.ctx.cancel,
                |n| {
                    done = n;
                    reporter.chunk(n);
                },
            )?;

            // Keep back-to-back runs from reading cache-warmed pages
            if let Err(e) = file.drop_cache() {
                debug!("{}: page cache drop ignored: {}", file_path.display(), e);
            }
            Ok(copied)
        })();

        self.finish_phase(&reporter, result, done, started)
    }

    fn finish_phase(
        &self,
        reporter: &PhaseReporter<'_>,
        result: Result<u64, PerfError>,
        done: u64,
        started: Instant,
    ) -> Result<u64, PerfError> {
        let elapsed = started.elapsed();
        match result {
            Ok(bytes) => {
                let rate = throughput(bytes, elapsed);
                debug!(
                    "{} slot {}: {} {} bytes in {:?}",
                    self.path.display(),
                    self.slot,
                    reporter.phase,
                    bytes,
                    elapsed
                );
                Ok(rate)
            }
            Err(e) => {
                debug!(
                    "{} slot {}: {} failed after {} bytes: {}",
                    self.path.display(),
                    self.slot,
                    reporter.phase,
                    done,
                    e
                );
                reporter.failed(done, &e);
                Err(e)
            }
        }
    }

    /// Move to a terminal state and hand back what the slot measured
    pub fn finish(mut self) -> IOSlotOutcome {
        self.state = if self.outcome.error.is_some() {
            SlotState::Failed
        } else {
            SlotState::Complete
        };
        self.outcome
    }
}
