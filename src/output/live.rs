//! Live progress display
//!
//! Consumes the progress channel on its own thread and redraws one line per
//! path on stderr at a fixed interval. Events arrive interleaved across paths
//! and slots; the display keeps the latest event per slot and sums slots per
//! path, so out-of-order delivery between slots does not matter.
//!
//! The thread exits once every sender is gone, after a final redraw.
//!
//! ```text
//! /mnt/drive1  write   37%  1.1 GiB/s
//! /mnt/drive2  read    12%  860 MiB/s
//! /mnt/drive3  failed  write failed on /mnt/drive3/...: No space left on device
//! ```

use crate::stats::progress::ProgressEvent;
use crate::stats::Phase;
use crate::util::time::format_throughput;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default redraw interval
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, Default)]
struct SlotProgress {
    processed: u64,
    total: u64,
    throughput: u64,
}

#[derive(Debug)]
struct DriveStatus {
    path: PathBuf,
    phase: Option<Phase>,
    slots: BTreeMap<usize, SlotProgress>,
    error: Option<String>,
}

impl DriveStatus {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            phase: None,
            slots: BTreeMap::new(),
            error: None,
        }
    }

    fn apply(&mut self, event: &ProgressEvent) {
        if let Some(ref e) = event.error {
            self.error.get_or_insert_with(|| e.to_string());
        }
        // A path's reads only start after all its writes, so a phase change resets the slots
        if self.phase != Some(event.phase) {
            if self.phase == Some(Phase::Read) {
                return;
            }
            self.phase = Some(event.phase);
            self.slots.clear();
        }
        let slot = self.slots.entry(event.slot).or_default();
        // Keep per-slot progress monotonic even if a stale event slips through
        if event.bytes_processed >= slot.processed {
            *slot = SlotProgress {
                processed: event.bytes_processed,
                total: event.bytes_total,
                throughput: event.throughput,
            };
        }
    }

    fn line(&self, width: usize) -> String {
        let path = format!("{:<width$}", self.path.display().to_string(), width = width);
        if let Some(ref e) = self.error {
            return format!("{}  failed  {}", path, e);
        }
        let Some(phase) = self.phase else {
            return format!("{}  waiting", path);
        };

        let (processed, total, throughput) = self.slots.values().fold((0u64, 0u64, 0u64), |acc, s| {
            (acc.0 + s.processed, acc.1 + s.total, acc.2 + s.throughput)
        });
        let percent = if total > 0 { processed * 100 / total } else { 0 };
        format!(
            "{}  {:<6}  {:>3}%  {}",
            path,
            phase.to_string(),
            percent,
            format_throughput(throughput)
        )
    }
}

/// Per-path progress assembled from the event stream
#[derive(Debug)]
pub struct LiveState {
    drives: Vec<DriveStatus>,
    index: HashMap<PathBuf, usize>,
}

impl LiveState {
    pub fn new(paths: &[PathBuf]) -> Self {
        let drives: Vec<DriveStatus> = paths.iter().cloned().map(DriveStatus::new).collect();
        let index = paths.iter().cloned().enumerate().map(|(i, p)| (p, i)).collect();
        Self { drives, index }
    }

    /// Fold one event into the state; events for unknown paths are ignored
    pub fn apply(&mut self, event: &ProgressEvent) {
        let path: &Path = &event.path;
        if let Some(&i) = self.index.get(path) {
            self.drives[i].apply(event);
        }
    }

    /// One display line per path, in input order
    pub fn lines(&self) -> Vec<String> {
        let width = self
            .drives
            .iter()
            .map(|d| d.path.display().to_string().chars().count())
            .max()
            .unwrap_or(0);
        self.drives.iter().map(|d| d.line(width)).collect()
    }
}

/// Redraws the state in place using ANSI cursor movement
struct Screen<W: Write> {
    out: W,
    drawn: usize,
}

impl<W: Write> Screen<W> {
    fn draw(&mut self, lines: &[String]) -> io::Result<()> {
        if self.drawn > 0 {
            write!(self.out, "\x1b[{}A", self.drawn)?;
        }
        for line in lines {
            writeln!(self.out, "\r\x1b[2K{}", line)?;
        }
        self.drawn = lines.len();
        self.out.flush()
    }
}

/// Start the display thread for `paths`, reading events from `rx`
pub fn spawn_live_display(
    rx: Receiver<ProgressEvent>,
    paths: Vec<PathBuf>,
    interval: Duration,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("dperf-progress".to_string())
        .spawn(move || run_display(rx, &paths, interval, io::stderr()))
}

fn run_display(rx: Receiver<ProgressEvent>, paths: &[PathBuf], interval: Duration, out: impl Write) {
    let mut state = LiveState::new(paths);
    let mut screen = Screen { out, drawn: 0 };
    let mut next_draw = Instant::now();

    loop {
        let timeout = next_draw.saturating_duration_since(Instant::now());
        match rx.recv_timeout(timeout) {
            Ok(event) => state.apply(&event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if Instant::now() >= next_draw {
            if let Err(e) = screen.draw(&state.lines()) {
                log::debug!("Progress display stopped: {}", e);
                return;
            }
            next_draw = Instant::now() + interval;
        }
    }

    // Drain anything left behind the disconnect and show the final state
    for event in rx.try_iter() {
        state.apply(&event);
    }
    let _ = screen.draw(&state.lines());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PerfError;
    use crossbeam::channel;
    use std::sync::Arc;

    fn event(path: &str, phase: Phase, slot: usize, done: u64, rate: u64) -> ProgressEvent {
        ProgressEvent {
            path: Arc::from(Path::new(path)),
            phase,
            slot,
            bytes_processed: done,
            bytes_total: 100,
            throughput: rate,
            error: None,
        }
    }

    fn paths() -> Vec<PathBuf> {
        vec![PathBuf::from("/mnt/a"), PathBuf::from("/mnt/bb")]
    }

    #[test]
    fn test_sums_slots_per_path() {
        let mut state = LiveState::new(&paths());
        state.apply(&event("/mnt/a", Phase::Write, 0, 50, 1024));
        state.apply(&event("/mnt/a", Phase::Write, 1, 25, 1024));
        state.apply(&event("/mnt/zz", Phase::Write, 0, 100, 1));

        let lines = state.lines();
        assert_eq!(lines[0], "/mnt/a   write    37%  2.0 KiB/s");
        assert_eq!(lines[1], "/mnt/bb  waiting");
    }

    #[test]
    fn test_read_phase_resets_and_ignores_late_writes() {
        let mut state = LiveState::new(&paths());
        state.apply(&event("/mnt/a", Phase::Write, 0, 100, 10));
        state.apply(&event("/mnt/a", Phase::Read, 0, 10, 20));
        state.apply(&event("/mnt/a", Phase::Write, 1, 100, 10));
        assert!(state.lines()[0].contains("read     10%"));
    }

    #[test]
    fn test_stale_slot_event_does_not_regress() {
        let mut state = LiveState::new(&paths());
        state.apply(&event("/mnt/a", Phase::Write, 0, 80, 10));
        state.apply(&event("/mnt/a", Phase::Write, 0, 40, 10));
        assert!(state.lines()[0].contains("80%"));
    }

    #[test]
    fn test_error_sticks() {
        let mut state = LiveState::new(&paths());
        let mut failed = event("/mnt/bb", Phase::Write, 0, 10, 0);
        failed.error = Some(PerfError::Cancelled);
        state.apply(&failed);
        state.apply(&event("/mnt/bb", Phase::Write, 1, 20, 0));
        assert_eq!(state.lines()[1], "/mnt/bb  failed  operation cancelled");
    }

    #[test]
    fn test_display_thread_exits_on_disconnect() {
        let (tx, rx) = channel::bounded(16);
        tx.send(event("/mnt/a", Phase::Write, 0, 100, 10)).unwrap();
        drop(tx);

        let mut out = Vec::new();
        run_display(rx, &paths(), Duration::from_millis(10), &mut out);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("/mnt/a   write   100%"));
    }
}
