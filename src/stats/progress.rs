//! Progress event stream
//!
//! Every IO slot of every path may emit events concurrently. Consumers must
//! treat the stream as unordered and multiplexed: byte counts are monotonic
//! within one `(path, slot, phase)`, but nothing is guaranteed about ordering
//! across slots or paths.
//!
//! [`ChannelSink`] is the default sink: a bounded channel that drops the
//! newest event when full, so a slow consumer never stalls IO and never
//! starves one path in favour of another. Any `Fn(ProgressEvent) + Send + Sync`
//! closure is a sink as well; it must not block for long and must not panic.

use super::Phase;
use crate::error::PerfError;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of one slot's progress
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub path: Arc<Path>,
    pub phase: Phase,
    pub slot: usize,
    /// Cumulative bytes moved by this slot in this phase
    pub bytes_processed: u64,
    pub bytes_total: u64,
    /// Bytes/sec for this slot since the phase started
    pub throughput: u64,
    pub error: Option<PerfError>,
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Bounded channel sink with a drop-newest policy
pub struct ChannelSink {
    tx: Sender<ProgressEvent>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel
    pub fn bounded(capacity: usize) -> (Self, Receiver<ProgressEvent>) {
        let (tx, rx) = channel::bounded(capacity);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Events discarded because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // Consumer went away; progress is best effort
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn event(slot: usize, bytes: u64) -> ProgressEvent {
        ProgressEvent {
            path: Arc::from(Path::new("/mnt/d1")),
            phase: Phase::Write,
            slot,
            bytes_processed: bytes,
            bytes_total: 100,
            throughput: 10,
            error: None,
        }
    }

    #[test]
    fn test_channel_sink_delivers_in_order() {
        let (sink, rx) = ChannelSink::bounded(8);
        sink.emit(event(0, 10));
        sink.emit(event(0, 20));
        let got: Vec<u64> = rx.try_iter().map(|e| e.bytes_processed).collect();
        assert_eq!(got, vec![10, 20]);
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (sink, rx) = ChannelSink::bounded(2);
        for i in 0..5 {
            sink.emit(event(0, i));
        }
        assert_eq!(sink.dropped(), 3);
        let got: Vec<u64> = rx.try_iter().map(|e| e.bytes_processed).collect();
        assert_eq!(got, vec![0, 1]);
    }

    #[test]
    fn test_channel_sink_tolerates_closed_receiver() {
        let (sink, rx) = ChannelSink::bounded(1);
        drop(rx);
        sink.emit(event(1, 1));
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |e: ProgressEvent| seen.lock().unwrap().push(e.slot);
        sink.emit(event(3, 1));
        sink.emit(event(4, 1));
        assert_eq!(*seen.lock().unwrap(), vec![3, 4]);
    }
}
