//! Shared cancellation signal
//!
//! One `CancelSignal` is handed to every IO slot of a run. Slots poll it at
//! chunk boundaries; a syscall already in flight is never interrupted, so the
//! latency between `cancel()` and the slot giving up is bounded by one
//! block-sized IO.
//!
//! A deadline can be armed at construction. Once it passes the signal reports
//! `DeadlineExceeded` instead of `Cancelled`.

use crate::error::PerfError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cloneable handle onto one shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// Create a signal that only fires when `cancel()` is called
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signal that also fires once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Trip the signal for every clone
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    /// Return the cancellation error if the signal has fired
    ///
    /// An explicit `cancel()` wins over an expired deadline.
    #[inline]
    pub fn check(&self) -> Result<(), PerfError> {
        if self.flag.load(Ordering::Acquire) {
            return Err(PerfError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(PerfError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
