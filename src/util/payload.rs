//! Incompressible write payload
//!
//! Storage backends with transparent compression or deduplication report
//! inflated throughput when fed zeros or a repeating pattern. The write path
//! therefore streams the raw keystream of a ChaCha20 cipher keyed with a fresh
//! random key and stream id (nonce). Nothing is ever encrypted or decrypted;
//! the cipher is used only because its keystream is statistically random and
//! cheap to produce.

use crate::error::PerfError;
use crate::util::cancel::CancelSignal;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::io;

/// Endless, cancellable stream of keystream bytes
///
/// Each `read` first polls the cancellation signal. Once the signal fires,
/// every subsequent read fails with an `io::Error` wrapping the
/// `PerfError` reported by the signal.
pub struct PayloadSource {
    keystream: ChaCha20Rng,
    cancel: CancelSignal,
    produced: u64,
}

impl PayloadSource {
    /// Seed a new keystream with a random key and nonce
    pub fn new(cancel: CancelSignal) -> Self {
        let mut rng = rand::thread_rng();
        let key: [u8; 32] = rng.gen();
        let nonce: u64 = rng.gen();

        let mut keystream = ChaCha20Rng::from_seed(key);
        keystream.set_stream(nonce);

        Self {
            keystream,
            cancel,
            produced: 0,
        }
    }

    /// Total bytes handed out so far
    pub fn produced(&self) -> u64 {
        self.produced
    }
}

impl io::Read for PayloadSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Err(e) = self.cancel.check() {
            return Err(io::Error::new(io::ErrorKind::Other, e));
        }
        self.keystream.fill_bytes(buf);
        self.produced += buf.len() as u64;
        Ok(buf.len())
    }
}

/// Recover a `PerfError` smuggled through an `io::Error`, if there is one
pub fn unwrap_perf_error(err: &io::Error) -> Option<PerfError> {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<PerfError>())
        .cloned()
}
