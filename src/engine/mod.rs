//! Direct IO backend abstraction
//!
//! The benchmark core never branches on the operating system. Instead it talks
//! to an [`IOBackend`], selected once at startup by [`select_backend`]:
//!
//! - **linux**: `O_DIRECT` files, `fcntl` to drop `O_DIRECT`, `posix_fadvise`
//!   hints and `fdatasync` for durability
//! - **unsupported**: every platform without the required primitives; it
//!   reports `PerfError::NotImplemented` and no IO is attempted
//! - **mock**: in-memory files with a per-byte cost model, used by tests
//!
//! # Files and the one-way fallback
//!
//! A [`DirectFile`] starts in [`IoMode::Direct`]. When a transfer is not a
//! multiple of the alignment unit, or the device rejects an aligned operation
//! with `EINVAL`, the copy engine calls [`DirectFile::fall_back_to_buffered`].
//! The transition happens at most once per descriptor and is never reversed.
//! Callers read the current mode through [`DirectFile::mode`] and never query
//! descriptor flags themselves.
//!
//! # Example
//!
//! ```no_run
//! use dperf::engine::select_backend;
//! use std::path::Path;
//!
//! let backend = select_backend();
//! if backend.capabilities().direct_io {
//!     let mut file = backend.open_write(Path::new("/mnt/drive1/probe")).unwrap();
//!     file.write(&vec![0u8; 4096]).unwrap();
//!     file.sync_data().unwrap();
//! }
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

pub mod copy;
pub mod mock;
pub mod unsupported;

#[cfg(target_os = "linux")]
pub mod linux;

/// Transfer mode of an open test file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    /// Page cache bypassed; buffers, offsets and lengths must be aligned
    Direct,
    /// Ordinary buffered IO
    Buffered,
}

/// An open test file
///
/// Each IO slot owns its file exclusively, so implementations need `Send`
/// but not `Sync`.
pub trait DirectFile: Send {
    /// Read at the current offset, returning 0 at end of file
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write at the current offset, returning how many bytes were accepted
    ///
    /// Unlike `std::io::Write::write_all`, no retry is attempted; a short
    /// count is reported as-is to the caller.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Current transfer mode
    fn mode(&self) -> IoMode;

    /// Switch from direct to buffered IO for the rest of this descriptor's life
    ///
    /// Idempotent: calling it in buffered mode does nothing.
    fn fall_back_to_buffered(&mut self) -> io::Result<()>;

    /// Flush file data to stable storage (fdatasync)
    fn sync_data(&mut self) -> io::Result<()>;

    /// Ask the OS to evict this file's pages from the page cache
    fn drop_cache(&mut self) -> io::Result<()>;
}

/// What a backend can do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Backend can open files bypassing the page cache
    ///
    /// A backend without direct IO is treated as unsupported as a whole.
    pub direct_io: bool,

    /// Backend honours access pattern hints (fadvise)
    pub advisory_hints: bool,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            direct_io: false,
            advisory_hints: false,
        }
    }
}

/// Platform capability interface for opening test files
pub trait IOBackend: Send + Sync {
    /// Short backend name for logs and reports
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> BackendCapabilities;

    /// Create (or truncate) `path` for writing in direct mode
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn DirectFile>>;

    /// Open `path` for a sequential read of `len` bytes in direct mode
    ///
    /// Backends with advisory hints issue a sequential-access hint right
    /// after the open.
    fn open_read(&self, path: &Path, len: u64) -> io::Result<Box<dyn DirectFile>>;

    /// Create a run directory and any missing parents
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    /// Remove a run directory and everything below it
    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}

/// Pick the backend for the running platform
pub fn select_backend() -> Arc<dyn IOBackend> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(linux::LinuxBackend::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Arc::new(unsupported::UnsupportedBackend)
    }
}

/// True when `err` is the kernel refusing an operation it cannot do in direct mode
pub(crate) fn is_alignment_rejection(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EINVAL) || err.kind() == io::ErrorKind::InvalidInput
}
