//! Backend for platforms without direct IO primitives
//!
//! The coordinator checks [`IOBackend::capabilities`] before touching any
//! path and reports `PerfError::NotImplemented`. The open methods fail as
//! well, in case someone drives a worker directly.

use super::{BackendCapabilities, DirectFile, IOBackend};
use std::io;
use std::path::Path;

#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

fn not_implemented() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "direct IO is not implemented on this platform")
}

impl IOBackend for UnsupportedBackend {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }

    fn open_write(&self, _path: &Path) -> io::Result<Box<dyn DirectFile>> {
        Err(not_implemented())
    }

    fn open_read(&self, _path: &Path, _len: u64) -> io::Result<Box<dyn DirectFile>> {
        Err(not_implemented())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_no_capabilities() {
        let backend = UnsupportedBackend;
        assert!(!backend.capabilities().direct_io);
        assert!(!backend.capabilities().advisory_hints);
    }

    #[test]
    fn test_open_fails() {
        let backend = UnsupportedBackend;
        let err = backend.open_write(Path::new("/tmp/x")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(backend.open_read(Path::new("/tmp/x"), 4096).is_err());
    }
}
