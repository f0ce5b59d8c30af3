//! Mock backend for testing
//!
//! `MockBackend` keeps files in memory and never touches the filesystem, which
//! makes coordinator and worker tests fast and deterministic. It models the
//! parts of direct IO the core depends on:
//!
//! - Direct-mode transfers whose length is not a multiple of the alignment
//!   unit fail with `EINVAL`, as the kernel does
//! - A fixed per-byte cost (a sleep proportional to the transfer length)
//! - Injected faults: writes under a path prefix fail once a byte budget is
//!   spent, aligned ops can be rejected with `EINVAL`, writes can come up short,
//!   and `fdatasync` can fail
//! - Counters for fallbacks, syncs and cache drops
//!
//! # Example
//!
//! ```
//! use dperf::engine::IOBackend;
//! use dperf::engine::mock::MockBackend;
//! use std::path::Path;
//!
//! let backend = MockBackend::new();
//! let mut file = backend.open_write(Path::new("/mock/drive1/f")).unwrap();
//! assert_eq!(file.write(&vec![7u8; 4096]).unwrap(), 4096);
//! assert_eq!(backend.file_len(Path::new("/mock/drive1/f")), Some(4096));
//! ```

use super::{BackendCapabilities, DirectFile, IOBackend, IoMode};
use crate::util::buffer::ALIGN_SIZE;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type FileData = Arc<Mutex<Vec<u8>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writes under `prefix` fail once `after_bytes` have been written to that file
#[derive(Debug, Clone)]
struct WriteFault {
    prefix: PathBuf,
    after_bytes: u64,
}

#[derive(Default)]
struct MockState {
    files: Mutex<HashMap<PathBuf, FileData>>,
    dirs: Mutex<HashSet<PathBuf>>,
    unsupported: AtomicBool,
    cost_per_byte_ns: AtomicU64,
    write_fault: Mutex<Option<WriteFault>>,
    reject_aligned: AtomicBool,
    short_writes: AtomicBool,
    fail_sync: AtomicBool,
    fallbacks: AtomicUsize,
    syncs: AtomicUsize,
    cache_drops: AtomicUsize,
    opens: AtomicUsize,
}

/// In-memory backend with configurable costs and faults
///
/// Clones share state, so a test can keep a handle for inspection while the
/// coordinator owns another.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report no direct IO capability, like a platform without support
    pub fn set_unsupported(&self, unsupported: bool) {
        self.state.unsupported.store(unsupported, Ordering::SeqCst);
    }

    /// Sleep `ns` nanoseconds per byte moved, in both directions
    pub fn set_cost_per_byte_ns(&self, ns: u64) {
        self.state.cost_per_byte_ns.store(ns, Ordering::SeqCst);
    }

    /// Fail writes to files under `prefix` once `after_bytes` are on that file
    pub fn fail_writes_under(&self, prefix: impl Into<PathBuf>, after_bytes: u64) {
        *lock(&self.state.write_fault) = Some(WriteFault {
            prefix: prefix.into(),
            after_bytes,
        });
    }

    /// Reject every direct-mode transfer with `EINVAL`, even aligned ones
    pub fn set_reject_aligned(&self, reject: bool) {
        self.state.reject_aligned.store(reject, Ordering::SeqCst);
    }

    /// Accept only half of every write
    pub fn set_short_writes(&self, short: bool) {
        self.state.short_writes.store(short, Ordering::SeqCst);
    }

    /// Make `sync_data` fail
    pub fn set_fail_sync(&self, fail: bool) {
        self.state.fail_sync.store(fail, Ordering::SeqCst);
    }

    /// Number of direct-to-buffered transitions across all files
    pub fn fallback_count(&self) -> usize {
        self.state.fallbacks.load(Ordering::SeqCst)
    }

    pub fn sync_count(&self) -> usize {
        self.state.syncs.load(Ordering::SeqCst)
    }

    pub fn cache_drop_count(&self) -> usize {
        self.state.cache_drops.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Length of an in-memory file, if it exists
    pub fn file_len(&self, path: &Path) -> Option<usize> {
        lock(&self.state.files).get(path).map(|data| lock(data).len())
    }

    /// Files and directories still present under `root`
    pub fn entries_under(&self, root: &Path) -> usize {
        let files = lock(&self.state.files)
            .keys()
            .filter(|p| p.starts_with(root))
            .count();
        let dirs = lock(&self.state.dirs)
            .iter()
            .filter(|p| p.starts_with(root) && p.as_path() != root)
            .count();
        files + dirs
    }

    /// Write `data` directly into the in-memory store
    pub fn insert_file(&self, path: impl Into<PathBuf>, data: Vec<u8>) {
        lock(&self.state.files).insert(path.into(), Arc::new(Mutex::new(data)));
    }

    fn file(&self, path: &Path, data: FileData) -> MockFile {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        MockFile {
            path: path.to_path_buf(),
            data,
            pos: 0,
            mode: IoMode::Direct,
            state: Arc::clone(&self.state),
        }
    }
}

impl IOBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn capabilities(&self) -> BackendCapabilities {
        let supported = !self.state.unsupported.load(Ordering::SeqCst);
        BackendCapabilities {
            direct_io: supported,
            advisory_hints: supported,
        }
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn DirectFile>> {
        let data: FileData = Arc::new(Mutex::new(Vec::new()));
        lock(&self.state.files).insert(path.to_path_buf(), Arc::clone(&data));
        Ok(Box::new(self.file(path, data)))
    }

    fn open_read(&self, path: &Path, _len: u64) -> io::Result<Box<dyn DirectFile>> {
        let data = lock(&self.state.files)
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        Ok(Box::new(self.file(path, data)))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        lock(&self.state.dirs).insert(path.to_path_buf());
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let existed = lock(&self.state.dirs).remove(path);
        lock(&self.state.dirs).retain(|d| !d.starts_with(path));
        let mut files = lock(&self.state.files);
        let before = files.len();
        files.retain(|p, _| !p.starts_with(path));
        if !existed && files.len() == before {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        Ok(())
    }
}

/// In-memory file handed out by [`MockBackend`]
pub struct MockFile {
    path: PathBuf,
    data: FileData,
    pos: usize,
    mode: IoMode,
    state: Arc<MockState>,
}

impl MockFile {
    fn check_direct(&self, len: usize) -> io::Result<()> {
        if self.mode == IoMode::Direct
            && (len % ALIGN_SIZE != 0 || self.state.reject_aligned.load(Ordering::SeqCst))
        {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        Ok(())
    }

    fn pay(&self, len: usize) {
        let ns = self.state.cost_per_byte_ns.load(Ordering::SeqCst);
        if ns > 0 && len > 0 {
            std::thread::sleep(Duration::from_nanos(ns.saturating_mul(len as u64)));
        }
    }
}

impl DirectFile for MockFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_direct(buf.len())?;
        let data = lock(&self.data);
        let available = data.len().saturating_sub(self.pos);
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&data[self.pos..self.pos + n]);
        drop(data);

        self.pay(n);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_direct(buf.len())?;

        if let Some(fault) = lock(&self.state.write_fault).clone() {
            if self.path.starts_with(&fault.prefix)
                && (self.pos + buf.len()) as u64 > fault.after_bytes
            {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
        }

        let n = if self.state.short_writes.load(Ordering::SeqCst) {
            buf.len() / 2
        } else {
            buf.len()
        };

        let mut data = lock(&self.data);
        if data.len() < self.pos + n {
            data.resize(self.pos + n, 0);
        }
        data[self.pos..self.pos + n].copy_from_slice(&buf[..n]);
        drop(data);

        self.pay(n);
        self.pos += n;
        Ok(n)
    }

    fn mode(&self) -> IoMode {
        self.mode
    }

    fn fall_back_to_buffered(&mut self) -> io::Result<()> {
        if self.mode == IoMode::Direct {
            self.mode = IoMode::Buffered;
            self.state.fallbacks.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn sync_data(&mut self) -> io::Result<()> {
        self.state.syncs.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_sync.load(Ordering::SeqCst) {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }
        Ok(())
    }

    fn drop_cache(&mut self) -> io::Result<()> {
        self.state.cache_drops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_mode_rejects_unaligned_length() {
        let backend = MockBackend::new();
        let mut file = backend.open_write(Path::new("/m/a")).unwrap();
        let err = file.write(&[0u8; 100]).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));

        file.fall_back_to_buffered().unwrap();
        assert_eq!(file.write(&[0u8; 100]).unwrap(), 100);
        assert_eq!(backend.fallback_count(), 1);
    }

    #[test]
    fn test_fallback_counted_once_per_file() {
        let backend = MockBackend::new();
        let mut file = backend.open_write(Path::new("/m/a")).unwrap();
        file.fall_back_to_buffered().unwrap();
        file.fall_back_to_buffered().unwrap();
        assert_eq!(file.mode(), IoMode::Buffered);
        assert_eq!(backend.fallback_count(), 1);
    }

    #[test]
    fn test_read_back_written_data() {
        let backend = MockBackend::new();
        let path = Path::new("/m/data");
        let mut file = backend.open_write(path).unwrap();
        file.write(&[3u8; 8192]).unwrap();

        let mut reader = backend.open_read(path, 8192).unwrap();
        let mut buf = vec![0u8; 4096];
        assert_eq!(reader.read(&mut buf).unwrap(), 4096);
        assert_eq!(reader.read(&mut buf).unwrap(), 4096);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert!(buf.iter().all(|&b| b == 3));
    }

    #[test]
    fn test_write_fault_under_prefix() {
        let backend = MockBackend::new();
        backend.fail_writes_under("/m/bad", 4096);

        let mut good = backend.open_write(Path::new("/m/good/f")).unwrap();
        assert!(good.write(&[0u8; 8192]).is_ok());

        let mut bad = backend.open_write(Path::new("/m/bad/f")).unwrap();
        assert!(bad.write(&[0u8; 4096]).is_ok());
        let err = bad.write(&[0u8; 4096]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_remove_dir_all_drops_files() {
        let backend = MockBackend::new();
        let root = Path::new("/m/drive");
        let run = root.join("run");
        backend.create_dir_all(&run).unwrap();
        backend.open_write(&run.join("f0")).unwrap();
        backend.open_write(&run.join("f1")).unwrap();
        assert_eq!(backend.entries_under(root), 3);

        backend.remove_dir_all(&run).unwrap();
        assert_eq!(backend.entries_under(root), 0);
        assert!(backend.remove_dir_all(&run).is_err());
    }

    #[test]
    fn test_open_read_missing() {
        let backend = MockBackend::new();
        let err = backend.open_read(Path::new("/m/none"), 0).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
