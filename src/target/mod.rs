//! Paths under test
//!
//! A [`PathUnderTest`] is one mount point plus the run-scoped directory the
//! slots write into:
//!
//! ```text
//! <root>/<run_id>/.writable-check.tmp-0
//! <root>/<run_id>/.writable-check.tmp-1
//! ...
//! ```
//!
//! The run identifier is random and shared by every path of one invocation, so
//! concurrent invocations against the same mount never collide. Slots of one
//! path use disjoint file names and need no locking between them.
//!
//! The run directory is created lazily by the first slot that needs it and is
//! removed when the `PathUnderTest` is dropped, whatever happened in between.

use crate::engine::IOBackend;
use crate::error::PerfError;
use log::{debug, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Prefix of each slot's test file inside the run directory
pub const SLOT_FILE_PREFIX: &str = ".writable-check.tmp-";

/// Generate a fresh 128-bit run identifier as 32 lowercase hex digits
pub fn generate_run_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// One mount point and its run-scoped temporary directory
pub struct PathUnderTest {
    root: PathBuf,
    run_dir: PathBuf,
    backend: Arc<dyn IOBackend>,
    created: OnceLock<Result<(), PerfError>>,
}

impl PathUnderTest {
    pub fn new(root: impl Into<PathBuf>, run_id: &str, backend: Arc<dyn IOBackend>) -> Self {
        let root = root.into();
        let run_dir = root.join(run_id);
        Self {
            root,
            run_dir,
            backend,
            created: OnceLock::new(),
        }
    }

    /// Mount point as given by the caller
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Test file used by `slot`
    pub fn slot_file(&self, slot: usize) -> PathBuf {
        self.run_dir.join(format!("{SLOT_FILE_PREFIX}{slot}"))
    }

    /// Create the run directory if no slot has done so yet
    ///
    /// Safe to call from every slot concurrently; the directory is created
    /// once and every caller sees the same outcome.
    pub fn ensure_run_dir(&self) -> Result<(), PerfError> {
        self.created
            .get_or_init(|| {
                debug!("Creating run directory {}", self.run_dir.display());
                self.backend
                    .create_dir_all(&self.run_dir)
                    .map_err(|e| PerfError::io("mkdir", &self.run_dir, e))
            })
            .clone()
    }
}

impl Drop for PathUnderTest {
    fn drop(&mut self) {
        if self.created.get().is_none() {
            return;
        }
        match self.backend.remove_dir_all(&self.run_dir) {
            Ok(()) => debug!("Removed run directory {}", self.run_dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove run directory {}: {}",
                self.run_dir.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockBackend;
    use std::collections::HashSet;

    #[test]
    fn test_run_id_is_unique_hex() {
        let ids: HashSet<String> = (0..64).map(|_| generate_run_id()).collect();
        assert_eq!(ids.len(), 64);
        for id in &ids {
            assert_eq!(id.len(), 32);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_layout() {
        let mock = MockBackend::new();
        let target = PathUnderTest::new("/mnt/d1", "abc", Arc::new(mock));
        assert_eq!(target.root(), Path::new("/mnt/d1"));
        assert_eq!(target.run_dir(), Path::new("/mnt/d1/abc"));
        assert_eq!(
            target.slot_file(3),
            PathBuf::from("/mnt/d1/abc/.writable-check.tmp-3")
        );
    }

    #[test]
    fn test_run_dir_removed_on_drop() {
        let mock = MockBackend::new();
        {
            let target = PathUnderTest::new("/mnt/d1", "run", Arc::new(mock.clone()));
            target.ensure_run_dir().unwrap();
            target.ensure_run_dir().unwrap();
            mock.insert_file(target.slot_file(0), vec![0u8; 16]);
            assert!(mock.entries_under(Path::new("/mnt/d1")) > 0);
        }
        assert_eq!(mock.entries_under(Path::new("/mnt/d1")), 0);
    }

    #[test]
    fn test_real_directory_cleanup() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = crate::engine::select_backend();
        let run_dir;
        {
            let target = PathUnderTest::new(tmp.path(), &generate_run_id(), backend);
            run_dir = target.run_dir().to_path_buf();
            // Nothing is created until a slot asks for it
            assert!(!run_dir.exists());
            target.ensure_run_dir().unwrap();
            assert!(run_dir.is_dir());
            std::fs::write(target.slot_file(0), b"data").unwrap();
        }
        assert!(!run_dir.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
