//! Linux direct IO backend
//!
//! Files are opened with `O_DIRECT`. The one-way fallback clears `O_DIRECT`
//! on the live descriptor with `fcntl(F_SETFL)`, so the file offset and any
//! data already written are preserved.
//!
//! Some filesystems (older tmpfs, some FUSE mounts) refuse `O_DIRECT` at
//! `open(2)` with `EINVAL`. In that case the file is reopened without the flag
//! and starts life in buffered mode, which is the same one-way transition
//! taken earlier.
//!
//! # Page cache policy
//!
//! Reads issue `POSIX_FADV_SEQUENTIAL` right after open. Once a read test has
//! completed, the worker calls [`DirectFile::drop_cache`], which issues
//! `POSIX_FADV_DONTNEED` over the whole file, so back-to-back runs never read
//! cache-warmed data.

use super::{is_alignment_rejection, BackendCapabilities, DirectFile, IOBackend, IoMode};
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

/// Backend using `O_DIRECT` on Linux
#[derive(Debug, Default)]
pub struct LinuxBackend;

impl LinuxBackend {
    pub fn new() -> Self {
        Self
    }

    fn open(&self, path: &Path, options: &OpenOptions) -> io::Result<LinuxFile> {
        let mut direct = options.clone();
        direct.custom_flags(libc::O_DIRECT);

        match direct.open(path) {
            Ok(file) => Ok(LinuxFile {
                file,
                mode: IoMode::Direct,
            }),
            Err(e) if is_alignment_rejection(&e) => {
                debug!(
                    "{}: filesystem refused O_DIRECT at open, using buffered IO",
                    path.display()
                );
                let file = options.open(path)?;
                Ok(LinuxFile {
                    file,
                    mode: IoMode::Buffered,
                })
            }
            Err(e) => Err(e),
        }
    }
}

impl IOBackend for LinuxBackend {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            direct_io: true,
            advisory_hints: true,
        }
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn DirectFile>> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(true).mode(0o600);

        Ok(Box::new(self.open(path, &options)?))
    }

    fn open_read(&self, path: &Path, len: u64) -> io::Result<Box<dyn DirectFile>> {
        let mut options = OpenOptions::new();
        options.read(true);

        let file = self.open(path, &options)?;
        // Advisory only; some filesystems reject hints without harm
        if let Err(e) = file.fadvise(0, len, libc::POSIX_FADV_SEQUENTIAL) {
            debug!("{}: sequential hint ignored: {}", path.display(), e);
        }
        Ok(Box::new(file))
    }
}

/// An open file on Linux
pub struct LinuxFile {
    file: File,
    mode: IoMode,
}

impl LinuxFile {
    fn fadvise(&self, offset: u64, len: u64, advice: libc::c_int) -> io::Result<()> {
        // SAFETY: posix_fadvise only requires a valid descriptor
        let result = unsafe {
            libc::posix_fadvise(
                self.file.as_raw_fd(),
                offset as libc::off_t,
                len as libc::off_t,
                advice,
            )
        };
        // posix_fadvise returns the error number instead of setting errno
        if result != 0 {
            return Err(io::Error::from_raw_os_error(result));
        }
        Ok(())
    }
}

impl DirectFile for LinuxFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn mode(&self) -> IoMode {
        self.mode
    }

    fn fall_back_to_buffered(&mut self) -> io::Result<()> {
        if self.mode == IoMode::Buffered {
            return Ok(());
        }

        let fd = self.file.as_raw_fd();
        // SAFETY: fcntl on a descriptor we own
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: as above
        let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_DIRECT) };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        self.mode = IoMode::Buffered;
        Ok(())
    }

    fn sync_data(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    fn drop_cache(&mut self) -> io::Result<()> {
        // len 0 means "to the end of the file"
        self.fadvise(0, 0, libc::POSIX_FADV_DONTNEED)
    }
}
