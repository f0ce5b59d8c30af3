//! Aligned copy engine
//!
//! Moves exactly `total` bytes between a [`DirectFile`] and either a payload
//! source (write test) or nowhere (read test, data is discarded), using one
//! reusable block-sized [`AlignedBuffer`].
//!
//! While at least one alignment unit remains, full aligned chunks are issued.
//! The final partial chunk, or the first aligned operation the device rejects
//! with `EINVAL`, moves the file into buffered mode for the rest of the
//! transfer (see [`DirectFile::fall_back_to_buffered`]).
//!
//! Errors:
//! - a sink accepting fewer bytes than offered: `PerfError::ShortTransfer`
//! - end of input before `total` bytes: `PerfError::SizeMismatch`
//! - the cancel signal firing between chunks: `Cancelled`/`DeadlineExceeded`

use super::{is_alignment_rejection, DirectFile, IoMode};
use crate::error::PerfError;
use crate::util::buffer::{AlignedBuffer, ALIGN_SIZE};
use crate::util::cancel::CancelSignal;
use crate::util::payload::unwrap_perf_error;
use log::debug;
use std::io::{self, Read};
use std::path::Path;

/// Direction of a copy
pub enum Transfer<'a> {
    /// Fill the file with bytes from `source`
    ToFile(&'a mut dyn Read),
    /// Drain the file, discarding what is read
    FromFile,
}

/// Copy exactly `total` bytes, reporting cumulative progress after every chunk
///
/// `path` is only used to give errors context. Returns the number of bytes
/// moved, which always equals `total` on success.
pub fn copy_aligned(
    file: &mut dyn DirectFile,
    path: &Path,
    mut transfer: Transfer<'_>,
    buf: &mut AlignedBuffer,
    total: u64,
    cancel: &CancelSignal,
    mut on_chunk: impl FnMut(u64),
) -> Result<u64, PerfError> {
    let mut done: u64 = 0;
    let mut eof = false;

    while done < total && !eof {
        cancel.check()?;

        let want = (total - done).min(buf.len() as u64) as usize;
        let chunk = &mut buf.as_mut_slice()[..want];

        let moved = match transfer {
            Transfer::ToFile(ref mut source) => {
                let nr = read_full(&mut **source, chunk).map_err(|e| {
                    unwrap_perf_error(&e).unwrap_or_else(|| PerfError::io("payload read", path, e))
                })?;
                eof = nr < want;
                if nr == 0 {
                    break;
                }
                let nw = write_chunk(file, path, &chunk[..nr])?;
                if nw != nr {
                    return Err(PerfError::ShortTransfer {
                        expected: nr,
                        actual: nw,
                    });
                }
                nw
            }
            Transfer::FromFile => {
                let nr = read_chunk(file, path, chunk)?;
                eof = nr < want;
                nr
            }
        };

        done += moved as u64;
        if moved > 0 {
            on_chunk(done);
        }
    }

    if done != total {
        return Err(PerfError::SizeMismatch {
            expected: total,
            actual: done,
        });
    }
    Ok(done)
}

fn fall_back(file: &mut dyn DirectFile, path: &Path, reason: &str) -> Result<(), PerfError> {
    if file.mode() == IoMode::Direct {
        debug!("{}: switching to buffered IO ({})", path.display(), reason);
    }
    file.fall_back_to_buffered()
        .map_err(|e| PerfError::io("disable direct io", path, e))
}

/// Write one chunk, falling back to buffered IO when it cannot go direct
fn write_chunk(file: &mut dyn DirectFile, path: &Path, chunk: &[u8]) -> Result<usize, PerfError> {
    if file.mode() == IoMode::Direct && chunk.len() % ALIGN_SIZE != 0 {
        fall_back(file, path, "unaligned tail")?;
    }

    loop {
        match file.write(chunk) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if file.mode() == IoMode::Direct && is_alignment_rejection(&e) => {
                fall_back(file, path, "device rejected aligned write")?;
            }
            Err(e) => return Err(PerfError::io("write", path, e)),
        }
    }
}

/// Fill `chunk` from the file, stopping early only at end of file
fn read_chunk(file: &mut dyn DirectFile, path: &Path, chunk: &mut [u8]) -> Result<usize, PerfError> {
    let mut filled = 0;

    while filled < chunk.len() {
        let dst = &mut chunk[filled..];
        // A short read leaves the next offset and buffer position unaligned
        if file.mode() == IoMode::Direct && (filled % ALIGN_SIZE != 0 || dst.len() % ALIGN_SIZE != 0) {
            fall_back(file, path, "unaligned tail")?;
        }

        match file.read(dst) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if file.mode() == IoMode::Direct && is_alignment_rejection(&e) => {
                fall_back(file, path, "device rejected aligned read")?;
            }
            Err(e) => return Err(PerfError::io("read", path, e)),
        }
    }

    Ok(filled)
}

/// Like `Read::read_exact` but reports how much was read before end of input
fn read_full(source: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
