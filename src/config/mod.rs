//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! Everything funnels into one immutable [`TestConfig`] that is built once and
//! handed to the coordinator by reference.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::error::PerfError;
use crate::util::buffer::ALIGN_SIZE;
use crate::util::time::format_ibytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default block size (4 MiB)
pub const DEFAULT_BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// Default bytes written and read per slot (1 GiB)
pub const DEFAULT_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Default number of concurrent IO slots per path
pub const DEFAULT_IO_PER_DRIVE: usize = 4;

/// Complete test configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    /// Size of each IO request in bytes
    #[serde(default = "default_block_size")]
    pub block_size: u64,
    /// Bytes each slot writes and then reads back
    #[serde(default = "default_file_size")]
    pub file_size: u64,
    /// Concurrent IO slots per path
    #[serde(default = "default_io_per_drive")]
    pub io_per_drive: usize,
    /// Test paths one at a time instead of all at once
    #[serde(default)]
    pub serial: bool,
    /// Skip the read phase
    #[serde(default)]
    pub write_only: bool,
    /// Print per-path results
    #[serde(default)]
    pub verbose: bool,
}

fn default_block_size() -> u64 {
    DEFAULT_BLOCK_SIZE
}

fn default_file_size() -> u64 {
    DEFAULT_FILE_SIZE
}

fn default_io_per_drive() -> usize {
    DEFAULT_IO_PER_DRIVE
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            file_size: DEFAULT_FILE_SIZE,
            io_per_drive: DEFAULT_IO_PER_DRIVE,
            serial: false,
            write_only: false,
            verbose: false,
        }
    }
}

impl TestConfig {
    /// Check the size and concurrency invariants
    ///
    /// Block size and file size must be positive multiples of the alignment
    /// unit and at least one unit; at least one slot per path is required.
    pub fn validate(&self) -> Result<(), PerfError> {
        check_aligned("block size", self.block_size)?;
        check_aligned("file size", self.file_size)?;

        if usize::try_from(self.block_size).is_err() {
            return Err(PerfError::InvalidConfig(format!(
                "block size {} does not fit in memory",
                self.block_size
            )));
        }

        if self.io_per_drive == 0 {
            return Err(PerfError::InvalidConfig(
                "io per drive must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Block size as a buffer length
    ///
    /// Saturates on targets where it cannot be represented; `validate` rejects
    /// such configurations first.
    pub fn block_len(&self) -> usize {
        usize::try_from(self.block_size).unwrap_or(usize::MAX)
    }
}

fn check_aligned(what: &str, value: u64) -> Result<(), PerfError> {
    let align = ALIGN_SIZE as u64;
    if value < align {
        return Err(PerfError::InvalidConfig(format!(
            "{what} must be at least {align} bytes, got {value}"
        )));
    }
    if value % align != 0 {
        return Err(PerfError::InvalidConfig(format!(
            "{what} must be a multiple of {align} bytes, got {value}"
        )));
    }
    Ok(())
}

impl fmt::Display for TestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block {}, file {}, {} slot(s) per drive, {}{}",
            format_ibytes(self.block_size),
            format_ibytes(self.file_size),
            self.io_per_drive,
            if self.serial { "serial" } else { "parallel" },
            if self.write_only { ", write-only" } else { "" },
        )
    }
}
