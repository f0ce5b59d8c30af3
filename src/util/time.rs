//! Throughput arithmetic and formatting
//!
//! Throughput is always carried as whole bytes per second (`u64`). Formatting
//! uses IEC units with the same rounding as go-humanize's `IBytes`, so
//! results line up with other drive tools operators already know.

use std::time::Duration;

const IEC_UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Bytes per second for `bytes` moved in `elapsed`
///
/// Returns 0 for a zero duration instead of dividing by zero.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use dperf::util::time::throughput;
///
/// assert_eq!(throughput(10 * 1024 * 1024, Duration::from_secs(10)), 1024 * 1024);
/// assert_eq!(throughput(4096, Duration::ZERO), 0);
/// ```
pub fn throughput(bytes: u64, elapsed: Duration) -> u64 {
    let seconds = elapsed.as_secs_f64();
    if seconds > 0.0 {
        (bytes as f64 / seconds) as u64
    } else {
        0
    }
}

/// Format a byte count in IEC units
///
/// # Examples
///
/// ```
/// use dperf::util::time::format_ibytes;
///
/// assert_eq!(format_ibytes(5), "5 B");
/// assert_eq!(format_ibytes(1024), "1.0 KiB");
/// assert_eq!(format_ibytes(4 * 1024 * 1024), "4.0 MiB");
/// assert_eq!(format_ibytes(20 * 1024 * 1024 * 1024), "20 GiB");
/// ```
pub fn format_ibytes(bytes: u64) -> String {
    if bytes < 10 {
        return format!("{} B", bytes);
    }

    let mut exp = 0usize;
    let mut scale = 1u64;
    while exp + 1 < IEC_UNITS.len() && bytes / scale >= 1024 {
        scale *= 1024;
        exp += 1;
    }

    let value = ((bytes as f64 / scale as f64) * 10.0 + 0.5).floor() / 10.0;
    if value < 10.0 {
        format!("{:.1} {}", value, IEC_UNITS[exp])
    } else {
        format!("{:.0} {}", value, IEC_UNITS[exp])
    }
}

/// Format a throughput value, e.g. `1.5 GiB/s`
pub fn format_throughput(bytes_per_sec: u64) -> String {
    format!("{}/s", format_ibytes(bytes_per_sec))
}
