//! CLI to Config conversion utilities

use crate::config::cli::LogLevel;
use anyhow::{bail, Context, Result};
use log::LevelFilter;
use std::time::Duration;

const KIB: u64 = 1 << 10;
const KB: u64 = 1000;

/// Parse a humanized size ("4MiB", "1G", "512 kb", "1.5GiB") to bytes
///
/// Binary suffixes (`Ki`, `KiB`, `Mi`, ...) are powers of 1024; bare or
/// decimal suffixes (`k`, `KB`, `M`, ...) are powers of 1000. Suffixes are
/// case-insensitive, commas in the number are ignored, and a number without a
/// suffix is a byte count.
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);

    let number: String = number.chars().filter(|&c| c != ',').collect();
    let value: f64 = number
        .parse()
        .with_context(|| format!("Invalid size format: {}", s))?;

    let unit = unit.trim().to_lowercase();
    let multiplier = match unit.as_str() {
        "" | "b" => 1,
        "ki" | "kib" => KIB,
        "mi" | "mib" => KIB.pow(2),
        "gi" | "gib" => KIB.pow(3),
        "ti" | "tib" => KIB.pow(4),
        "pi" | "pib" => KIB.pow(5),
        "ei" | "eib" => KIB.pow(6),
        "k" | "kb" => KB,
        "m" | "mb" => KB.pow(2),
        "g" | "gb" => KB.pow(3),
        "t" | "tb" => KB.pow(4),
        "p" | "pb" => KB.pow(5),
        "e" | "eb" => KB.pow(6),
        _ => bail!("Unknown size unit {:?} in {:?}", unit, s),
    };

    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        bail!("Size too large: {}", s);
    }
    Ok(bytes as u64)
}

/// Parse a duration string (e.g. "500ms", "60s", "5m", "1h"); a bare number is seconds
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num_str, unit_ms) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1u64)
    } else if let Some(n) = s.strip_suffix("sec").or_else(|| s.strip_suffix('s')) {
        (n, 1000)
    } else if let Some(n) = s.strip_suffix("min").or_else(|| s.strip_suffix('m')) {
        (n, 60 * 1000)
    } else if let Some(n) = s.strip_suffix("hr").or_else(|| s.strip_suffix('h')) {
        (n, 3600 * 1000)
    } else {
        (s.as_str(), 1000)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    let ms = num
        .checked_mul(unit_ms)
        .with_context(|| format!("Duration too large: {}", s))?;
    Ok(Duration::from_millis(ms))
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}
