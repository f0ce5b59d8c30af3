//! TOML configuration file parsing
//!
//! Every key is optional. Sizes may be byte counts or humanized strings:
//!
//! ```toml
//! block_size = "4MiB"
//! file_size = 1073741824
//! io_per_drive = 8
//! serial = true
//! ```
//!
//! Precedence when building the final [`TestConfig`]: command line (and its
//! environment variables), then the file, then built-in defaults.

use super::cli_convert::parse_size;
use super::*;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A size given either as bytes or as a humanized string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    Bytes(u64),
    Human(String),
}

impl SizeValue {
    pub fn to_bytes(&self) -> Result<u64> {
        match self {
            SizeValue::Bytes(n) => Ok(*n),
            SizeValue::Human(s) => parse_size(s),
        }
    }
}

/// Settings read from a config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub block_size: Option<SizeValue>,
    pub file_size: Option<SizeValue>,
    pub io_per_drive: Option<usize>,
    pub serial: Option<bool>,
    pub write_only: Option<bool>,
    pub verbose: Option<bool>,
}

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<FileConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<FileConfig> {
    let config: FileConfig =
        ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with file settings (CLI takes precedence)
///
/// Boolean flags can only switch a setting on from the command line; when a
/// flag is absent the file value (or `false`) stands.
pub fn merge_cli_with_config(cli: &Cli, file: FileConfig) -> Result<TestConfig> {
    let mut config = TestConfig::default();

    if let Some(size) = file.block_size {
        config.block_size = size.to_bytes().context("Invalid block_size in config file")?;
    }
    if let Some(size) = file.file_size {
        config.file_size = size.to_bytes().context("Invalid file_size in config file")?;
    }
    if let Some(n) = file.io_per_drive {
        config.io_per_drive = n;
    }
    config.serial = file.serial.unwrap_or(false);
    config.write_only = file.write_only.unwrap_or(false);
    config.verbose = file.verbose.unwrap_or(false);

    if let Some(ref s) = cli.block_size {
        config.block_size = parse_size(s).context("Invalid block size")?;
    }
    if let Some(ref s) = cli.file_size {
        config.file_size = parse_size(s).context("Invalid file size")?;
    }
    if let Some(n) = cli.io_per_drive {
        config.io_per_drive = n;
    }
    config.serial |= cli.serial;
    config.write_only |= cli.write_only;
    config.verbose |= cli.verbose;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["dperf"];
        argv.extend_from_slice(args);
        argv.push("/mnt/a");
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_toml_basic() {
        let toml = r#"
block_size = "1MiB"
file_size = 8388608
io_per_drive = 8
serial = true
"#;

        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.block_size, Some(SizeValue::Human("1MiB".into())));
        assert_eq!(config.file_size, Some(SizeValue::Bytes(8 << 20)));
        assert_eq!(config.io_per_drive, Some(8));
        assert_eq!(config.serial, Some(true));
        assert_eq!(config.write_only, None);
    }

    #[test]
    fn test_parse_toml_rejects_unknown_keys() {
        assert!(parse_toml_string("blocksize = 4096").is_err());
    }

    #[test]
    fn test_defaults_without_file_or_flags() {
        let config = merge_cli_with_config(&cli(&[]), FileConfig::default()).unwrap();
        assert_eq!(config, TestConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = parse_toml_string("block_size = \"1MiB\"\nwrite_only = true").unwrap();
        let config = merge_cli_with_config(&cli(&[]), file).unwrap();
        assert_eq!(config.block_size, 1 << 20);
        assert_eq!(config.file_size, DEFAULT_FILE_SIZE);
        assert!(config.write_only);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = parse_toml_string("block_size = \"1MiB\"\nio_per_drive = 2").unwrap();
        let config = merge_cli_with_config(&cli(&["-b", "8MiB", "--serial"]), file).unwrap();
        assert_eq!(config.block_size, 8 << 20);
        assert_eq!(config.io_per_drive, 2);
        assert!(config.serial);
    }

    #[test]
    fn test_invalid_size_reported() {
        let err = merge_cli_with_config(&cli(&["-f", "lots"]), FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Invalid file size"));
    }

    #[test]
    fn test_parse_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dperf.toml");
        fs::write(&path, "verbose = true\n").unwrap();
        assert_eq!(parse_toml_file(&path).unwrap().verbose, Some(true));
        assert!(parse_toml_file(&dir.path().join("missing.toml")).is_err());
    }
}
