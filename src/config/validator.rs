//! Path validation
//!
//! Runs before the benchmark core: every path must name an existing,
//! writable directory other than the filesystem root. Paths are cleaned
//! lexically (`.` and redundant separators removed, `..` folded) and
//! duplicates after cleaning are rejected, since two entries for one
//! drive would halve its measured throughput.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Component, Path, PathBuf};

/// Validate every path, returning them cleaned and in input order
pub fn validate_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        bail!("at least one path is required");
    }

    let mut seen = HashSet::new();
    let mut cleaned = Vec::with_capacity(paths.len());
    for path in paths {
        let path = validate_path(path)?;
        if !seen.insert(path.clone()) {
            bail!("path '{}' was given more than once", path.display());
        }
        cleaned.push(path);
    }
    Ok(cleaned)
}

/// Validate one path and return its cleaned form
pub fn validate_path(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        bail!("empty paths are not allowed as input");
    }

    let path = clean_path(path);
    if path == Path::new("/") {
        bail!("not allowed to write at the root of the system, please choose a valid path");
    }

    let metadata = match fs::metadata(&path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            bail!("directory at path '{}' does not exist", path.display())
        }
        Err(e) => {
            return Err(e).with_context(|| format!("cannot stat '{}'", path.display()));
        }
    };

    if !metadata.is_dir() {
        bail!("path '{}' is not a directory", path.display());
    }

    if !is_dir_writable(&path) {
        bail!("directory at path '{}' is not writable", path.display());
    }

    Ok(path)
}

/// Probe writability by creating and removing a file
fn is_dir_writable(dir: &Path) -> bool {
    let probe = dir.join(format!(".dperf-writable-check-{:016x}", rand::random::<u64>()));
    match OpenOptions::new().write(true).create_new(true).open(&probe) {
        Ok(file) => {
            drop(file);
            let _ = fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// Lexically normalize a path without touching the filesystem
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(name) => {
                out.push(name);
                depth += 1;
            }
        }
    }

    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
