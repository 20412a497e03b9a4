//! Directory helpers.

use std::fs;
use std::path::Path;

use crate::error::{PackError, Result};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| PackError::io(path, e))
}

/// Ensure all parent directories of a file exist.
///
/// Paths without a parent are left alone.
pub fn ensure_parent_exists(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_exists(parent),
        _ => Ok(()),
    }
}
