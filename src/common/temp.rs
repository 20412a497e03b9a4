//! Scratch directory for converted images.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PackError, Result};

/// Default scratch directory name, relative to the current directory.
pub const DEFAULT_SCRATCH_DIR: &str = ".temp";

/// Prepare the scratch directory, removing leftovers from a previous run.
///
/// Returns the path of the (now empty) directory.
pub fn prepare_scratch_dir(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| PackError::io(path, e))?;
        tracing::info!("Clean {}", path.display());
    } else {
        tracing::info!("Create {}", path.display());
    }
    fs::create_dir_all(path).map_err(|e| PackError::io(path, e))?;
    Ok(path.to_path_buf())
}
