//! Error kinds for the packing pipeline.
//!
//! Every component returns [`Result`]; only `main` decides to terminate.
//! A verification mismatch is not an error, see [`crate::verify::VerifyOutcome`].

use std::io;
use std::path::{Path, PathBuf};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PackError>;

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// A required file or directory does not exist.
    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// The combination of `--path` and `--fullota` does not name a pack mode.
    #[error("Invalid pack mode: {0}")]
    InvalidMode(String),

    /// The manifest (or version descriptor) is malformed or incomplete.
    #[error("Manifest parse error in {}: {message}", path.display())]
    ManifestParse { path: PathBuf, message: String },

    /// One or more external tools could not be resolved.
    #[error("Missing external tool(s): {}", .0.join(", "))]
    MissingExternalTool(Vec<String>),

    /// Domestic-mode image size disagrees with the manifest.
    #[error(
        "{partition} size mismatch: manifest declares {declared} bytes, image aligns to {aligned} bytes"
    )]
    SizePolicyViolation {
        partition: String,
        declared: u64,
        aligned: u64,
    },

    /// External tool failed to start or exited non-zero.
    #[error("{tool} failed: {message}")]
    ToolInvocation { tool: String, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PackError {
    /// Build a manifest error for `path`.
    pub fn manifest(path: &Path, message: impl Into<String>) -> Self {
        Self::ManifestParse {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Classify an I/O error on `path`; `NotFound` becomes [`PackError::PathNotFound`].
    pub fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::PathNotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Fail with [`PackError::PathNotFound`] unless `path` exists.
pub fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        tracing::debug!("Path found {}", path.display());
        Ok(())
    } else {
        Err(PackError::PathNotFound(path.to_path_buf()))
    }
}
