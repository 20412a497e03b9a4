//! Configuration management for superpack.
//!
//! Reads configuration from a .env file and environment variables.
//! Environment variables take precedence over the .env file; command-line
//! options take precedence over both (see [`crate::pack::PackOptions`]).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::common::DEFAULT_SCRATCH_DIR;
use crate::tools::Tool;

pub const ENV_LPMAKE: &str = "SUPERPACK_LPMAKE";
pub const ENV_SIMG2IMG: &str = "SUPERPACK_SIMG2IMG";
pub const ENV_TEMP_DIR: &str = "SUPERPACK_TEMP_DIR";

/// Superpack configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Explicit lpmake binary, bypassing the search path.
    pub lpmake: Option<PathBuf>,
    /// Explicit simg2img binary, bypassing the search path.
    pub simg2img: Option<PathBuf>,
    /// Scratch directory for converted images (default: .temp)
    pub scratch_dir: PathBuf,
}

impl Config {
    /// Load configuration from `<base_dir>/.env` and the environment.
    ///
    /// Relative paths are resolved against `base_dir`.
    pub fn load(base_dir: &Path) -> Self {
        let mut env_vars = HashMap::new();

        let env_path = base_dir.join(".env");
        if env_path.exists() {
            match dotenvy::from_path_iter(&env_path) {
                Ok(iter) => {
                    for item in iter {
                        match item {
                            Ok((key, value)) => {
                                env_vars.insert(key, value);
                            }
                            Err(e) => tracing::warn!("Ignoring line in {}: {}", env_path.display(), e),
                        }
                    }
                }
                Err(e) => tracing::warn!("Failed to read {}: {}", env_path.display(), e),
            }
        }

        // Environment variables override .env file
        for (key, value) in std::env::vars() {
            env_vars.insert(key, value);
        }

        let resolve = |key: &str| {
            env_vars
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .map(|v| absolutize(base_dir, v.trim()))
        };

        Self {
            lpmake: resolve(ENV_LPMAKE),
            simg2img: resolve(ENV_SIMG2IMG),
            scratch_dir: resolve(ENV_TEMP_DIR).unwrap_or_else(|| base_dir.join(DEFAULT_SCRATCH_DIR)),
        }
    }

    /// Tool paths pinned by configuration.
    pub fn tool_overrides(&self) -> BTreeMap<Tool, PathBuf> {
        let mut overrides = BTreeMap::new();
        if let Some(path) = &self.lpmake {
            overrides.insert(Tool::Lpmake, path.clone());
        }
        if let Some(path) = &self.simg2img {
            overrides.insert(Tool::Simg2img, path.clone());
        }
        overrides
    }

    /// Log configuration for debugging.
    pub fn log(&self) {
        let show = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(search path)".to_string())
        };
        tracing::debug!("Configuration:");
        tracing::debug!("  {}: {}", ENV_LPMAKE, show(&self.lpmake));
        tracing::debug!("  {}: {}", ENV_SIMG2IMG, show(&self.simg2img));
        tracing::debug!("  {}: {}", ENV_TEMP_DIR, self.scratch_dir.display());
    }
}

fn absolutize(base_dir: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}
