//! Resolution of the external partition tools.
//!
//! Each logical tool is resolved once per run: an explicit override from the
//! environment, then `--binpath`, then `PATH`. The resulting
//! [`ToolLocator`] is handed to whatever needs to spawn a tool.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ensure_exists, PackError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tool {
    /// Builds the super image from the partition layout.
    Lpmake,
    /// Expands a sparse image into a raw one.
    Simg2img,
}

impl Tool {
    pub const ALL: [Tool; 2] = [Tool::Lpmake, Tool::Simg2img];

    pub fn binary_name(self) -> &'static str {
        match self {
            Tool::Lpmake => "lpmake",
            Tool::Simg2img => "simg2img",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.binary_name())
    }
}

/// Mapping from logical tool to executable path.
#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    tools: BTreeMap<Tool, PathBuf>,
}

impl ToolLocator {
    /// Build a locator from known paths (tests, or callers that resolved tools themselves).
    pub fn from_paths(paths: impl IntoIterator<Item = (Tool, PathBuf)>) -> Self {
        Self {
            tools: paths.into_iter().collect(),
        }
    }

    /// Resolve every tool in [`Tool::ALL`].
    ///
    /// All tools are looked up before failing so the error names every
    /// missing one.
    pub fn discover(search_path: Option<&Path>, overrides: &BTreeMap<Tool, PathBuf>) -> Result<Self> {
        if let Some(dir) = search_path {
            ensure_exists(dir)?;
        }
        let search = search_dirs(search_path);
        let cwd = env::current_dir().map_err(|e| PackError::io(Path::new("."), e))?;

        let mut tools = BTreeMap::new();
        let mut missing = Vec::new();
        for tool in Tool::ALL {
            if let Some(path) = overrides.get(&tool) {
                ensure_exists(path)?;
                tracing::info!("Tool found {:8} : {} (override)", tool, path.display());
                tools.insert(tool, path.clone());
                continue;
            }
            match which::which_in(tool.binary_name(), search.as_ref(), &cwd) {
                Ok(path) => {
                    tracing::info!("Tool found {:8} : {}", tool, path.display());
                    tools.insert(tool, path);
                }
                Err(_) => {
                    tracing::error!("Tool not found {:8}", tool);
                    missing.push(tool.binary_name().to_string());
                }
            }
        }

        if !missing.is_empty() {
            tracing::warn!("Some necessary tools are missing, exiting...");
            return Err(PackError::MissingExternalTool(missing));
        }
        Ok(Self { tools })
    }

    pub fn path(&self, tool: Tool) -> Result<&Path> {
        self.tools
            .get(&tool)
            .map(PathBuf::as_path)
            .ok_or_else(|| PackError::MissingExternalTool(vec![tool.binary_name().to_string()]))
    }
}

/// `--binpath` in front of `PATH`.
fn search_dirs(search_path: Option<&Path>) -> Option<OsString> {
    let mut dirs: Vec<PathBuf> = search_path.map(Path::to_path_buf).into_iter().collect();
    if let Some(path) = env::var_os("PATH") {
        dirs.extend(env::split_paths(&path));
    }
    env::join_paths(dirs).ok()
}
