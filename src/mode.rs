//! Pack mode selection.
//!
//! The mode is fixed once per run from the kind of `--path` and whether a
//! full OTA directory was supplied:
//!
//! | `--path`  | `--fullota` | mode                           |
//! |-----------|-------------|--------------------------------|
//! | directory | absent      | [`BuildMode::DomesticOnly`]    |
//! | directory | present     | [`BuildMode::FullUpdateWithDomesticTree`] |
//! | file      | present     | [`BuildMode::FullUpdateWithManifestFile`] |
//! | other     | any         | error                          |

use std::fmt;
use std::path::Path;

use crate::error::{ensure_exists, PackError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Domestic firmware tree; images and sizes come from the manifest.
    DomesticOnly,
    /// Manifest from a domestic tree, images from a full OTA directory.
    FullUpdateWithDomesticTree,
    /// Manifest given directly as a file, images from a full OTA directory.
    FullUpdateWithManifestFile,
}

impl BuildMode {
    /// Resolve the mode for `path`, which must exist.
    pub fn resolve(path: &Path, full_update: Option<&Path>) -> Result<Self> {
        ensure_exists(path)?;
        Self::classify(path.is_dir(), path.is_file(), full_update.is_some())
    }

    /// Pure decision table behind [`BuildMode::resolve`].
    pub fn classify(is_dir: bool, is_file: bool, has_full_update: bool) -> Result<Self> {
        match (is_dir, is_file, has_full_update) {
            (true, _, false) => Ok(Self::DomesticOnly),
            (true, _, true) => Ok(Self::FullUpdateWithDomesticTree),
            (false, true, true) => Ok(Self::FullUpdateWithManifestFile),
            (false, true, false) => Err(PackError::InvalidMode(
                "a manifest file path requires --fullota".to_string(),
            )),
            (false, false, _) => Err(PackError::InvalidMode(
                "--path is neither a directory nor a regular file".to_string(),
            )),
        }
    }

    /// True for both full OTA modes.
    pub fn is_full_update(self) -> bool {
        !matches!(self, Self::DomesticOnly)
    }

    /// True when the manifest is located through `version_info.txt`.
    pub fn uses_domestic_tree(self) -> bool {
        !matches!(self, Self::FullUpdateWithManifestFile)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DomesticOnly => "domestic",
            Self::FullUpdateWithDomesticTree => "full ota with domestic",
            Self::FullUpdateWithManifestFile => "full ota with super_def.json",
        };
        f.write_str(s)
    }
}
