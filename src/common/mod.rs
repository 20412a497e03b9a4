//! Shared filesystem utilities.

pub mod paths;
pub mod temp;

pub use paths::{ensure_dir_exists, ensure_parent_exists};
pub use temp::{prepare_scratch_dir, DEFAULT_SCRATCH_DIR};
