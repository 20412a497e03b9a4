//! Superpack library exports.
//!
//! The binary in `main.rs` is a thin CLI over [`pack::pack`]; everything is
//! exported here so integration tests can drive the pipeline directly.

pub mod common;
pub mod config;
pub mod error;
pub mod layout;
pub mod lpmake;
pub mod manifest;
pub mod mode;
pub mod pack;
pub mod process;
pub mod sparse;
pub mod timing;
pub mod tools;
pub mod verify;

pub use error::{PackError, Result};
