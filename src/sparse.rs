//! Android sparse image detection.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{PackError, Result};

/// First four bytes of every sparse image (`0xED26FF3A`, little-endian).
pub const SPARSE_MAGIC: [u8; 4] = [0x3A, 0xFF, 0x26, 0xED];

/// True if the image at `path` starts with the sparse magic.
///
/// Files shorter than four bytes can't carry the magic and are reported raw.
pub fn is_sparse_image(path: &Path) -> Result<bool> {
    let file = File::open(path).map_err(|e| PackError::io(path, e))?;
    let mut magic = Vec::with_capacity(SPARSE_MAGIC.len());
    file.take(SPARSE_MAGIC.len() as u64)
        .read_to_end(&mut magic)
        .map_err(|e| PackError::io(path, e))?;
    Ok(magic == SPARSE_MAGIC)
}
