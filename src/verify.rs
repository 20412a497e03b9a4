//! Post-build metadata check.
//!
//! For an unmodified domestic build with the AB-paired layout, the
//! metadata lpmake writes must be byte-identical to the `super_meta.raw`
//! shipped in the tree. A mismatch is reported, not raised.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{PackError, Result};

/// Offset of the primary metadata inside a super image.
pub const META_OFFSET: u64 = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// `len` bytes compared equal.
    Match { len: u64 },
    /// Offset (relative to [`META_OFFSET`]) of the first differing byte.
    /// Equal to the compared length when the artifact is too short.
    Mismatch { first_difference: u64 },
    Skipped { reason: String },
}

impl VerifyOutcome {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }
}

/// Whether this run is eligible for verification.
///
/// Only a purely manifest-driven AB-paired build reproduces the reference
/// metadata exactly.
pub fn should_verify(ab_pair: bool, has_full_update: bool, has_overrides: bool) -> bool {
    ab_pair && !has_full_update && !has_overrides
}

/// Compare `reference` with the same-length range at [`META_OFFSET`] in `artifact`.
pub fn verify_super_meta(reference: &Path, artifact: &Path) -> Result<VerifyOutcome> {
    let expected = fs::read(reference).map_err(|e| PackError::io(reference, e))?;

    let mut file = File::open(artifact).map_err(|e| PackError::io(artifact, e))?;
    file.seek(SeekFrom::Start(META_OFFSET))
        .map_err(|e| PackError::io(artifact, e))?;
    let mut actual = Vec::with_capacity(expected.len());
    file.take(expected.len() as u64)
        .read_to_end(&mut actual)
        .map_err(|e| PackError::io(artifact, e))?;

    let first_difference = expected
        .iter()
        .zip(&actual)
        .position(|(a, b)| a != b)
        .or_else(|| (actual.len() < expected.len()).then_some(actual.len()));

    Ok(match first_difference {
        None => VerifyOutcome::Match {
            len: expected.len() as u64,
        },
        Some(offset) => VerifyOutcome::Mismatch {
            first_difference: offset as u64,
        },
    })
}

/// Log `outcome` for `reference` at the matching level.
pub fn report(reference: &Path, outcome: &VerifyOutcome) {
    match outcome {
        VerifyOutcome::Match { len } => {
            tracing::info!("{} MATCH ({} bytes)", reference.display(), len)
        }
        VerifyOutcome::Mismatch { first_difference } => tracing::error!(
            "{} NOT MATCH !!! (first difference at byte {})",
            reference.display(),
            first_difference
        ),
        VerifyOutcome::Skipped { reason } => tracing::warn!("Skip verify: {}", reason),
    }
}
