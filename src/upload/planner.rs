//! Chunk planning
//!
//! Pure computation of the ordered part list for a file. Deterministic for a
//! given (size, chunk size) pair, which is what makes a plan reproducible
//! across process restarts.

use super::types::{PartPlan, UploadError};

/// Compute the ordered set of byte-range parts for a file.
///
/// Produces `ceil(total_bytes / chunk_size_bytes)` parts numbered 1..N with
/// contiguous ranges covering exactly `[0, total_bytes)`. The final part may
/// be shorter than the chunk size. A zero-byte file yields a single empty
/// part, since the transport protocol requires at least one part.
pub fn plan(total_bytes: u64, chunk_size_bytes: u32) -> Result<Vec<PartPlan>, UploadError> {
    if chunk_size_bytes == 0 {
        return Err(UploadError::InvalidConfiguration(
            "chunk size must be greater than zero".to_string(),
        ));
    }

    if total_bytes == 0 {
        return Ok(vec![PartPlan {
            part_number: 1,
            start: 0,
            end: 0,
        }]);
    }

    let chunk_size = chunk_size_bytes as u64;
    let part_count = total_bytes.div_ceil(chunk_size);

    // Part numbers are u32 on the wire; a plan that cannot number its parts
    // is a misconfiguration, not a truncation.
    if part_count > u32::MAX as u64 {
        return Err(UploadError::InvalidConfiguration(format!(
            "{part_count} parts exceed the supported part number range"
        )));
    }

    let parts = (0..part_count)
        .map(|i| {
            let start = i * chunk_size;
            PartPlan {
                part_number: (i + 1) as u32,
                start,
                end: (start + chunk_size).min(total_bytes),
            }
        })
        .collect();

    Ok(parts)
}
