//! Load address estimation.
//!
//! Every code vector points inside the image, so the image cannot start
//! above the lowest one. That address aligned down to a flash sector is the
//! primary estimate. Images that stub out every handler but reset only get
//! the coarser reset-vector mask.

use serde::Serialize;

/// Sector alignment for the vector-minimum estimate (4 KiB).
pub const SECTOR_MASK: u32 = 0xFFFF_F000;

/// Alignment for the reset-vector fallback (64 KiB).
pub const FALLBACK_MASK: u32 = 0xFFFF_0000;

/// Which policy produced a base estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseSource {
    /// Lowest code vector, sector aligned.
    VectorMinimum,
    /// Reset vector masked to 64 KiB; lower confidence.
    ResetVectorMask,
}

/// An estimated load address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BaseEstimate {
    /// Estimated load address
    pub address: u32,
    /// Policy that produced it
    pub source: BaseSource,
}

/// Lowest code vector aligned down to a 4 KiB boundary.
pub fn base_from_vectors(code_vectors: &[u32]) -> Option<u32> {
    code_vectors.iter().min().map(|&lowest| lowest & SECTOR_MASK)
}

/// Reset vector aligned down to a 64 KiB boundary.
pub fn base_from_entry(entry_point: u32) -> u32 {
    entry_point & FALLBACK_MASK
}

/// Estimate the base, falling back to the entry point when no code vector
/// survived extraction.
pub fn estimate_base(code_vectors: &[u32], entry_point: Option<u32>) -> Option<BaseEstimate> {
    if let Some(address) = base_from_vectors(code_vectors) {
        return Some(BaseEstimate {
            address,
            source: BaseSource::VectorMinimum,
        });
    }

    entry_point.map(|entry| BaseEstimate {
        address: base_from_entry(entry),
        source: BaseSource::ResetVectorMask,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_vector_aligned() {
        assert_eq!(base_from_vectors(&[0x0800_1234, 0x0800_4000]), Some(0x0800_1000));
        assert_eq!(base_from_vectors(&[0x1004, 0x800]), Some(0));
        assert_eq!(base_from_vectors(&[]), None);
    }

    #[test]
    fn test_vectors_take_priority_over_entry() {
        let est = estimate_base(&[0x0000_8100], Some(0x0801_0201)).unwrap();
        assert_eq!(est.address, 0x0000_8000);
        assert_eq!(est.source, BaseSource::VectorMinimum);
    }

    #[test]
    fn test_fallback_masks_entry() {
        let est = estimate_base(&[], Some(0x0801_2345)).unwrap();
        assert_eq!(est.address, 0x0801_0000);
        assert_eq!(est.source, BaseSource::ResetVectorMask);
    }

    #[test]
    fn test_no_vectors_no_entry() {
        assert_eq!(estimate_base(&[], None), None);
    }
}
