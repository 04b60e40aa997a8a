//! Byte-order detection from the initial stack pointer.
//!
//! Slot 0 of a Cortex-M vector table is the initial SP, which must point
//! into SRAM. That window is narrow enough to tell the table's byte order
//! apart cheaply.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{DetectError, Result};
use crate::types::Endianness;

/// Lower bound (exclusive) of the SRAM window for the initial SP.
pub const MIN_ARM_SP: u32 = 0x1FFF_0000;

/// Upper bound (exclusive) of the SRAM window for the initial SP.
pub const MAX_ARM_SP: u32 = 0x2010_0000;

/// Byte orders tried in priority order; the first plausible one wins.
pub const HYPOTHESES: [Endianness; 2] = [Endianness::Little, Endianness::Big];

/// The accepted initial stack pointer and the byte order it was read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackPointer {
    /// Byte order the SP was plausible in
    pub endianness: Endianness,
    /// Decoded SP value
    pub value: u32,
}

/// Decode one 32-bit word.
pub fn read_word(bytes: [u8; 4], endianness: Endianness) -> u32 {
    match endianness {
        Endianness::Little => LittleEndian::read_u32(&bytes),
        Endianness::Big => BigEndian::read_u32(&bytes),
    }
}

/// Check whether `value` lies strictly inside the SRAM window.
pub fn is_plausible_stack_pointer(value: u32) -> bool {
    MIN_ARM_SP < value && value < MAX_ARM_SP
}

/// Pick the byte order under which the first word is a plausible SP.
pub fn detect_stack_pointer(first_word: [u8; 4]) -> Result<StackPointer> {
    HYPOTHESES
        .iter()
        .map(|&endianness| StackPointer {
            endianness,
            value: read_word(first_word, endianness),
        })
        .find(|sp| is_plausible_stack_pointer(sp.value))
        .ok_or(DetectError::NoPlausibleStackPointer {
            little: read_word(first_word, Endianness::Little),
            big: read_word(first_word, Endianness::Big),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_sp() {
        let sp = detect_stack_pointer(0x2000_0100u32.to_le_bytes()).unwrap();
        assert_eq!(sp.endianness, Endianness::Little);
        assert_eq!(sp.value, 0x2000_0100);
    }

    #[test]
    fn test_big_endian_sp() {
        let sp = detect_stack_pointer(0x2000_8000u32.to_be_bytes()).unwrap();
        assert_eq!(sp.endianness, Endianness::Big);
        assert_eq!(sp.value, 0x2000_8000);
    }

    #[test]
    fn test_little_endian_wins_when_both_plausible() {
        // 0x20 0x00 0x00 0x20 reads as 0x20000020 both ways
        let sp = detect_stack_pointer([0x20, 0x00, 0x00, 0x20]).unwrap();
        assert_eq!(sp.endianness, Endianness::Little);
    }

    #[test]
    fn test_window_bounds_are_exclusive() {
        assert!(!is_plausible_stack_pointer(MIN_ARM_SP));
        assert!(!is_plausible_stack_pointer(MAX_ARM_SP));
        assert!(is_plausible_stack_pointer(MIN_ARM_SP + 1));
        assert!(is_plausible_stack_pointer(MAX_ARM_SP - 1));

        for bound in [MIN_ARM_SP, MAX_ARM_SP] {
            assert!(detect_stack_pointer(bound.to_le_bytes()).is_err());
            assert!(detect_stack_pointer(bound.to_be_bytes()).is_err());
        }
    }

    #[test]
    fn test_zero_sp_rejected() {
        let err = detect_stack_pointer([0; 4]).unwrap_err();
        assert!(matches!(
            err,
            DetectError::NoPlausibleStackPointer { little: 0, big: 0 }
        ));
    }
}
