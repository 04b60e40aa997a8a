//! Vector table decoding and code-vector extraction.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::types::Endianness;

/// Number of 32-bit slots in the analyzed prefix.
pub const VECTOR_COUNT: usize = 64;

/// Slots examined for code vectors.
pub const SCANNED_VECTORS: usize = 48;

/// SP slot plus architecturally reserved slots that often hold zero or data.
pub const RESERVED_SLOTS: [usize; 6] = [0, 7, 8, 9, 10, 13];

/// Flash window start; address 0 itself is never accepted.
pub const MIN_FLASH_ADDR: u32 = 0x0000_0000;

/// Flash window end (exclusive), just below SRAM.
pub const MAX_FLASH_ADDR: u32 = 0x2000_0000;

const THUMB_BIT: u32 = 1;

/// A vector table decoded in one byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorTable {
    words: [u32; VECTOR_COUNT],
    endianness: Endianness,
}

impl VectorTable {
    /// Decode the 256-byte prefix as 64 words.
    pub fn decode(prefix: &[u8; VECTOR_COUNT * 4], endianness: Endianness) -> Self {
        let mut words = [0u32; VECTOR_COUNT];
        match endianness {
            Endianness::Little => LittleEndian::read_u32_into(prefix, &mut words),
            Endianness::Big => BigEndian::read_u32_into(prefix, &mut words),
        }
        Self { words, endianness }
    }

    /// Byte order the table was decoded in.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Word at `slot`, if in range.
    pub fn word(&self, slot: usize) -> Option<u32> {
        self.words.get(slot).copied()
    }

    /// Slot 0.
    pub fn initial_stack_pointer(&self) -> u32 {
        self.words[0]
    }

    /// Slot 1, verbatim (Thumb bit kept).
    pub fn reset_vector(&self) -> u32 {
        self.words[1]
    }

    /// Code addresses found in the scanned slots, Thumb bit cleared.
    pub fn code_vectors(&self) -> Vec<u32> {
        extract_code_vectors(&self.words)
    }
}

/// Whether `slot` is skipped during extraction.
pub fn is_reserved_slot(slot: usize) -> bool {
    RESERVED_SLOTS.contains(&slot)
}

/// Thumb-cleared code address for `value`, if it is one.
///
/// The Thumb bit must be set and the cleared address must fall strictly
/// between the flash bounds, so `0x00000001` (address 0) is rejected.
pub fn code_address(value: u32) -> Option<u32> {
    let is_thumb = value & THUMB_BIT != 0;
    let addr = value & !THUMB_BIT;
    if is_thumb && MIN_FLASH_ADDR < addr && addr < MAX_FLASH_ADDR {
        Some(addr)
    } else {
        None
    }
}

/// Collect code addresses from the first [`SCANNED_VECTORS`] words.
pub fn extract_code_vectors(words: &[u32]) -> Vec<u32> {
    words
        .iter()
        .take(SCANNED_VECTORS)
        .enumerate()
        .filter(|(slot, _)| !is_reserved_slot(*slot))
        .filter_map(|(_, &value)| code_address(value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_address_bounds() {
        assert_eq!(code_address(0x0000_0201), Some(0x0000_0200));
        assert_eq!(code_address(0x1FFF_FFFF), Some(0x1FFF_FFFE));
        assert_eq!(code_address(0x0000_0001), None);
        assert_eq!(code_address(0x2000_0000), None);
        assert_eq!(code_address(0x2000_0001), None);
        assert_eq!(code_address(0x0000_0200), None); // no Thumb bit
        assert_eq!(code_address(0), None);
    }

    #[test]
    fn test_reserved_slots_skipped() {
        let mut words = [0u32; VECTOR_COUNT];
        for slot in RESERVED_SLOTS {
            words[slot] = 0x0000_0101;
        }
        words[2] = 0x0000_4001;
        assert_eq!(extract_code_vectors(&words), vec![0x0000_4000]);
    }

    #[test]
    fn test_thumb_marked_null_vector_skipped() {
        let mut words = [0u32; VECTOR_COUNT];
        words[1] = 0x0800_0201;
        words[2] = 0x0000_0001;
        words[3] = 0x0800_0301;
        let vectors = extract_code_vectors(&words);
        assert_eq!(vectors, vec![0x0800_0200, 0x0800_0300]);
        assert!(vectors.iter().all(|&v| v > 0));
    }

    #[test]
    fn test_slots_past_scan_limit_ignored() {
        let mut words = [0u32; VECTOR_COUNT];
        words[SCANNED_VECTORS - 1] = 0x0000_3001;
        words[SCANNED_VECTORS] = 0x0000_0011;
        words[VECTOR_COUNT - 1] = 0x0000_0021;
        assert_eq!(extract_code_vectors(&words), vec![0x0000_3000]);
    }

    #[test]
    fn test_extracted_addresses_are_even_and_in_flash() {
        let words: Vec<u32> = (0..VECTOR_COUNT as u32)
            .map(|i| i.wrapping_mul(0x0917_3A4B) ^ 0x1FFF_0001)
            .collect();
        for v in extract_code_vectors(&words) {
            assert_eq!(v & 1, 0);
            assert!(v > 0 && v < MAX_FLASH_ADDR);
        }
    }

    #[test]
    fn test_decode_both_orders() {
        let mut prefix = [0u8; VECTOR_COUNT * 4];
        prefix[4..8].copy_from_slice(&[0x01, 0x02, 0x00, 0x00]);

        let le = VectorTable::decode(&prefix, Endianness::Little);
        assert_eq!(le.reset_vector(), 0x0000_0201);
        assert_eq!(le.endianness(), Endianness::Little);

        let be = VectorTable::decode(&prefix, Endianness::Big);
        assert_eq!(be.reset_vector(), 0x0102_0000);
        assert_eq!(be.word(VECTOR_COUNT), None);
    }
}
