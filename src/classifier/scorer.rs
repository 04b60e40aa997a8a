//! Architecture-specific instruction pattern scoring.
//!
//! Each scoring function analyzes raw bytes for patterns characteristic
//! of one ISA family, returning a score that represents the likelihood
//! that the data contains code for that family.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// ARM32 condition code for "always".
const COND_AL: u32 = 0xE;

/// Iterate aligned 32-bit little-endian words.
fn le_words(data: &[u8]) -> impl Iterator<Item = u32> + '_ {
    data.chunks_exact(4).map(LittleEndian::read_u32)
}

/// Iterate aligned 32-bit big-endian words.
fn be_words(data: &[u8]) -> impl Iterator<Item = u32> + '_ {
    data.chunks_exact(4).map(BigEndian::read_u32)
}

/// Score likelihood of ARM32 code (ARM mode only).
///
/// Looks for:
/// - Condition codes in bits [31:28], AL dominating
/// - Common instructions (NOP, BX LR, PUSH, POP, BL)
/// - Load/store and data-processing encodings
pub fn score_arm(data: &[u8]) -> i64 {
    let mut score: i64 = 0;
    let mut consecutive_zeros = 0u32;

    for word in le_words(data) {
        if word == 0x0000_0000 {
            consecutive_zeros += 1;
            if consecutive_zeros > 2 {
                score -= 5;
            }
            continue;
        }
        consecutive_zeros = 0;

        let cond = word >> 28;
        if cond == COND_AL {
            score += 3;
        }

        match word {
            0xE1A0_0000 | 0xE320_F000 => score += 20, // NOP / NOP hint
            0xE12F_FF1E => score += 25,               // BX LR
            _ => {}
        }

        // PUSH / POP {..}
        if (word & 0xFFFF_0000) == 0xE92D_0000 || (word & 0xFFFF_0000) == 0xE8BD_0000 {
            score += 15;
        }

        if cond <= COND_AL {
            // BL
            if (word & 0x0F00_0000) == 0x0B00_0000 {
                score += 8;
            }
            // LDR/STR immediate
            if (word & 0x0E00_0000) == 0x0400_0000 {
                score += 3;
            }
        }

        if word == 0xFFFF_FFFF {
            score -= 10;
        }
    }

    score.max(0)
}

/// Score likelihood of Thumb/Thumb-2 code.
///
/// Walks halfwords, stepping over 32-bit Thumb-2 encodings.
pub fn score_thumb(data: &[u8]) -> i64 {
    let mut score: i64 = 0;
    let mut consecutive_zeros = 0u32;
    let halfwords: Vec<u16> = data.chunks_exact(2).map(LittleEndian::read_u16).collect();

    let mut i = 0;
    while i < halfwords.len() {
        let hw = halfwords[i];

        if hw == 0x0000 {
            consecutive_zeros += 1;
            if consecutive_zeros > 4 {
                score -= 3;
            }
            i += 1;
            continue;
        }
        consecutive_zeros = 0;

        // 32-bit Thumb-2 encoding: top five bits 0b11101, 0b11110 or 0b11111
        let top5 = hw >> 11;
        if (0x1D..=0x1F).contains(&top5) && i + 1 < halfwords.len() {
            let lo = halfwords[i + 1];
            // BL
            if top5 == 0x1E && (lo & 0xD000) == 0xD000 {
                score += 10;
            }
            // PUSH.W / POP.W
            if hw == 0xE92D || hw == 0xE8BD {
                score += 15;
            }
            i += 2;
            continue;
        }

        match hw {
            0x4770 => score += 25, // BX LR
            0xBF00 => score += 10, // NOP
            0xFFFF => score -= 5,
            _ => {}
        }

        // PUSH {.., LR} / POP {.., PC}
        if (hw & 0xFF00) == 0xB500 || (hw & 0xFF00) == 0xBD00 {
            score += 20;
        } else if (hw & 0xFE00) == 0xB400 || (hw & 0xFE00) == 0xBC00 {
            score += 5;
        }

        // LDR Rt, [PC, #imm]
        if (hw & 0xF800) == 0x4800 {
            score += 2;
        }

        i += 1;
    }

    score.max(0)
}

/// Score likelihood of AArch64 code.
pub fn score_aarch64(data: &[u8]) -> i64 {
    let mut score: i64 = 0;

    for word in le_words(data) {
        match word {
            0xD503_201F => score += 20, // NOP
            0xD65F_03C0 => score += 30, // RET
            0xA9BF_7BFD => score += 30, // STP x29, x30, [sp, #-16]!
            0x0000_0000 | 0xFFFF_FFFF => score -= 5,
            _ => {}
        }

        // BL
        if (word >> 26) == 0x25 {
            score += 8;
        }
        // STP/LDP (64-bit, pre/post-index and offset forms)
        if (word & 0x7E00_0000) == 0x2800_0000 && (word >> 30) == 0x2 {
            score += 5;
        }
        // MRS / MSR
        if (word >> 20) == 0xD53 || (word >> 20) == 0xD51 {
            score += 15;
        }
    }

    score.max(0)
}

/// Score likelihood of x86/x86-64 code.
///
/// Looks for:
/// - Common opcodes (NOP, RET, CALL, PUSH EBP)
/// - Frame setup prologues
/// - REX-prefixed register moves
pub fn score_x86(data: &[u8]) -> i64 {
    let mut score: i64 = 0;

    for (i, &b) in data.iter().enumerate() {
        match b {
            0x90 => score += 5,        // NOP
            0xC3 => score += 10,       // RET
            0xCC => score += 8,        // INT3
            0x55 => score += 10,       // PUSH EBP
            0xE8 => score += 8,        // CALL rel32
            0x70..=0x7F => score += 3, // Jcc rel8
            _ => {}
        }

        let rest = &data[i..];
        if rest.starts_with(&[0x55, 0x48, 0x89, 0xE5]) || rest.starts_with(&[0x55, 0x89, 0xE5]) {
            score += 25;
        }
        if rest.starts_with(&[0x48, 0x89]) || rest.starts_with(&[0x48, 0x8B]) {
            score += 8;
        }
        if rest.starts_with(&[0x0F, 0x1F]) || rest.starts_with(&[0x0F, 0x05]) {
            score += 8;
        }

        if i % 4 == 0 && rest.len() >= 4 {
            let word = LittleEndian::read_u32(rest);
            if word == 0x0000_0000 || word == 0xFFFF_FFFF {
                score -= 5;
            }
        }
    }

    score.max(0)
}

fn score_mips_word(word: u32) -> i64 {
    let mut score = 0;
    match word {
        0x03E0_0008 => score += 30, // JR $ra
        0xFFFF_FFFF => score -= 5,
        _ => {}
    }
    match word & 0xFFFF_0000 {
        0x27BD_0000 => score += 15, // ADDIU $sp, $sp, imm
        0xAFBF_0000 | 0x8FBF_0000 => score += 15, // SW/LW $ra, imm($sp)
        _ => {}
    }
    // LUI with rs = 0
    if (word & 0xFFE0_0000) == 0x3C00_0000 {
        score += 5;
    }
    // JAL
    if (word >> 26) == 0x03 {
        score += 5;
    }
    score
}

/// Score likelihood of MIPS code in both byte orders.
///
/// Returns `(big_endian_score, little_endian_score)`.
pub fn score_mips(data: &[u8]) -> (i64, i64) {
    let be: i64 = be_words(data).map(score_mips_word).sum();
    let le: i64 = le_words(data).map(score_mips_word).sum();
    (be.max(0), le.max(0))
}

/// Score likelihood of 32-bit PowerPC code (big-endian).
pub fn score_ppc(data: &[u8]) -> i64 {
    let mut score: i64 = 0;

    for word in be_words(data) {
        match word {
            0x4E80_0020 => score += 30, // BLR
            0x7C08_02A6 => score += 25, // MFLR r0
            0x7C08_03A6 => score += 25, // MTLR r0
            0x6000_0000 => score += 10, // NOP
            0x0000_0000 | 0xFFFF_FFFF => score -= 5,
            _ => {}
        }
        // STWU r1, imm(r1)
        if (word & 0xFFFF_0000) == 0x9421_0000 {
            score += 20;
        }
        // BL
        if (word >> 26) == 18 && (word & 0x3) == 0x1 {
            score += 5;
        }
    }

    score.max(0)
}

/// Score likelihood of RISC-V code, with the compressed extension.
pub fn score_riscv(data: &[u8]) -> i64 {
    let mut score: i64 = 0;
    let mut i = 0;

    while i + 2 <= data.len() {
        let half = LittleEndian::read_u16(&data[i..]);

        if half & 0x3 == 0x3 {
            if i + 4 > data.len() {
                break;
            }
            let word = LittleEndian::read_u32(&data[i..]);
            match word {
                0x0000_0013 => score += 25, // NOP
                0x0000_8067 => score += 30, // RET
                0xFFFF_FFFF => score -= 5,
                _ => {}
            }
            // ADDI sp, sp, imm
            if (word & 0x000F_FFFF) == 0x0001_0113 {
                score += 15;
            }
            // SW/SD ra, imm(sp)
            if (word & 0x01FF_F07F) == 0x0011_2023 || (word & 0x01FF_F07F) == 0x0011_3023 {
                score += 15;
            }
            i += 4;
        } else {
            match half {
                0x0000 => score -= 5, // defined illegal
                0x8082 => score += 25, // C.RET
                0x0001 => score += 5,  // C.NOP
                _ => {}
            }
            i += 2;
        }
    }

    score.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_return_and_push() {
        let data = [
            0x00, 0x48, 0x2D, 0xE9, // push {fp, lr}
            0x00, 0x00, 0xA0, 0xE1, // nop
            0x00, 0x88, 0xBD, 0xE8, // pop {fp, pc}
            0x1E, 0xFF, 0x2F, 0xE1, // bx lr
        ];
        assert!(score_arm(&data) > score_aarch64(&data));
        assert!(score_arm(&data) >= 60);
    }

    #[test]
    fn test_thumb_prologue() {
        let data = [
            0x80, 0xB5, // push {r7, lr}
            0x00, 0xAF, // add r7, sp, #0
            0x00, 0xBF, // nop
            0x80, 0xBD, // pop {r7, pc}
            0x70, 0x47, // bx lr
            0x00, 0xBF, // nop
        ];
        assert!(score_thumb(&data) > score_arm(&data));
    }

    #[test]
    fn test_mips_byte_order() {
        let data = [
            0x27, 0xBD, 0xFF, 0xE0, // addiu sp, sp, -32
            0xAF, 0xBF, 0x00, 0x1C, // sw ra, 28(sp)
            0x8F, 0xBF, 0x00, 0x1C, // lw ra, 28(sp)
            0x03, 0xE0, 0x00, 0x08, // jr ra
        ];
        let (be, le) = score_mips(&data);
        assert!(be > le);
    }

    #[test]
    fn test_zero_data_scores_nothing() {
        let data = [0u8; 64];
        assert_eq!(score_arm(&data), 0);
        assert_eq!(score_thumb(&data), 0);
        assert_eq!(score_aarch64(&data), 0);
        assert_eq!(score_x86(&data), 0);
        assert_eq!(score_mips(&data), (0, 0));
        assert_eq!(score_ppc(&data), 0);
        assert_eq!(score_riscv(&data), 0);
    }
}
