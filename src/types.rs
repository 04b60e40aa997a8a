//! Core types for blob probing.
//!
//! This module defines the values shared by every detector: byte order,
//! architecture tags, the `(arch, base, entry)` guess handed to callers,
//! and the probe options.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte ordering (endianness).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Little-endian byte order.
    #[default]
    Little,
    /// Big-endian byte order.
    Big,
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => write!(f, "little"),
            Endianness::Big => write!(f, "big"),
        }
    }
}

/// Architecture families the byte-pattern classifier can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsaFamily {
    /// ARM32 (A32), little-endian.
    Arm,
    /// Thumb / Thumb-2 (T32), little-endian.
    Thumb,
    /// AArch64 (A64).
    AArch64,
    /// x86 / x86-64.
    X86,
    /// MIPS, big-endian.
    Mips,
    /// MIPS, little-endian.
    MipsEl,
    /// PowerPC, big-endian.
    Ppc,
    /// RISC-V (RV32/RV64 with compressed).
    RiscV,
}

impl IsaFamily {
    /// All families, in the order ties are broken.
    pub const ALL: [IsaFamily; 8] = [
        IsaFamily::Arm,
        IsaFamily::Thumb,
        IsaFamily::AArch64,
        IsaFamily::X86,
        IsaFamily::Mips,
        IsaFamily::MipsEl,
        IsaFamily::Ppc,
        IsaFamily::RiscV,
    ];

    /// Returns a human-readable name for this family.
    pub fn name(&self) -> &'static str {
        match self {
            IsaFamily::Arm => "ARM (32-bit)",
            IsaFamily::Thumb => "ARM Thumb",
            IsaFamily::AArch64 => "AArch64 (ARM64)",
            IsaFamily::X86 => "x86",
            IsaFamily::Mips => "MIPS (big-endian)",
            IsaFamily::MipsEl => "MIPS (little-endian)",
            IsaFamily::Ppc => "PowerPC",
            IsaFamily::RiscV => "RISC-V",
        }
    }

    /// Short lowercase label, as downstream loaders expect it.
    pub fn label(&self) -> &'static str {
        match self {
            IsaFamily::Arm => "arm",
            IsaFamily::Thumb => "armthumb",
            IsaFamily::AArch64 => "aarch64",
            IsaFamily::X86 => "x86",
            IsaFamily::Mips => "mips",
            IsaFamily::MipsEl => "mipsel",
            IsaFamily::Ppc => "powerpc",
            IsaFamily::RiscV => "riscv",
        }
    }

    /// Byte order the family's code is scored in.
    pub fn endianness(&self) -> Endianness {
        match self {
            IsaFamily::Mips | IsaFamily::Ppc => Endianness::Big,
            _ => Endianness::Little,
        }
    }
}

impl fmt::Display for IsaFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Architecture identifier handed to later stages.
///
/// Opaque to the detectors beyond the distinction they draw: an IVT in
/// little-endian order means a Cortex-M part, one in big-endian order means
/// a classic ARM core. Everything else comes from the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    /// ARM Cortex-M, little-endian.
    ArmCortexM,
    /// Classic ARM, big-endian.
    ArmBigEndian,
    /// Family reported by the byte-pattern classifier.
    Classified(IsaFamily),
}

impl Arch {
    /// Architecture implied by the byte order of a detected vector table.
    pub fn for_ivt(endianness: Endianness) -> Self {
        match endianness {
            Endianness::Little => Arch::ArmCortexM,
            Endianness::Big => Arch::ArmBigEndian,
        }
    }

    /// Byte order of the architecture.
    pub fn endianness(&self) -> Endianness {
        match self {
            Arch::ArmCortexM => Endianness::Little,
            Arch::ArmBigEndian => Endianness::Big,
            Arch::Classified(family) => family.endianness(),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::ArmCortexM => write!(f, "armcortexm"),
            Arch::ArmBigEndian => write!(f, "armbe"),
            Arch::Classified(family) => write!(f, "{}", family),
        }
    }
}

/// The `(arch, base, entry)` triple a detector produces.
///
/// Either empty, architecture-only, or fully populated. A base address or
/// entry point without an architecture cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct InitialGuess {
    arch: Option<Arch>,
    base_address: Option<u32>,
    entry_point: Option<u32>,
}

impl InitialGuess {
    /// The rejection result: nothing was detected.
    pub const fn empty() -> Self {
        Self {
            arch: None,
            base_address: None,
            entry_point: None,
        }
    }

    /// A fully populated guess.
    pub const fn full(arch: Arch, base_address: u32, entry_point: u32) -> Self {
        Self {
            arch: Some(arch),
            base_address: Some(base_address),
            entry_point: Some(entry_point),
        }
    }

    /// Architecture known, load parameters unknown.
    pub const fn arch_only(arch: Arch) -> Self {
        Self {
            arch: Some(arch),
            base_address: None,
            entry_point: None,
        }
    }

    /// Detected architecture.
    pub fn arch(&self) -> Option<Arch> {
        self.arch
    }

    /// Estimated load address.
    pub fn base_address(&self) -> Option<u32> {
        self.base_address
    }

    /// Estimated entry point.
    pub fn entry_point(&self) -> Option<u32> {
        self.entry_point
    }

    /// True when the detector found nothing.
    pub fn is_empty(&self) -> bool {
        self.arch.is_none()
    }

    /// Split into the raw triple.
    pub fn into_parts(self) -> (Option<Arch>, Option<u32>, Option<u32>) {
        (self.arch, self.base_address, self.entry_point)
    }
}

impl fmt::Display for InitialGuess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn hex(v: Option<u32>) -> String {
            v.map_or_else(|| "none".to_string(), |v| format!("0x{:08X}", v))
        }

        match self.arch {
            Some(arch) => write!(
                f,
                "{} base={} entry={}",
                arch,
                hex(self.base_address),
                hex(self.entry_point)
            ),
            None => write!(f, "unknown"),
        }
    }
}

/// Options for probing behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOptions {
    /// Minimum confidence for a classifier verdict
    pub min_confidence: f64,
    /// Maximum bytes the classifier reads from the stream
    pub max_scan_bytes: usize,
    /// Window size for the sliding-window classifier pass
    pub window_size: usize,
    /// Votes a family needs to win the sliding-window pass
    pub min_window_votes: usize,
    /// Run the classifier when no vector table is found
    pub classifier_fallback: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            min_confidence: 0.3,
            max_scan_bytes: 1024 * 1024, // 1MB
            window_size: 0x1000,
            min_window_votes: 2,
            classifier_fallback: true,
        }
    }

    /// Create options for thorough analysis.
    pub fn thorough() -> Self {
        Self {
            min_confidence: 0.2,
            max_scan_bytes: 16 * 1024 * 1024, // 16MB
            window_size: 0x800,
            min_window_votes: 2,
            classifier_fallback: true,
        }
    }

    /// Create options for fast analysis.
    pub fn fast() -> Self {
        Self {
            min_confidence: 0.5,
            max_scan_bytes: 64 * 1024, // 64KB
            window_size: 0x4000,
            min_window_votes: 1,
            classifier_fallback: true,
        }
    }
}
