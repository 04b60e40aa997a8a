//! ARM Cortex-M interrupt vector table detection.
//!
//! Raw firmware dumps have no header, so the load address and entry point
//! have to be read off the vector table that Cortex-M images start with:
//!
//! 1. the first word must be a stack pointer inside SRAM, which also fixes
//!    the byte order ([`endian`]);
//! 2. slot 1 is the reset vector, taken as the entry point;
//! 3. the handler slots give a set of Thumb code addresses ([`vectors`]);
//! 4. the lowest of those, sector aligned, is the base address ([`base`]).
//!
//! [`detect_arm_ivt`] never fails. Anything that is not a vector table,
//! including truncated input and internal faults, yields
//! [`InitialGuess::empty`], and the stream is always left where it was.

pub mod base;
pub mod endian;
pub mod vectors;

use std::io::{Read, Seek};

use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticSink, NullSink, TracingSink};
use crate::error::{DetectError, Result};
use crate::stream::{read_up_to, RewindGuard};
use crate::types::{Arch, Endianness, InitialGuess};

pub use base::{estimate_base, BaseEstimate, BaseSource};
pub use endian::{detect_stack_pointer, StackPointer};
pub use vectors::{extract_code_vectors, VectorTable};

/// Bytes read from the start of the image (64 vectors of 4 bytes).
pub const IVT_SIZE: usize = vectors::VECTOR_COUNT * 4;

/// Name reported to the diagnostics sink.
pub const DETECTOR_NAME: &str = "arm_ivt";

/// Everything learned from a vector table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IvtAnalysis {
    /// Byte order of the table
    pub endianness: Endianness,
    /// Initial stack pointer (slot 0)
    pub stack_pointer: u32,
    /// Reset vector (slot 1), Thumb bit kept
    pub entry_point: u32,
    /// Accepted code vectors, Thumb bit cleared
    pub code_vectors: Vec<u32>,
    /// Estimated load address
    pub base: BaseEstimate,
}

impl IvtAnalysis {
    /// Architecture implied by the table's byte order.
    pub fn arch(&self) -> Arch {
        Arch::for_ivt(self.endianness)
    }

    /// Lowest and highest accepted code vector.
    pub fn vector_range(&self) -> Option<(u32, u32)> {
        let lo = self.code_vectors.iter().min()?;
        let hi = self.code_vectors.iter().max()?;
        Some((*lo, *hi))
    }

    /// The caller-facing triple.
    pub fn to_guess(&self) -> InitialGuess {
        InitialGuess::full(self.arch(), self.base.address, self.entry_point)
    }
}

/// Analyze an in-memory prefix. Only the first [`IVT_SIZE`] bytes are used.
pub fn analyze_prefix(data: &[u8]) -> Result<IvtAnalysis> {
    analyze_prefix_with_sink(data, &NullSink)
}

/// Analyze an in-memory prefix, reporting each stage to `sink`.
pub fn analyze_prefix_with_sink(data: &[u8], sink: &dyn DiagnosticSink) -> Result<IvtAnalysis> {
    let prefix: &[u8; IVT_SIZE] = data
        .get(..IVT_SIZE)
        .ok_or(DetectError::TruncatedInput {
            expected: IVT_SIZE,
            actual: data.len(),
        })?
        .try_into()
        .map_err(|_| DetectError::fault("vector table prefix has the wrong length"))?;

    let sp = detect_stack_pointer([prefix[0], prefix[1], prefix[2], prefix[3]])?;
    sink.record(Diagnostic::StackPointer {
        endianness: sp.endianness,
        value: sp.value,
    });

    let table = VectorTable::decode(prefix, sp.endianness);

    let entry_point = table.reset_vector();
    sink.record(Diagnostic::ResetVector { entry: entry_point });

    let code_vectors = table.code_vectors();
    let base = estimate_base(&code_vectors, Some(entry_point))
        .ok_or_else(|| DetectError::fault("no base address could be derived"))?;

    let analysis = IvtAnalysis {
        endianness: table.endianness(),
        stack_pointer: table.initial_stack_pointer(),
        entry_point,
        code_vectors,
        base,
    };

    sink.record(Diagnostic::CodeVectors {
        count: analysis.code_vectors.len(),
        range: analysis.vector_range(),
    });
    if analysis.base.source == BaseSource::ResetVectorMask {
        sink.record(Diagnostic::FallbackBase { entry: entry_point });
    }
    sink.record(Diagnostic::BaseAddress {
        base: analysis.base.address,
    });

    Ok(analysis)
}

/// Read the prefix from `stream` and analyze it. The stream position is
/// restored before this returns, on success and on error; failing to
/// restore it is itself an error.
pub fn read_and_analyze<S: Read + Seek + ?Sized>(
    stream: &mut S,
    sink: &dyn DiagnosticSink,
) -> Result<IvtAnalysis> {
    let mut guard = RewindGuard::new(stream, DETECTOR_NAME, sink)?;
    let read = read_up_to(&mut *guard, IVT_SIZE);
    guard.restore()?;
    let prefix = read?;
    if prefix.len() < IVT_SIZE {
        return Err(DetectError::TruncatedInput {
            expected: IVT_SIZE,
            actual: prefix.len(),
        });
    }
    analyze_prefix_with_sink(&prefix, sink)
}

/// Detect an ARM Cortex-M vector table, logging through `tracing`.
///
/// Returns `(arch, base, entry)` fully populated, or all `None`.
///
/// # Example
///
/// ```rust
/// use std::io::Cursor;
/// use blobprobe::detect_arm_ivt;
///
/// let mut image = vec![0u8; 256];
/// image[0..4].copy_from_slice(&0x2000_0100u32.to_le_bytes());
/// image[4..8].copy_from_slice(&0x0800_0201u32.to_le_bytes());
///
/// let mut stream = Cursor::new(image);
/// let (arch, base, entry) = detect_arm_ivt(&mut stream).into_parts();
/// assert!(arch.is_some());
/// assert_eq!(base, Some(0x0800_0000));
/// assert_eq!(entry, Some(0x0800_0201));
/// assert_eq!(stream.position(), 0);
/// ```
pub fn detect_arm_ivt<S: Read + Seek + ?Sized>(stream: &mut S) -> InitialGuess {
    detect_arm_ivt_with_sink(stream, &TracingSink)
}

/// Detect an ARM Cortex-M vector table, reporting to `sink`.
pub fn detect_arm_ivt_with_sink<S: Read + Seek + ?Sized>(
    stream: &mut S,
    sink: &dyn DiagnosticSink,
) -> InitialGuess {
    match read_and_analyze(stream, sink) {
        Ok(analysis) => analysis.to_guess(),
        Err(e) => {
            report_rejection(DETECTOR_NAME, &e, sink);
            InitialGuess::empty()
        }
    }
}

/// Route a detector error to the sink as a rejection or a fault.
pub(crate) fn report_rejection(detector: &'static str, err: &DetectError, sink: &dyn DiagnosticSink) {
    match err {
        DetectError::TruncatedInput { .. }
        | DetectError::NoPlausibleStackPointer { .. }
        | DetectError::HeuristicInconclusive { .. } => sink.record(Diagnostic::Rejected {
            detector,
            reason: err.to_string(),
        }),
        DetectError::Io(_) | DetectError::InternalFault { .. } => sink.record(Diagnostic::Fault {
            detector,
            message: err.to_string(),
        }),
    }
}
