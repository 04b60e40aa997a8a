//! Error types for blob probing.
//!
//! Every detector converts these into a rejection before returning to its
//! caller; they exist so the individual analysis stages can be tested and
//! so the diagnostics sink can say why a detector gave up.

use thiserror::Error;

/// Primary error type for the probe stages.
#[derive(Debug, Error)]
pub enum DetectError {
    /// IO error while reading or repositioning the stream.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer bytes were available than the analysis needs.
    #[error("Truncated input: expected {expected} bytes, got {actual}")]
    TruncatedInput { expected: usize, actual: usize },

    /// Neither byte order yields an initial stack pointer inside SRAM.
    #[error("No plausible stack pointer: 0x{little:08X} (LE) / 0x{big:08X} (BE)")]
    NoPlausibleStackPointer { little: u32, big: u32 },

    /// Unexpected computational or representation error.
    #[error("Internal fault: {message}")]
    InternalFault { message: String },

    /// Heuristic classification failed to settle on an architecture.
    #[error("Heuristic analysis inconclusive: confidence {confidence:.2}% below threshold {threshold:.2}%")]
    HeuristicInconclusive { confidence: f64, threshold: f64 },
}

impl DetectError {
    /// Build an [`DetectError::InternalFault`] from any message.
    pub fn fault(message: impl Into<String>) -> Self {
        DetectError::InternalFault {
            message: message.into(),
        }
    }
}

/// Result type alias for probe operations.
pub type Result<T> = std::result::Result<T, DetectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_display() {
        let err = DetectError::TruncatedInput {
            expected: 256,
            actual: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("256"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn test_stack_pointer_display() {
        let err = DetectError::NoPlausibleStackPointer {
            little: 0xDEAD_BEEF,
            big: 0xEFBE_ADDE,
        };
        let msg = err.to_string();
        assert!(msg.contains("DEADBEEF"));
        assert!(msg.contains("EFBEADDE"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: DetectError = io.into();
        assert!(matches!(err, DetectError::Io(_)));
    }
}
