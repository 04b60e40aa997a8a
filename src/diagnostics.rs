//! Diagnostics sink for detector events.
//!
//! Detectors never log directly. They report [`Diagnostic`] events to a
//! [`DiagnosticSink`] supplied by the caller, which keeps the analysis a
//! pure function of its input under test.

use std::cell::RefCell;

use crate::types::Endianness;

/// An event observed while probing.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A plausible initial stack pointer fixed the byte order.
    StackPointer { endianness: Endianness, value: u32 },
    /// Reset vector read from slot 1.
    ResetVector { entry: u32 },
    /// Code vectors accepted from the table.
    CodeVectors { count: usize, range: Option<(u32, u32)> },
    /// No usable code vector; base derived from the reset vector instead.
    FallbackBase { entry: u32 },
    /// Final base estimate.
    BaseAddress { base: u32 },
    /// A detector produced the pipeline's answer.
    Detected { detector: &'static str },
    /// A detector gave up.
    Rejected { detector: &'static str, reason: String },
    /// A detector hit an unexpected error.
    Fault { detector: &'static str, message: String },
    /// Classifier verdict for one pass.
    Classified { pass: &'static str, label: Option<&'static str> },
}

/// Receiver for [`Diagnostic`] events.
pub trait DiagnosticSink {
    /// Record one event.
    fn record(&self, event: Diagnostic);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, event: Diagnostic) {
        match event {
            Diagnostic::StackPointer { endianness, value } => {
                tracing::debug!(%endianness, "Found possible ARM IVT with initial SP {:#010x}", value);
            }
            Diagnostic::ResetVector { entry } => {
                tracing::debug!("Reset vector at {:#010x}", entry);
            }
            Diagnostic::CodeVectors { count, range } => {
                tracing::debug!("Found {} valid code vectors", count);
                if let Some((lo, hi)) = range {
                    tracing::debug!("Vector address range: {:#010x} - {:#010x}", lo, hi);
                }
            }
            Diagnostic::FallbackBase { entry } => {
                tracing::warn!(
                    "No valid code vectors found, falling back to reset vector mask ({:#010x})",
                    entry
                );
            }
            Diagnostic::BaseAddress { base } => {
                tracing::debug!("Estimated base address at {:#010x}", base);
            }
            Diagnostic::Detected { detector } => {
                tracing::info!(detector, "Detected");
            }
            Diagnostic::Rejected { detector, reason } => {
                tracing::debug!(detector, "Rejected: {}", reason);
            }
            Diagnostic::Fault { detector, message } => {
                tracing::error!(detector, error = %message, "Detector failed");
            }
            Diagnostic::Classified { pass, label } => {
                tracing::debug!(pass, "Classifier verdict: {}", label.unwrap_or("unknown"));
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _event: Diagnostic) {}
}

/// Keeps every event in order. Useful in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<Diagnostic>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far.
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events.borrow().clone()
    }

    /// True if any recorded event satisfies `pred`.
    pub fn contains(&self, pred: impl Fn(&Diagnostic) -> bool) -> bool {
        self.events.borrow().iter().any(pred)
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, event: Diagnostic) {
        self.events.borrow_mut().push(event);
    }
}
