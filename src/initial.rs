//! Ordered initial detectors.
//!
//! A raw blob is handed to each detector in turn until one of them names
//! an architecture. Detectors share the stream, so every one of them
//! restores the read position before returning.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Serialize;

use crate::classifier::{ArchClassifier, HeuristicClassifier};
use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::error::Result;
use crate::ivt;
use crate::stream::{read_up_to, ReadSeek, RewindGuard};
use crate::types::{Arch, InitialGuess, ProbeOptions};

/// One heuristic in the pipeline.
pub trait InitialDetector {
    /// Name used in diagnostics and results.
    fn name(&self) -> &'static str;

    /// Inspect `stream`, leaving its position unchanged.
    fn detect(&self, stream: &mut dyn ReadSeek, sink: &dyn DiagnosticSink) -> InitialGuess;
}

/// Cortex-M vector table detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct IvtDetector;

impl InitialDetector for IvtDetector {
    fn name(&self) -> &'static str {
        ivt::DETECTOR_NAME
    }

    fn detect(&self, stream: &mut dyn ReadSeek, sink: &dyn DiagnosticSink) -> InitialGuess {
        ivt::detect_arm_ivt_with_sink(stream, sink)
    }
}

/// Wraps an [`ArchClassifier`] as a detector. Only ever names the
/// architecture; base and entry stay unknown.
#[derive(Debug, Clone)]
pub struct ClassifierDetector<C> {
    classifier: C,
    max_scan_bytes: usize,
}

impl<C: ArchClassifier> ClassifierDetector<C> {
    /// Classify at most `max_scan_bytes` from the current position.
    pub fn new(classifier: C, max_scan_bytes: usize) -> Self {
        Self {
            classifier,
            max_scan_bytes,
        }
    }

    fn run(&self, stream: &mut dyn ReadSeek, sink: &dyn DiagnosticSink) -> Result<InitialGuess> {
        let mut guard = RewindGuard::new(stream, self.name(), sink)?;
        let read = read_up_to(&mut *guard, self.max_scan_bytes);
        guard.restore()?;
        let data = read?;

        match self.classifier.classify_with_sink(&data, sink) {
            Some(family) => Ok(InitialGuess::arch_only(Arch::Classified(family))),
            None => {
                sink.record(Diagnostic::Rejected {
                    detector: self.name(),
                    reason: "classifier returned unknown".to_string(),
                });
                Ok(InitialGuess::empty())
            }
        }
    }
}

impl<C: ArchClassifier> InitialDetector for ClassifierDetector<C> {
    fn name(&self) -> &'static str {
        "classifier"
    }

    fn detect(&self, stream: &mut dyn ReadSeek, sink: &dyn DiagnosticSink) -> InitialGuess {
        match self.run(stream, sink) {
            Ok(guess) => guess,
            Err(e) => {
                ivt::report_rejection(self.name(), &e, sink);
                InitialGuess::empty()
            }
        }
    }
}

/// A successful pipeline result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Detection {
    /// Detector that produced the guess
    pub detector: &'static str,
    /// The guess itself
    pub guess: InitialGuess,
}

/// Detectors tried in order, first architecture wins.
pub struct Pipeline {
    detectors: Vec<Box<dyn InitialDetector>>,
}

impl Pipeline {
    /// Vector table first, then the classifier unless disabled.
    pub fn new(options: &ProbeOptions) -> Self {
        let mut detectors: Vec<Box<dyn InitialDetector>> = vec![Box::new(IvtDetector)];
        if options.classifier_fallback {
            detectors.push(Box::new(ClassifierDetector::new(
                HeuristicClassifier::new(options.clone()),
                options.max_scan_bytes,
            )));
        }
        Self { detectors }
    }

    /// Use an explicit detector list.
    pub fn with_detectors(detectors: Vec<Box<dyn InitialDetector>>) -> Self {
        Self { detectors }
    }

    /// Names of the configured detectors, in order.
    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Run detectors until one names an architecture.
    pub fn run(&self, stream: &mut dyn ReadSeek, sink: &dyn DiagnosticSink) -> Option<Detection> {
        self.detectors.iter().find_map(|detector| {
            let guess = detector.detect(stream, sink);
            (!guess.is_empty()).then(|| Detection {
                detector: detector.name(),
                guess,
            })
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(&ProbeOptions::new())
    }
}

/// Probe a file with the default pipeline for `options`.
pub fn probe_file<P: AsRef<Path>>(path: P, options: &ProbeOptions) -> Result<Option<Detection>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    Ok(Pipeline::new(options).run(&mut reader, &TracingSink))
}

/// Record which detector answered, or that none did.
pub fn report_detection(detection: Option<&Detection>, sink: &dyn DiagnosticSink) {
    match detection {
        Some(detection) => sink.record(Diagnostic::Detected {
            detector: detection.detector,
        }),
        None => sink.record(Diagnostic::Rejected {
            detector: "pipeline",
            reason: "no detector recognized the input".to_string(),
        }),
    }
}
