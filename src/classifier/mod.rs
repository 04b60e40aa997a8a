//! Byte-pattern architecture classification.
//!
//! This is the fallback for blobs that do not start with a vector table.
//! It only names an ISA family; it cannot say where the image loads.
//!
//! [`HeuristicClassifier`] runs two passes and reconciles them:
//!
//! - a full pass scoring the whole (bounded) buffer at once;
//! - a sliding-window pass where every window votes for its own winner,
//!   which copes with blobs that mix code, data and padding.
//!
//! When the passes agree their answer is used. Otherwise the window vote
//! is preferred, and the full pass is the last resort.

pub mod scorer;

use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticSink, NullSink};
use crate::error::{DetectError, Result};
use crate::types::{IsaFamily, ProbeOptions};

/// Smallest window the sliding pass will use.
pub const MIN_WINDOW: usize = 64;

/// Share of padding bytes (0x00 / 0xFF) above which a window abstains.
const PADDING_RATIO: f64 = 0.9;

/// Classifies a byte buffer into an ISA family.
pub trait ArchClassifier {
    /// Best family for `data`, or `None` when unknown.
    fn classify(&self, data: &[u8]) -> Option<IsaFamily>;

    /// Same as [`ArchClassifier::classify`], reporting progress to `sink`.
    fn classify_with_sink(&self, data: &[u8], _sink: &dyn DiagnosticSink) -> Option<IsaFamily> {
        self.classify(data)
    }
}

/// Result of heuristic scoring for a single family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FamilyScore {
    /// The family being scored
    pub family: IsaFamily,
    /// Raw score (sum of pattern matches)
    pub raw_score: i64,
    /// Normalized confidence (0.0 - 1.0)
    pub confidence: f64,
}

/// Score every family, in [`IsaFamily::ALL`] order.
pub fn score_all(data: &[u8]) -> Vec<FamilyScore> {
    let (mips_be, mips_le) = scorer::score_mips(data);

    let mut scores: Vec<FamilyScore> = IsaFamily::ALL
        .iter()
        .map(|&family| {
            let raw_score = match family {
                IsaFamily::Arm => scorer::score_arm(data),
                IsaFamily::Thumb => scorer::score_thumb(data),
                IsaFamily::AArch64 => scorer::score_aarch64(data),
                IsaFamily::X86 => scorer::score_x86(data),
                IsaFamily::Mips => mips_be,
                IsaFamily::MipsEl => mips_le,
                IsaFamily::Ppc => scorer::score_ppc(data),
                IsaFamily::RiscV => scorer::score_riscv(data),
            };
            FamilyScore {
                family,
                raw_score,
                confidence: 0.0,
            }
        })
        .collect();

    let total_positive: i64 = scores.iter().map(|s| s.raw_score.max(0)).sum();
    if total_positive > 0 {
        for score in &mut scores {
            score.confidence = score.raw_score.max(0) as f64 / total_positive as f64;
        }
    }

    scores
}

/// Highest scoring family whose confidence reaches `min_confidence`.
///
/// Ties go to the family listed first in [`IsaFamily::ALL`].
pub fn best_family(data: &[u8], min_confidence: f64) -> Result<FamilyScore> {
    if data.len() < 4 {
        return Err(DetectError::TruncatedInput {
            expected: 4,
            actual: data.len(),
        });
    }

    let scores = score_all(data);
    let best = scores
        .iter()
        .copied()
        .reduce(|best, s| if s.raw_score > best.raw_score { s } else { best })
        .ok_or_else(|| DetectError::fault("no families scored"))?;

    if best.raw_score <= 0 || best.confidence < min_confidence {
        return Err(DetectError::HeuristicInconclusive {
            confidence: best.confidence * 100.0,
            threshold: min_confidence * 100.0,
        });
    }

    Ok(best)
}

/// Whether `window` is mostly erased flash or zero fill.
pub fn is_padding(window: &[u8]) -> bool {
    if window.is_empty() {
        return true;
    }
    let filler = memchr::memchr2_iter(0x00, 0xFF, window).count();
    filler as f64 / window.len() as f64 > PADDING_RATIO
}

/// Reconcile the full pass with the window vote.
pub fn combine(full: Option<IsaFamily>, windows: Option<IsaFamily>) -> Option<IsaFamily> {
    match (full, windows) {
        (Some(f), Some(w)) if f == w => Some(f),
        (_, Some(w)) => Some(w),
        (f, None) => f,
    }
}

/// Pattern-scoring classifier over the families in [`IsaFamily::ALL`].
#[derive(Debug, Clone, Default)]
pub struct HeuristicClassifier {
    options: ProbeOptions,
}

impl HeuristicClassifier {
    /// Create a classifier with the given options.
    pub fn new(options: ProbeOptions) -> Self {
        Self { options }
    }

    fn bounded<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[..self.options.max_scan_bytes.min(data.len())]
    }

    /// Score the whole buffer at once.
    pub fn classify_full(&self, data: &[u8]) -> Result<IsaFamily> {
        best_family(self.bounded(data), self.options.min_confidence).map(|s| s.family)
    }

    /// Per-window votes, in [`IsaFamily::ALL`] order.
    pub fn window_votes(&self, data: &[u8]) -> Vec<(IsaFamily, usize)> {
        let window_size = self.options.window_size.max(MIN_WINDOW);
        let mut votes: Vec<(IsaFamily, usize)> =
            IsaFamily::ALL.iter().map(|&family| (family, 0)).collect();

        for window in self.bounded(data).chunks(window_size) {
            if window.len() < MIN_WINDOW || is_padding(window) {
                continue;
            }
            if let Ok(best) = best_family(window, self.options.min_confidence) {
                if let Some(entry) = votes.iter_mut().find(|(f, _)| *f == best.family) {
                    entry.1 += 1;
                }
            }
        }

        votes
    }

    /// Family with the most window votes, if it has enough of them.
    pub fn classify_windows(&self, data: &[u8]) -> Option<IsaFamily> {
        self.window_votes(data)
            .into_iter()
            .reduce(|best, v| if v.1 > best.1 { v } else { best })
            .filter(|(_, count)| *count > 0 && *count >= self.options.min_window_votes)
            .map(|(family, _)| family)
    }
}

impl ArchClassifier for HeuristicClassifier {
    fn classify(&self, data: &[u8]) -> Option<IsaFamily> {
        self.classify_with_sink(data, &NullSink)
    }

    fn classify_with_sink(&self, data: &[u8], sink: &dyn DiagnosticSink) -> Option<IsaFamily> {
        let full = self.classify_full(data).ok();
        sink.record(Diagnostic::Classified {
            pass: "full",
            label: full.map(|f| f.label()),
        });

        let windows = self.classify_windows(data);
        sink.record(Diagnostic::Classified {
            pass: "window",
            label: windows.map(|f| f.label()),
        });

        combine(full, windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THUMB_FN: [u8; 12] = [
        0x80, 0xB5, // push {r7, lr}
        0x00, 0xAF, // add r7, sp, #0
        0x00, 0xBF, // nop
        0x80, 0xBD, // pop {r7, pc}
        0x70, 0x47, // bx lr
        0x00, 0xBF, // nop
    ];

    const PPC_FN: [u8; 16] = [
        0x94, 0x21, 0xFF, 0xF0, // stwu r1, -16(r1)
        0x7C, 0x08, 0x02, 0xA6, // mflr r0
        0x7C, 0x08, 0x03, 0xA6, // mtlr r0
        0x4E, 0x80, 0x00, 0x20, // blr
    ];

    fn repeat(pattern: &[u8], len: usize) -> Vec<u8> {
        pattern.iter().copied().cycle().take(len).collect()
    }

    #[test]
    fn test_combine_rules() {
        use IsaFamily::*;
        assert_eq!(combine(Some(Arm), Some(Arm)), Some(Arm));
        assert_eq!(combine(Some(Arm), Some(Thumb)), Some(Thumb));
        assert_eq!(combine(Some(Ppc), None), Some(Ppc));
        assert_eq!(combine(None, Some(Mips)), Some(Mips));
        assert_eq!(combine(None, None), None);
    }

    #[test]
    fn test_padding_detection() {
        assert!(is_padding(&[0xFF; 128]));
        assert!(is_padding(&[0x00; 128]));
        assert!(!is_padding(&repeat(&THUMB_FN, 128)));
    }

    #[test]
    fn test_full_pass_thumb() {
        let data = repeat(&THUMB_FN, 1200);
        let classifier = HeuristicClassifier::new(ProbeOptions::new());
        assert_eq!(classifier.classify_full(&data).unwrap(), IsaFamily::Thumb);
    }

    #[test]
    fn test_window_vote_ppc() {
        let mut data = repeat(&PPC_FN, 0x3000);
        data.extend(vec![0xFFu8; 0x2000]);
        let classifier = HeuristicClassifier::new(ProbeOptions::new());
        assert_eq!(classifier.classify_windows(&data), Some(IsaFamily::Ppc));
        assert_eq!(classifier.classify(&data), Some(IsaFamily::Ppc));
    }

    #[test]
    fn test_unknown_for_padding() {
        let classifier = HeuristicClassifier::default();
        assert_eq!(classifier.classify(&[0xFF; 0x4000]), None);
        assert_eq!(classifier.classify(&[0x00; 0x4000]), None);
        assert!(matches!(
            classifier.classify_full(&[0x00; 2]),
            Err(DetectError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_window_votes_threshold() {
        let data = repeat(&PPC_FN, 0x1000);
        let options = ProbeOptions {
            min_window_votes: 2,
            ..ProbeOptions::new()
        };
        // A single window cannot reach two votes
        assert_eq!(HeuristicClassifier::new(options).classify_windows(&data), None);
    }
}
