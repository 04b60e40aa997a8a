//! blobprobe - Load Parameter Detection for Raw Firmware
//!
//! Raw firmware dumps carry no container format, so before they can be
//! disassembled somebody has to guess the architecture, the address the
//! image is loaded at and where execution starts. This library makes those
//! guesses from the bytes alone.
//!
//! # Features
//!
//! - **Vector Table Detection**: Recognizes ARM Cortex-M interrupt vector
//!   tables, their byte order, load address and reset vector
//! - **Heuristic Fallback**: Names the ISA family of blobs without a vector
//!   table using instruction pattern scoring
//! - **Stream Friendly**: Every detector restores the stream position, so
//!   detectors can be chained over one open file
//! - **Injected Diagnostics**: Analysis events go to a caller-supplied sink
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use blobprobe::{probe_file, ProbeOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     match probe_file("firmware.bin", &ProbeOptions::new())? {
//!         Some(detection) => println!("{}: {}", detection.detector, detection.guess),
//!         None => println!("unknown"),
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod classifier;
pub mod diagnostics;
pub mod error;
pub mod initial;
pub mod ivt;
pub mod stream;
pub mod types;

pub use classifier::{ArchClassifier, HeuristicClassifier};
pub use diagnostics::{Diagnostic, DiagnosticSink, NullSink, RecordingSink, TracingSink};
pub use error::{DetectError, Result};
pub use initial::{probe_file, Detection, InitialDetector, Pipeline};
pub use ivt::{analyze_prefix, detect_arm_ivt, detect_arm_ivt_with_sink, IvtAnalysis};
pub use types::{Arch, Endianness, InitialGuess, IsaFamily, ProbeOptions};

use std::io::Cursor;

/// Run the default pipeline over an in-memory image.
///
/// # Example
///
/// ```rust
/// use blobprobe::{probe_bytes, Arch, ProbeOptions};
///
/// let mut image = vec![0u8; 256];
/// image[0..4].copy_from_slice(&0x2000_0400u32.to_be_bytes());
/// image[4..8].copy_from_slice(&0x0000_0401u32.to_be_bytes());
///
/// let detection = probe_bytes(&image, &ProbeOptions::new()).unwrap();
/// assert_eq!(detection.guess.arch(), Some(Arch::ArmBigEndian));
/// ```
pub fn probe_bytes(data: &[u8], options: &ProbeOptions) -> Option<Detection> {
    let mut cursor = Cursor::new(data);
    Pipeline::new(options).run(&mut cursor, &TracingSink)
}

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
