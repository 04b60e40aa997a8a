//! blobprobe CLI
//!
//! Command-line tool for guessing architecture, load address and entry
//! point of raw firmware images.

use anyhow::Context;
use blobprobe::initial::report_detection;
use blobprobe::{Arch, Detection, Pipeline, ProbeOptions, TracingSink};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Raw firmware load parameter detector.
///
/// Detects ARM Cortex-M vector tables to recover byte order, base address
/// and entry point, and falls back to ISA classification otherwise.
#[derive(Parser, Debug)]
#[command(name = "blobprobe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file(s) to analyze
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "human")]
    format: OutputFormat,

    /// Analysis mode
    #[arg(short, long, default_value = "normal")]
    mode: AnalysisMode,

    /// Minimum classifier confidence (0.0 - 1.0)
    #[arg(long, env = "BLOBPROBE_MIN_CONFIDENCE")]
    min_confidence: Option<f64>,

    /// Skip the classifier when no vector table is found
    #[arg(long)]
    no_fallback: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (only output essential info)
    #[arg(short, long)]
    quiet: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
    /// Compact single-line output
    Short,
}

/// Analysis mode options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum AnalysisMode {
    /// Normal analysis (default)
    Normal,
    /// Fast analysis (smaller scan budget)
    Fast,
    /// Thorough analysis (larger scan budget, finer windows)
    Thorough,
}

fn options_from_args(args: &Args) -> ProbeOptions {
    let mut opts = match args.mode {
        AnalysisMode::Normal => ProbeOptions::new(),
        AnalysisMode::Fast => ProbeOptions::fast(),
        AnalysisMode::Thorough => ProbeOptions::thorough(),
    };
    if let Some(min_confidence) = args.min_confidence {
        opts.min_confidence = min_confidence.clamp(0.0, 1.0);
    }
    opts.classifier_fallback = !args.no_fallback;
    opts
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging if verbose
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("blobprobe=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    let options = options_from_args(&args);
    let pipeline = Pipeline::new(&options);
    let mut success = true;

    for path in &args.files {
        if let Err(e) = analyze_file(path, &pipeline, &args) {
            if !args.quiet {
                eprintln!("Error analyzing {}: {:#}", path.display(), e);
            }
            success = false;
        }
    }

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn analyze_file(path: &Path, pipeline: &Pipeline, args: &Args) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let detection = pipeline.run(&mut reader, &TracingSink);
    report_detection(detection.as_ref(), &TracingSink);

    match args.format {
        OutputFormat::Human => print_human(detection.as_ref(), path, &mut reader, args)?,
        OutputFormat::Json => print_json(detection.as_ref(), path)?,
        OutputFormat::Short => print_short(detection.as_ref(), path),
    }

    Ok(())
}

fn hex_or_none(value: Option<u32>) -> String {
    value.map_or_else(|| "none".to_string(), |v| format!("0x{:08X}", v))
}

fn print_human(
    detection: Option<&Detection>,
    path: &Path,
    reader: &mut impl Read,
    args: &Args,
) -> anyhow::Result<()> {
    let Some(detection) = detection else {
        println!("{}: unknown", path.display());
        return Ok(());
    };
    let guess = detection.guess;

    if args.quiet {
        println!("{}: {}", path.display(), guess);
        return Ok(());
    }

    println!("File: {}", path.display());
    if let Some(arch) = guess.arch() {
        println!("  Arch:       {}", arch);
        println!("  Endianness: {}", arch.endianness());
        if let Arch::Classified(family) = arch {
            println!("  Family:     {}", family.name());
        }
    }
    println!("  Base:       {}", hex_or_none(guess.base_address()));
    println!("  Entry:      {}", hex_or_none(guess.entry_point()));

    if args.verbose {
        println!("  Detector:   {}", detection.detector);
        let mut head = [0u8; 16];
        let n = reader.read(&mut head)?;
        println!("  Head:       {}", hex::encode(&head[..n]));
    }

    println!();
    Ok(())
}

fn print_json(detection: Option<&Detection>, path: &Path) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct JsonOutput {
        file: String,
        detector: Option<&'static str>,
        arch: Option<String>,
        endianness: Option<String>,
        base_address: Option<String>,
        entry_point: Option<String>,
    }

    let guess = detection.map(|d| d.guess).unwrap_or_default();
    let output = JsonOutput {
        file: path.display().to_string(),
        detector: detection.map(|d| d.detector),
        arch: guess.arch().map(|a| a.to_string()),
        endianness: guess.arch().map(|a| a.endianness().to_string()),
        base_address: guess.base_address().map(|v| format!("0x{:08X}", v)),
        entry_point: guess.entry_point().map(|v| format!("0x{:08X}", v)),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_short(detection: Option<&Detection>, path: &Path) {
    let guess = detection.map(|d| d.guess).unwrap_or_default();
    let arch = guess
        .arch()
        .map_or_else(|| "unknown".to_string(), |a| a.to_string());

    println!(
        "{}\t{}\t{}\t{}",
        path.display(),
        arch,
        hex_or_none(guess.base_address()),
        hex_or_none(guess.entry_point())
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from(["blobprobe", "fw.bin"]).unwrap();
        assert_eq!(args.files.len(), 1);
        assert!(!args.verbose);
        assert!(!args.no_fallback);
    }

    #[test]
    fn test_multiple_files() {
        let args = Args::try_parse_from(["blobprobe", "a.bin", "b.bin"]).unwrap();
        assert_eq!(args.files.len(), 2);
    }

    #[test]
    fn test_format_options() {
        let args = Args::try_parse_from(["blobprobe", "-f", "json", "fw.bin"]).unwrap();
        assert!(matches!(args.format, OutputFormat::Json));
    }

    #[test]
    fn test_options_from_args() {
        let args = Args::try_parse_from([
            "blobprobe",
            "-m",
            "fast",
            "--min-confidence",
            "0.75",
            "--no-fallback",
            "fw.bin",
        ])
        .unwrap();
        let opts = options_from_args(&args);
        assert_eq!(opts.max_scan_bytes, ProbeOptions::fast().max_scan_bytes);
        assert!((opts.min_confidence - 0.75).abs() < f64::EPSILON);
        assert!(!opts.classifier_fallback);
    }

    #[test]
    fn test_hex_or_none() {
        assert_eq!(hex_or_none(Some(0x201)), "0x00000201");
        assert_eq!(hex_or_none(None), "none");
    }
}
