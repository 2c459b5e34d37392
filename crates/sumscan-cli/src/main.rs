//! sumscan - Find unknown additive checksums in captured binary data
//!
//! This tool takes tabular hex captures (CSV exports, pasted hex dumps),
//! brute-forces every plausible message + checksum window for sum-style
//! checksums, and validates operator-declared message structures along with
//! the counter-tagged block sequences that follow them.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use sumscan_core::{
    load_structures_from_path, DefinedStructure, LineSink, Progress, ScanConfig, Scanner,
};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Find unknown additive checksums and known message structures in captured binary data
#[derive(Parser, Debug)]
#[command(name = "sumscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exhaustively scan a capture for checksums and defined structures
    Scan(ScanArgs),
    /// Sum hex values by hand (quick manual checksum calculator)
    Sum(SumArgs),
    /// Locate a byte pattern in a capture, reported by row and column
    Find(FindArgs),
}

#[derive(Args, Debug)]
struct ScanArgs {
    #[command(flatten)]
    input: InputMode,

    /// JSON file of defined message structures to validate
    #[arg(short, long)]
    structures: Option<PathBuf>,

    /// Output file for brute-force matches (ignored with --directory)
    #[arg(short, long, default_value = "results.txt")]
    output: PathBuf,

    /// Output file for structure matches (ignored with --directory)
    #[arg(long, default_value = "structures.txt")]
    structure_output: PathBuf,

    /// Suppress matches whose checksum value is zero
    #[arg(long)]
    exclude_zero: bool,

    /// Longest candidate message to consider, in bytes
    #[arg(long, default_value = "256")]
    max_message_len: usize,

    /// Widest checksum field to consider, in bytes
    #[arg(long, default_value = "256")]
    max_checksum_len: usize,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single hex capture to scan
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of captures; outputs are written next to each input
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SumArgs {
    /// Hex values to sum; read from stdin until a blank line when omitted
    values: Vec<String>,
}

#[derive(Args, Debug)]
struct FindArgs {
    /// Path to the hex capture to search
    #[arg(short, long)]
    file: PathBuf,

    /// Pattern bytes, e.g. 0x85 0x36 0xF7
    #[arg(required = true)]
    pattern: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match &cli.command {
        Command::Scan(args) => run_scan(args),
        Command::Sum(args) => run_sum(args),
        Command::Find(args) => run_find(args),
    }
}

// ---------------------------------------------------------------------------
// Hex token parsing
// ---------------------------------------------------------------------------

/// Parse one hex token into a byte, accepting both "1A" and "0x1A" forms.
/// Stray BOMs from spreadsheet exports are stripped first.
fn parse_hex_byte(token: &str) -> Option<u8> {
    let clean = token.trim_matches('\u{feff}').trim();
    let digits = clean
        .strip_prefix("0x")
        .or_else(|| clean.strip_prefix("0X"))
        .unwrap_or(clean);
    if digits.is_empty() {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

/// Split capture text into hex tokens: whitespace, commas, and semicolons
/// all separate values, so tab-separated pastes and CSV exports both work.
fn hex_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|t| !t.trim_matches('\u{feff}').trim().is_empty())
}

/// Tokenize capture text into a byte corpus.
///
/// Tokens that fail to parse as hex are skipped individually; the count of
/// skipped tokens is returned so the caller can complain once.
fn parse_hex_values(text: &str) -> (Vec<u8>, usize) {
    let mut corpus = Vec::new();
    let mut skipped = 0;
    for token in hex_tokens(text) {
        match parse_hex_byte(token) {
            Some(byte) => corpus.push(byte),
            None => {
                trace!("Skipping invalid hex token: {token}");
                skipped += 1;
            }
        }
    }
    (corpus, skipped)
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

fn run_scan(args: &ScanArgs) -> Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || cancel.store(true, Ordering::Relaxed))
            .context("Failed to install interrupt handler")?;
    }

    let structures = match &args.structures {
        Some(path) => {
            let structures = load_structures_from_path(path)
                .with_context(|| format!("Failed to read structures file: {}", path.display()))?;
            info!(
                "Loaded {} structure definition(s) from {}",
                structures.len(),
                path.display()
            );
            structures
        }
        None => Vec::new(),
    };

    let config = ScanConfig::new()
        .max_message_len(args.max_message_len)
        .max_checksum_len(args.max_checksum_len)
        .exclude_zero(args.exclude_zero);

    if let Some(ref file) = args.input.file {
        process_capture(
            file,
            &args.output,
            &args.structure_output,
            &config,
            &structures,
            &cancel,
        )
    } else if let Some(ref directory) = args.input.directory {
        process_directory(directory, &config, &structures, &cancel)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

/// Scan one capture file, writing both output channels
fn process_capture(
    input: &Path,
    output: &Path,
    structure_output: &Path,
    config: &ScanConfig,
    structures: &[DefinedStructure],
    cancel: &AtomicBool,
) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;
    let (corpus, skipped) = parse_hex_values(&text);
    if skipped > 0 {
        warn!(
            "Skipped {} invalid hex token(s) in {}",
            skipped,
            input.display()
        );
    }
    info!("Loaded {} hex values from {}", corpus.len(), input.display());

    let matches_out = fs::File::create(output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    let structures_out = fs::File::create(structure_output).with_context(|| {
        format!(
            "Failed to create structure output file: {}",
            structure_output.display()
        )
    })?;
    let mut sink = LineSink::new(matches_out, structures_out);

    let scanner = Scanner::with_config(config.clone());
    let summary = scanner.scan(&corpus, structures, &mut sink, cancel, |progress| {
        print!("\rProgress: {:.2}%", progress.percent());
        let _ = io::stdout().flush();
    })?;
    println!();

    let percent = Progress {
        completed: summary.completed,
        total: summary.total,
    }
    .percent();

    if summary.cancelled {
        println!(
            "Interrupted! Processed {} / {} combinations ({:.2}%)",
            summary.completed, summary.total, percent
        );
        println!("Results written so far saved to: {}", output.display());
    } else {
        println!(
            "Found {} checksum candidate(s) and {} structure match(es) in {}",
            summary.window_matches,
            summary.structure_matches,
            input.display()
        );
        debug!(
            "Wrote {} and {}",
            output.display(),
            structure_output.display()
        );
    }

    Ok(())
}

/// Scan every capture in a directory; output files land next to each input
fn process_directory(
    directory: &Path,
    config: &ScanConfig,
    structures: &[DefinedStructure],
    cancel: &AtomicBool,
) -> Result<()> {
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());
    let mut captures_processed = 0;

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            continue;
        }
        if !is_likely_capture(path) {
            trace!("Skipping non-capture: {}", path.display());
            continue;
        }

        let (output, structure_output) = sibling_outputs(path);
        debug!("Processing capture: {}", path.display());
        if let Err(e) =
            process_capture(path, &output, &structure_output, config, structures, cancel)
        {
            // Log error but continue with other files
            warn!("Error processing {}: {}", path.display(), e);
        }
        captures_processed += 1;

        if cancel.load(Ordering::Relaxed) {
            break;
        }
    }

    info!("Processed {} capture(s)", captures_processed);
    Ok(())
}

/// Heuristic to determine if a file looks like a hex capture
fn is_likely_capture(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    // Never rescan our own outputs
    if name.ends_with(".matches.txt") || name.ends_with(".structures.txt") {
        return false;
    }
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("csv") | Some("txt") | Some("hex") | Some("log")
    )
}

/// Output file pair for a capture, placed next to the input
fn sibling_outputs(input: &Path) -> (PathBuf, PathBuf) {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("capture");
    (
        input.with_file_name(format!("{stem}.matches.txt")),
        input.with_file_name(format!("{stem}.structures.txt")),
    )
}

// ---------------------------------------------------------------------------
// sum
// ---------------------------------------------------------------------------

fn run_sum(args: &SumArgs) -> Result<()> {
    let tokens = if args.values.is_empty() {
        read_stdin_tokens()?
    } else {
        args.values.clone()
    };

    let (total, skipped) = sum_hex_tokens(&tokens);
    if skipped > 0 {
        warn!("Skipped {skipped} invalid hex token(s)");
    }

    let result = total % 255;
    println!();
    println!("Sum: {total} (dec)");
    println!("Modulo 255: {result} (dec)");
    println!("Result in hex: 0x{result:02X}");
    Ok(())
}

/// Sum hex tokens of arbitrary width, counting the ones that don't parse
fn sum_hex_tokens(tokens: &[String]) -> (u64, usize) {
    let mut total = 0u64;
    let mut skipped = 0;
    for token in tokens {
        let clean = token.trim_matches('\u{feff}').trim();
        let digits = clean
            .strip_prefix("0x")
            .or_else(|| clean.strip_prefix("0X"))
            .unwrap_or(clean);
        match u64::from_str_radix(digits, 16) {
            Ok(value) => total += value,
            Err(_) => {
                warn!("Skipping invalid hex: {token}");
                skipped += 1;
            }
        }
    }
    (total, skipped)
}

/// Read whitespace-separated tokens from stdin until a blank line or EOF
fn read_stdin_tokens() -> Result<Vec<String>> {
    println!("Paste hex values (separated by tabs/spaces/newlines). End with an empty line:");
    let mut tokens = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            break;
        }
        tokens.extend(line.split_whitespace().map(str::to_string));
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// find
// ---------------------------------------------------------------------------

/// A hex capture parsed as a grid, keeping row/column provenance.
///
/// Cells that fail to parse still occupy a grid position so that reported
/// coordinates line up with the source file; they just never match.
struct HexGrid {
    cells: Vec<Option<u8>>,
    positions: Vec<(usize, usize)>,
}

impl HexGrid {
    fn parse(text: &str) -> Self {
        let mut cells = Vec::new();
        let mut positions = Vec::new();
        for (row, line) in text.lines().enumerate() {
            for (column, token) in line
                .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
                .filter(|t| !t.trim_matches('\u{feff}').trim().is_empty())
                .enumerate()
            {
                cells.push(parse_hex_byte(token));
                positions.push((row, column));
            }
        }
        Self { cells, positions }
    }

    /// All positions where the pattern starts, as (row, column)
    fn find_all(&self, pattern: &[u8]) -> Vec<(usize, usize)> {
        if pattern.is_empty() || pattern.len() > self.cells.len() {
            return Vec::new();
        }
        let mut matches = Vec::new();
        for i in 0..=self.cells.len() - pattern.len() {
            let hit = self.cells[i..i + pattern.len()]
                .iter()
                .zip(pattern)
                .all(|(cell, &wanted)| *cell == Some(wanted));
            if hit {
                matches.push(self.positions[i]);
            }
        }
        matches
    }
}

fn run_find(args: &FindArgs) -> Result<()> {
    let pattern: Vec<u8> = args
        .pattern
        .iter()
        .map(|token| {
            parse_hex_byte(token).with_context(|| format!("Invalid hex value: {token}"))
        })
        .collect::<Result<_>>()?;

    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read input file: {}", args.file.display()))?;
    let grid = HexGrid::parse(&text);
    let matches = grid.find_all(&pattern);

    if matches.is_empty() {
        println!("Pattern not found in {}", args.file.display());
    } else {
        println!("Found {} match(es):", matches.len());
        for (row, column) in matches {
            println!(
                "Pattern found starting at row {}, column {}",
                row + 1,
                column + 1
            );
        }
    }
    Ok(())
}
