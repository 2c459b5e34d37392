//! # sumscan-core
//!
//! A library for locating unknown additive checksums and known message
//! structures in captured binary protocol data.
//!
//! This crate provides the core functionality for:
//! - Exhaustively searching every message + checksum window of a byte corpus
//!   for sum-style checksums, under both byte orders
//! - Validating operator-supplied message structures (fixed headers, payload
//!   lengths, checksum formulas) at every offset
//! - Extracting counter-tagged block sequences that follow matched structures
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`checksum`]: Endianness, integer decoding, and checksum formulas
//! - [`scan`]: Window enumeration and the scan driver
//! - [`structure`]: Defined-structure records and matching
//! - [`sequence`]: Sequenced-block extraction
//! - [`sink`]: Streaming match output
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use sumscan_core::{CountingSink, Scanner};
//! use std::sync::atomic::AtomicBool;
//!
//! // A 3-byte message followed by its sum as a big-endian 16-bit field
//! let corpus = [0xC8, 0x96, 0x64, 0x01, 0xC2];
//!
//! let scanner = Scanner::new();
//! let mut sink = CountingSink::default();
//! let cancel = AtomicBool::new(false);
//! let summary = scanner.scan(&corpus, &[], &mut sink, &cancel, |_| {})?;
//!
//! assert!(sink.windows >= 1);
//! assert_eq!(summary.completed, summary.total);
//! # Ok::<(), sumscan_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! The [`MatchSink`] trait is the seam for custom output: implement it to
//! stream matches anywhere, with each call treated as the unit of
//! durability.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod checksum;
pub mod error;
pub mod scan;
pub mod sequence;
pub mod sink;
pub mod structure;

// Re-export primary types for convenience
pub use checksum::{additive_sum, decode_integer, ChecksumMethod, Endianness};
pub use error::{Error, Result};
pub use scan::{
    total_combinations, Progress, ScanConfig, ScanSummary, Scanner, StructureHit, Window,
    WindowMatch,
};
pub use sequence::{extract_blocks, SequenceConfig, SequencedBlock};
pub use sink::{CountingSink, LineSink, MatchSink, NullSink};
pub use structure::{load_structures, load_structures_from_path, DefinedStructure, StructureMatch};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
