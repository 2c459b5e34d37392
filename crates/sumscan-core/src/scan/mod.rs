//! The scan driver.
//!
//! A scan walks every offset of the corpus once. At each offset it first
//! tests every defined structure (a hit cascades into sequenced-block
//! extraction immediately behind the matched window), then runs the
//! brute-force window enumeration for additive checksums under both byte
//! orders. Matches stream out through a [`MatchSink`](crate::sink::MatchSink)
//! as they are found; nothing is buffered, so an interrupted scan keeps
//! everything already written.
//!
//! ## Algorithm Overview
//!
//! 1. Precompute the total combination count from the corpus length
//! 2. For each offset: test defined structures, then enumerate windows
//! 3. A window matches when the raw byte sum of the message equals the
//!    decoded checksum field, evaluated independently per endianness
//! 4. Report progress whenever the completed count crosses a
//!    [`PROGRESS_INTERVAL`] boundary, and poll for cancellation at every
//!    offset

mod windows;

use crate::checksum::{additive_sum, decode_integer, Endianness};
use crate::error::Result;
use crate::sequence::{extract_blocks, SequenceConfig, SequencedBlock};
use crate::sink::MatchSink;
use crate::structure::DefinedStructure;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

pub use windows::{total_combinations, windows_at, Window, CHECKSUM_WIDTHS};

/// Default cap on candidate message length, in bytes
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 256;

/// Default cap on checksum field width, in bytes
pub const DEFAULT_MAX_CHECKSUM_LEN: usize = 256;

/// Progress is reported every time the completed count crosses a multiple
/// of this many units
pub const PROGRESS_INTERVAL: u64 = 1_000_000;

/// Configuration for a scan
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Longest message the brute-force search will consider
    pub max_message_len: usize,
    /// Widest checksum field the brute-force search will consider
    pub max_checksum_len: usize,
    /// Suppress matches whose checksum value is zero (filters the
    /// degenerate all-zero regions of real captures)
    pub exclude_zero: bool,
    /// Parameters for sequenced-block extraction behind structure matches
    pub sequence: SequenceConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            max_checksum_len: DEFAULT_MAX_CHECKSUM_LEN,
            exclude_zero: false,
            sequence: SequenceConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Creates a new scan config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum message length
    pub fn max_message_len(mut self, len: usize) -> Self {
        self.max_message_len = len;
        self
    }

    /// Sets the maximum checksum field width
    pub fn max_checksum_len(mut self, len: usize) -> Self {
        self.max_checksum_len = len;
        self
    }

    /// Sets whether zero-valued checksum matches are suppressed
    pub fn exclude_zero(mut self, exclude: bool) -> Self {
        self.exclude_zero = exclude;
        self
    }

    /// Sets the sequenced-block extraction parameters
    pub fn sequence(mut self, sequence: SequenceConfig) -> Self {
        self.sequence = sequence;
        self
    }
}

/// A brute-force window whose message sum equals its checksum field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMatch {
    /// Corpus offset of the first message byte
    pub start: usize,
    /// The message bytes
    pub message: Vec<u8>,
    /// Width of the checksum field, in bytes
    pub checksum_len: usize,
    /// The checksum value both sides agreed on
    pub value: u64,
    /// Byte order under which the checksum field decoded to `value`
    pub endianness: Endianness,
}

/// A defined-structure match together with the block sequence behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureHit {
    /// Name of the structure that matched
    pub name: String,
    /// Corpus offset of the first header byte
    pub start: usize,
    /// The full matched window, checksum byte included
    pub bytes: Vec<u8>,
    /// Sequenced blocks extracted immediately after the window
    pub blocks: Vec<SequencedBlock>,
}

/// Progress snapshot passed to the reporting callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Units finished so far
    pub completed: u64,
    /// Total units the full scan will process
    pub total: u64,
}

impl Progress {
    /// Completed fraction as a percentage, 100.0 for an empty scan
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed as f64 / self.total as f64) * 100.0
        }
    }
}

/// Final accounting for a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    /// Units actually processed
    pub completed: u64,
    /// Units a full scan would process
    pub total: u64,
    /// Brute-force matches written
    pub window_matches: u64,
    /// Structure matches written
    pub structure_matches: u64,
    /// True if the scan stopped on the cancellation flag
    pub cancelled: bool,
}

/// The scan driver
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    /// Creates a scanner with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scanner with custom configuration
    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Returns the scanner's configuration
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run a full scan over `data`.
    ///
    /// `structures` are tested at every offset before the brute-force pass.
    /// `cancel` is polled at each offset; when it reads true the scan stops
    /// and the summary reports `cancelled`. `on_progress` is invoked at
    /// [`PROGRESS_INTERVAL`] boundaries and once at completion.
    ///
    /// A structure whose checksum formula turns out to be unsupported is
    /// warned about and deactivated for the remainder of the scan; the
    /// brute-force pass and the other structures are unaffected. A sink
    /// write failure aborts the scan.
    pub fn scan(
        &self,
        data: &[u8],
        structures: &[DefinedStructure],
        sink: &mut dyn MatchSink,
        cancel: &AtomicBool,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<ScanSummary> {
        let n = data.len();
        let total = total_combinations(n, &self.config);
        let mut completed = 0u64;
        let mut window_matches = 0u64;
        let mut structure_matches = 0u64;
        let mut cancelled = false;
        let mut active = vec![true; structures.len()];

        debug!(
            "Starting scan of {} bytes ({} combinations, {} structures)",
            n,
            total,
            structures.len()
        );

        for start in 0..n {
            if cancel.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }

            for (index, structure) in structures.iter().enumerate() {
                if !active[index] {
                    continue;
                }
                match structure.match_at(data, start) {
                    Ok(Some(m)) => {
                        let blocks =
                            extract_blocks(data, start + m.bytes.len(), &self.config.sequence);
                        debug!(
                            "Structure '{}' matched at offset {} ({} blocks)",
                            m.name,
                            start,
                            blocks.len()
                        );
                        sink.structure_match(&StructureHit {
                            name: m.name,
                            start: m.start,
                            bytes: m.bytes,
                            blocks,
                        })?;
                        structure_matches += 1;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("disabling structure '{}': {}", structure.name, e);
                        active[index] = false;
                    }
                }
            }

            for window in windows_at(n, start, &self.config) {
                let message = &data[window.start..window.message_end()];
                let field = &data[window.message_end()..window.end()];
                let message_sum = additive_sum(message);

                for endianness in Endianness::BOTH {
                    let value = decode_integer(field, endianness);
                    if message_sum == value && !(self.config.exclude_zero && value == 0) {
                        sink.window_match(&WindowMatch {
                            start: window.start,
                            message: message.to_vec(),
                            checksum_len: window.checksum_len,
                            value,
                            endianness,
                        })?;
                        window_matches += 1;
                    }
                }

                completed += 2;
                if completed % PROGRESS_INTERVAL == 0 || completed == total {
                    on_progress(Progress { completed, total });
                }
            }
        }

        debug!(
            "Scan {}: {} window matches, {} structure matches ({}/{} units)",
            if cancelled { "cancelled" } else { "complete" },
            window_matches,
            structure_matches,
            completed,
            total
        );

        Ok(ScanSummary {
            completed,
            total,
            window_matches,
            structure_matches,
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumMethod;
    use crate::error::Error;
    use crate::sink::CountingSink;
    use pretty_assertions::assert_eq;

    /// Collects matches for order-sensitive assertions, optionally flipping
    /// a cancellation flag after a set number of window matches
    #[derive(Default)]
    struct RecordingSink<'a> {
        windows: Vec<WindowMatch>,
        structures: Vec<StructureHit>,
        cancel_after: Option<(usize, &'a AtomicBool)>,
    }

    impl MatchSink for RecordingSink<'_> {
        fn window_match(&mut self, m: &WindowMatch) -> Result<()> {
            self.windows.push(m.clone());
            if let Some((limit, flag)) = self.cancel_after {
                if self.windows.len() >= limit {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            Ok(())
        }

        fn structure_match(&mut self, hit: &StructureHit) -> Result<()> {
            self.structures.push(hit.clone());
            Ok(())
        }
    }

    fn run(
        scanner: &Scanner,
        data: &[u8],
        structures: &[DefinedStructure],
    ) -> (RecordingSink<'static>, ScanSummary) {
        let mut sink = RecordingSink::default();
        let cancel = AtomicBool::new(false);
        let summary = scanner
            .scan(data, structures, &mut sink, &cancel, |_| {})
            .unwrap();
        (sink, summary)
    }

    /// A corpus where a 3-byte message is followed by its sum as a 2-byte
    /// big-endian field, padded so no accidental matches appear
    fn planted_corpus() -> Vec<u8> {
        // 0xC8 + 0x96 + 0x64 = 0x01C2
        vec![0xC8, 0x96, 0x64, 0x01, 0xC2]
    }

    #[test]
    fn test_planted_big_endian_checksum_found_once() {
        let scanner = Scanner::new();
        let (sink, summary) = run(&scanner, &planted_corpus(), &[]);

        let planted: Vec<&WindowMatch> = sink
            .windows
            .iter()
            .filter(|m| m.start == 0 && m.message.len() == 3 && m.checksum_len == 2)
            .collect();
        assert_eq!(planted.len(), 1);
        assert_eq!(planted[0].endianness, Endianness::Big);
        assert_eq!(planted[0].value, 0x01C2);
        assert_eq!(summary.completed, summary.total);
        assert!(!summary.cancelled);
    }

    #[test]
    fn test_palindromic_checksum_matches_both_endiannesses() {
        // Sum 0x0303 reads the same under both byte orders
        let data = [0xFF, 0xFF, 0xFF, 0x06, 0x03, 0x03];
        let scanner = Scanner::new();
        let (sink, _) = run(&scanner, &data, &[]);
        let at_anchor: Vec<&WindowMatch> = sink
            .windows
            .iter()
            .filter(|m| m.start == 0 && m.message.len() == 4 && m.value == 0x0303)
            .collect();
        assert_eq!(at_anchor.len(), 2);
    }

    #[test]
    fn test_exclude_zero_policy() {
        // All-zero corpus: every window "matches" with value 0
        let data = [0x00; 8];
        let plain = Scanner::new();
        let (sink, _) = run(&plain, &data, &[]);
        assert!(!sink.windows.is_empty());

        let filtered = Scanner::with_config(ScanConfig::new().exclude_zero(true));
        let (sink, _) = run(&filtered, &data, &[]);
        assert!(sink.windows.is_empty());
    }

    #[test]
    fn test_progress_total_matches_completed() {
        let data: Vec<u8> = (0..40).collect();
        let scanner = Scanner::new();
        let mut last = None;
        let mut sink = CountingSink::default();
        let cancel = AtomicBool::new(false);
        let summary = scanner
            .scan(&data, &[], &mut sink, &cancel, |p| last = Some(p))
            .unwrap();
        assert_eq!(summary.completed, summary.total);
        // Final callback fires at completion
        let last = last.unwrap();
        assert_eq!(last.completed, last.total);
        assert_eq!(last.percent(), 100.0);
    }

    #[test]
    fn test_structure_cascades_into_blocks() {
        let structure = DefinedStructure {
            name: "beacon".to_string(),
            header: vec![0xAA, 0x55],
            data_length: 3,
            checksum: ChecksumMethod::additive(256),
        };
        let mut data = vec![0xAA, 0x55, 0x01, 0x02, 0x03, 0x06];
        data.push(0x40);
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data.push(0xF0);

        let scanner = Scanner::new();
        let (sink, summary) = run(&scanner, &data, std::slice::from_ref(&structure));
        assert_eq!(summary.structure_matches, 1);
        assert_eq!(sink.structures.len(), 1);
        let hit = &sink.structures[0];
        assert_eq!(hit.name, "beacon");
        assert_eq!(hit.start, 0);
        assert_eq!(hit.blocks.len(), 1);
        assert_eq!(hit.blocks[0].counter, 0x40);
    }

    #[test]
    fn test_unsupported_structure_degrades_not_aborts() {
        let broken = DefinedStructure {
            name: "broken".to_string(),
            header: vec![0xC8],
            data_length: 1,
            checksum: ChecksumMethod {
                kind: "crc16".to_string(),
                ..ChecksumMethod::additive(256)
            },
        };
        let scanner = Scanner::new();
        let data = planted_corpus();

        let (with_broken, summary) = run(&scanner, &data, std::slice::from_ref(&broken));
        let (without, _) = run(&scanner, &data, &[]);

        // Brute-force results are unaffected by the broken structure
        assert_eq!(with_broken.windows, without.windows);
        assert_eq!(summary.structure_matches, 0);
        assert!(!summary.cancelled);
    }

    #[test]
    fn test_cancelled_run_is_prefix_of_full_run() {
        // Enough planted matches that cancellation lands mid-stream
        let mut data = Vec::new();
        for _ in 0..6 {
            data.extend_from_slice(&planted_corpus());
        }
        let scanner = Scanner::new();
        let (full, _) = run(&scanner, &data, &[]);
        assert!(full.windows.len() >= 4);

        let cancel = AtomicBool::new(false);
        let mut partial = RecordingSink {
            cancel_after: Some((2, &cancel)),
            ..RecordingSink::default()
        };
        let summary = scanner
            .scan(&data, &[], &mut partial, &cancel, |_| {})
            .unwrap();

        assert!(summary.cancelled);
        assert!(summary.completed < summary.total);
        assert!(partial.windows.len() < full.windows.len());
        assert_eq!(
            partial.windows.as_slice(),
            &full.windows[..partial.windows.len()]
        );
    }

    #[test]
    fn test_pre_cancelled_scan_does_nothing() {
        let scanner = Scanner::new();
        let mut sink = CountingSink::default();
        let cancel = AtomicBool::new(true);
        let summary = scanner
            .scan(&planted_corpus(), &[], &mut sink, &cancel, |_| {})
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.completed, 0);
        assert_eq!(sink.windows, 0);
    }

    #[test]
    fn test_sink_failure_aborts_scan() {
        struct FailingSink;
        impl MatchSink for FailingSink {
            fn window_match(&mut self, _m: &WindowMatch) -> Result<()> {
                Err(Error::sink_write(
                    "match",
                    std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                ))
            }
        }
        let scanner = Scanner::new();
        let cancel = AtomicBool::new(false);
        let result = scanner.scan(&planted_corpus(), &[], &mut FailingSink, &cancel, |_| {});
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_corpus() {
        let scanner = Scanner::new();
        let (sink, summary) = run(&scanner, &[], &[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.completed, 0);
        assert!(sink.windows.is_empty());
    }
}
