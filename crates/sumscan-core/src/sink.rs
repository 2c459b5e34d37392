//! Match output sinks.
//!
//! The driver streams matches out as it finds them instead of collecting
//! them in memory; the [`MatchSink`] trait is the seam where they leave the
//! library. Implementations must treat each call as the unit of durability:
//! a long scan can be interrupted at any instant and everything already
//! written must survive, which is why [`LineSink`] flushes after every match.

use crate::error::{Error, Result};
use crate::scan::{StructureHit, WindowMatch};
use std::io::Write;

/// Receives matches as the scan produces them.
///
/// Both methods default to no-ops so a sink only interested in one channel
/// implements just that one. Returning an error aborts the scan.
pub trait MatchSink {
    /// Called for every brute-force window match
    fn window_match(&mut self, m: &WindowMatch) -> Result<()> {
        let _ = m;
        Ok(())
    }

    /// Called for every defined-structure match, with the block sequence
    /// extracted behind it
    fn structure_match(&mut self, hit: &StructureHit) -> Result<()> {
        let _ = hit;
        Ok(())
    }
}

/// A sink that discards all matches
pub struct NullSink;

impl MatchSink for NullSink {}

/// A sink that only counts what it receives
#[derive(Debug, Default)]
pub struct CountingSink {
    /// Number of brute-force window matches
    pub windows: usize,
    /// Number of defined-structure matches
    pub structures: usize,
    /// Total sequenced blocks across all structure matches
    pub blocks: usize,
}

impl MatchSink for CountingSink {
    fn window_match(&mut self, _m: &WindowMatch) -> Result<()> {
        self.windows += 1;
        Ok(())
    }

    fn structure_match(&mut self, hit: &StructureHit) -> Result<()> {
        self.structures += 1;
        self.blocks += hit.blocks.len();
        Ok(())
    }
}

/// A sink that writes one text line per match, flushed immediately.
///
/// Brute-force matches and structure matches go to separate writers, one
/// output channel each.
pub struct LineSink<W: Write, V: Write> {
    windows: W,
    structures: V,
}

impl<W: Write, V: Write> LineSink<W, V> {
    /// Creates a sink over the two output channels
    pub fn new(windows: W, structures: V) -> Self {
        Self {
            windows,
            structures,
        }
    }

    /// Consumes the sink, returning the underlying writers
    pub fn into_inner(self) -> (W, V) {
        (self.windows, self.structures)
    }
}

/// Renders bytes as space-separated two-digit hex: `AA 55 01`
pub fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders bytes as a bracketed list of `0x`-prefixed values: `[0xAA, 0x55]`
pub fn hex_list(bytes: &[u8]) -> String {
    let values: Vec<String> = bytes.iter().map(|b| format!("0x{b:02X}")).collect();
    format!("[{}]", values.join(", "))
}

impl<W: Write, V: Write> MatchSink for LineSink<W, V> {
    fn window_match(&mut self, m: &WindowMatch) -> Result<()> {
        writeln!(
            self.windows,
            "Index: {}, Length: {}, Message: {}, Checksum: 0x{:0width$X} ({})",
            m.start,
            m.message.len(),
            hex_list(&m.message),
            m.value,
            m.endianness.tag(),
            width = m.checksum_len * 2,
        )
        .and_then(|()| self.windows.flush())
        .map_err(|e| Error::sink_write("match", e))
    }

    fn structure_match(&mut self, hit: &StructureHit) -> Result<()> {
        writeln!(
            self.structures,
            "{} at offset {}: {}",
            hit.name,
            hit.start,
            hex_bytes(&hit.bytes)
        )
        .map_err(|e| Error::sink_write("structure", e))?;
        for block in &hit.blocks {
            writeln!(
                self.structures,
                "  0x{:02X}: {}",
                block.counter,
                hex_bytes(&block.bytes)
            )
            .map_err(|e| Error::sink_write("structure", e))?;
        }
        self.structures
            .flush()
            .map_err(|e| Error::sink_write("structure", e))
    }
}
