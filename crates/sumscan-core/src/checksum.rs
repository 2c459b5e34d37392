//! Checksum arithmetic.
//!
//! Pure numeric building blocks shared by the brute-force window search and
//! the defined-structure matcher: unsigned integer decoding in either byte
//! order, the raw additive byte sum, and the small family of named checksum
//! formulas that structure definitions can reference.

use crate::error::{Error, Result};
use serde::Deserialize;

/// Byte order used when interpreting a checksum field as an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    /// Most significant byte first
    Big,
    /// Least significant byte first
    Little,
}

impl Endianness {
    /// Both byte orders, in the order they are evaluated and reported
    pub const BOTH: [Endianness; 2] = [Endianness::Big, Endianness::Little];

    /// Lowercase tag used in match output lines
    pub fn tag(self) -> &'static str {
        match self {
            Endianness::Big => "big",
            Endianness::Little => "little",
        }
    }
}

/// Interpret a byte window as an unsigned integer in the given byte order.
///
/// An empty window decodes to 0. Windows are at most 8 bytes; the scan only
/// ever produces 2- and 4-byte checksum fields.
pub fn decode_integer(bytes: &[u8], endianness: Endianness) -> u64 {
    debug_assert!(bytes.len() <= 8, "checksum fields are at most 8 bytes");
    let fold = |acc: u64, byte: &u8| (acc << 8) | u64::from(*byte);
    match endianness {
        Endianness::Big => bytes.iter().fold(0, fold),
        Endianness::Little => bytes.iter().rev().fold(0, fold),
    }
}

/// Raw arithmetic sum of byte values, with no modulus applied.
///
/// Callers that need modular behavior (the named formulas) apply it
/// themselves; the brute-force search compares the raw sum directly.
pub fn additive_sum(bytes: &[u8]) -> u64 {
    bytes.iter().map(|&b| u64::from(b)).sum()
}

fn default_modulus() -> u64 {
    256
}

/// A named checksum formula attached to a defined structure.
///
/// The `type` string is dispatched at evaluation time rather than being an
/// enum so that a configuration naming an unknown formula degrades that one
/// structure instead of failing the whole configuration load.
#[derive(Debug, Clone, Deserialize)]
pub struct ChecksumMethod {
    /// Formula name: `"additive"` or `"xor"`
    #[serde(rename = "type")]
    pub kind: String,
    /// Modulus applied to additive sums (default 256)
    #[serde(rename = "mod", default = "default_modulus")]
    pub modulus: u64,
    /// Constant added to the sum before the modulus (additive only)
    #[serde(default)]
    pub correction: u64,
    /// Initial accumulator for the XOR fold (xor only)
    #[serde(default)]
    pub seed: u8,
    /// Whether the header bytes participate in the checksum
    #[serde(default)]
    pub include_header: bool,
}

impl ChecksumMethod {
    /// An additive method with the given modulus and no correction
    pub fn additive(modulus: u64) -> Self {
        Self {
            kind: "additive".to_string(),
            modulus,
            correction: 0,
            seed: 0,
            include_header: false,
        }
    }

    /// An XOR method with the given seed
    pub fn xor(seed: u8) -> Self {
        Self {
            kind: "xor".to_string(),
            modulus: default_modulus(),
            correction: 0,
            seed,
            include_header: false,
        }
    }

    /// Returns true if this formula name is one this build can evaluate
    pub fn is_supported(&self) -> bool {
        matches!(self.kind.as_str(), "additive" | "xor")
    }

    /// Evaluate the formula over the given payload bytes.
    ///
    /// Fails with [`Error::UnsupportedChecksumType`] for an unknown `type`
    /// string; the caller decides how far that failure propagates.
    pub fn evaluate(&self, bytes: &[u8]) -> Result<u64> {
        match self.kind.as_str() {
            "additive" => {
                // A zero modulus would be a division by zero; treat it as
                // the default byte-wide modulus.
                let modulus = if self.modulus == 0 {
                    default_modulus()
                } else {
                    self.modulus
                };
                Ok((additive_sum(bytes) + self.correction) % modulus)
            }
            "xor" => {
                let folded = bytes.iter().fold(self.seed, |acc, &b| acc ^ b);
                Ok(u64::from(folded))
            }
            other => Err(Error::unsupported_checksum(other)),
        }
    }
}
