//! Defined-structure matching.
//!
//! An operator who already knows part of a protocol can describe each known
//! message as a *defined structure*: a fixed header, a payload length, and a
//! checksum formula over the payload ending in a single trailing checksum
//! byte. The scan driver tests every structure at every corpus offset; this
//! module holds the structure records, their JSON loader, and the matcher.
//!
//! Configuration is a JSON array of records:
//!
//! ```json
//! [
//!   {
//!     "name": "telemetry",
//!     "header": ["0xAA", "0x55"],
//!     "data_length": 3,
//!     "checksum_method": { "type": "additive", "mod": 256 }
//!   }
//! ]
//! ```
//!
//! Header bytes may be written as integers or as `"0x.."` strings; both are
//! normalized to raw bytes at load time.

use crate::checksum::ChecksumMethod;
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use tracing::warn;

/// An operator-supplied message template
#[derive(Debug, Clone, Deserialize)]
pub struct DefinedStructure {
    /// Name reported with each match
    pub name: String,
    /// Fixed bytes every matching window must start with
    #[serde(deserialize_with = "deserialize_header")]
    pub header: Vec<u8>,
    /// Payload length following the header
    pub data_length: usize,
    /// Checksum formula validating the trailing checksum byte
    #[serde(rename = "checksum_method")]
    pub checksum: ChecksumMethod,
}

/// A window that satisfied a defined structure's predicates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureMatch {
    /// Name of the structure that matched
    pub name: String,
    /// Corpus offset of the first header byte
    pub start: usize,
    /// The full matched window, checksum byte included
    pub bytes: Vec<u8>,
}

impl DefinedStructure {
    /// Total window length a match occupies: header, payload, and one
    /// trailing checksum byte
    pub fn matched_len(&self) -> usize {
        self.header.len() + self.data_length + 1
    }

    /// Test whether the corpus window anchored at `start` matches.
    ///
    /// Returns `Ok(None)` for a clean non-match (out of bounds, header
    /// mismatch, or checksum mismatch) and propagates
    /// [`Error::UnsupportedChecksumType`] so the caller can decide how to
    /// degrade.
    pub fn match_at(&self, data: &[u8], start: usize) -> Result<Option<StructureMatch>> {
        let total = self.matched_len();
        if start + total > data.len() {
            return Ok(None);
        }
        let window = &data[start..start + total];
        if !window.starts_with(&self.header) {
            return Ok(None);
        }

        let payload_end = self.header.len() + self.data_length;
        let payload = if self.checksum.include_header {
            &window[..payload_end]
        } else {
            &window[self.header.len()..payload_end]
        };
        let calculated = self.checksum.evaluate(payload)?;

        if u64::from(window[payload_end]) != calculated {
            return Ok(None);
        }
        Ok(Some(StructureMatch {
            name: self.name.clone(),
            start,
            bytes: window.to_vec(),
        }))
    }
}

/// A header byte as it may appear in configuration
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HeaderByte {
    Raw(u8),
    Hex(String),
}

impl HeaderByte {
    fn normalize(&self) -> Result<u8> {
        match self {
            HeaderByte::Raw(b) => Ok(*b),
            HeaderByte::Hex(s) => {
                let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
                u8::from_str_radix(digits, 16)
                    .map_err(|_| Error::structure_config(format!("invalid header byte '{s}'")))
            }
        }
    }
}

fn deserialize_header<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<HeaderByte>::deserialize(deserializer)?;
    raw.iter()
        .map(|b| b.normalize().map_err(serde::de::Error::custom))
        .collect()
}

/// Load defined structures from a JSON document.
///
/// A document that is not a JSON array disables the feature for the run: the
/// complaint is logged and an empty collection is returned, so brute-force
/// scanning still proceeds. Entries inside a valid array are validated
/// individually; a malformed entry is reported and excluded without failing
/// the rest.
pub fn load_structures(json: &str) -> Vec<DefinedStructure> {
    let entries: Vec<serde_json::Value> = match serde_json::from_str(json) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("structure configuration is not a JSON array, ignoring it: {e}");
            return Vec::new();
        }
    };

    let mut structures = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<DefinedStructure>(entry) {
            Ok(structure) => structures.push(structure),
            Err(e) => warn!("skipping invalid structure entry {index}: {e}"),
        }
    }
    structures
}

/// Load defined structures from a JSON file
pub fn load_structures_from_path(path: impl AsRef<Path>) -> Result<Vec<DefinedStructure>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
    Ok(load_structures(&json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> DefinedStructure {
        DefinedStructure {
            name: "sample".to_string(),
            header: vec![0xAA, 0x55],
            data_length: 3,
            checksum: ChecksumMethod::additive(256),
        }
    }

    #[test]
    fn test_matched_len() {
        assert_eq!(sample().matched_len(), 6);
    }

    #[test]
    fn test_match_with_valid_checksum() {
        // Payload 01 02 03 sums to 6
        let data = [0xAA, 0x55, 0x01, 0x02, 0x03, 0x06];
        let m = sample().match_at(&data, 0).unwrap().unwrap();
        assert_eq!(m.name, "sample");
        assert_eq!(m.start, 0);
        assert_eq!(m.bytes, data.to_vec());
    }

    #[test]
    fn test_wrong_checksum_does_not_match() {
        let data = [0xAA, 0x55, 0x01, 0x02, 0x03, 0x07];
        assert!(sample().match_at(&data, 0).unwrap().is_none());
    }

    #[test]
    fn test_wrong_header_does_not_match() {
        let data = [0xAB, 0x55, 0x01, 0x02, 0x03, 0x06];
        assert!(sample().match_at(&data, 0).unwrap().is_none());
    }

    #[test]
    fn test_match_at_interior_offset() {
        let data = [0x00, 0x00, 0xAA, 0x55, 0x01, 0x02, 0x03, 0x06];
        let m = sample().match_at(&data, 2).unwrap().unwrap();
        assert_eq!(m.start, 2);
    }

    #[test]
    fn test_window_past_corpus_end() {
        let data = [0xAA, 0x55, 0x01, 0x02];
        assert!(sample().match_at(&data, 0).unwrap().is_none());
    }

    #[test]
    fn test_include_header_changes_payload() {
        let mut structure = sample();
        structure.checksum.include_header = true;
        // 0xAA + 0x55 + 1 + 2 + 3 = 0x105, mod 256 = 0x05
        let data = [0xAA, 0x55, 0x01, 0x02, 0x03, 0x05];
        assert!(structure.match_at(&data, 0).unwrap().is_some());
        let data = [0xAA, 0x55, 0x01, 0x02, 0x03, 0x06];
        assert!(structure.match_at(&data, 0).unwrap().is_none());
    }

    #[test]
    fn test_unsupported_kind_propagates() {
        let mut structure = sample();
        structure.checksum.kind = "crc8".to_string();
        let data = [0xAA, 0x55, 0x01, 0x02, 0x03, 0x06];
        assert!(structure.match_at(&data, 0).is_err());
    }

    #[test]
    fn test_load_mixed_header_encodings() {
        let json = r#"[
            {
                "name": "mixed",
                "header": ["0xAA", 85],
                "data_length": 2,
                "checksum_method": { "type": "xor", "seed": 0 }
            }
        ]"#;
        let structures = load_structures(json);
        assert_eq!(structures.len(), 1);
        assert_eq!(structures[0].header, vec![0xAA, 0x55]);
        assert_eq!(structures[0].checksum.kind, "xor");
    }

    #[test]
    fn test_load_non_array_yields_empty() {
        assert!(load_structures(r#"{"name": "oops"}"#).is_empty());
        assert!(load_structures("not json at all").is_empty());
    }

    #[test]
    fn test_load_skips_invalid_entries() {
        let json = r#"[
            { "name": "incomplete" },
            {
                "name": "good",
                "header": [1, 2],
                "data_length": 1,
                "checksum_method": { "type": "additive" }
            },
            { "header": "not even close" }
        ]"#;
        let structures = load_structures(json);
        assert_eq!(structures.len(), 1);
        assert_eq!(structures[0].name, "good");
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("structures.json");
        std::fs::write(
            &path,
            r#"[{"name":"t","header":[1],"data_length":1,"checksum_method":{"type":"additive"}}]"#,
        )
        .unwrap();
        let structures = load_structures_from_path(&path).unwrap();
        assert_eq!(structures.len(), 1);
        assert!(load_structures_from_path(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_load_rejects_bad_hex_string() {
        let json = r#"[
            {
                "name": "bad",
                "header": ["0xZZ"],
                "data_length": 1,
                "checksum_method": { "type": "additive" }
            }
        ]"#;
        assert!(load_structures(json).is_empty());
    }
}
