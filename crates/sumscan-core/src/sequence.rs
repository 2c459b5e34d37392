//! Sequenced-block extraction.
//!
//! A matched structure is often followed by a run of fixed-size data blocks,
//! each tagged with an incrementing counter byte. This module walks that run:
//! it consumes blocks while the counter advances as expected, tolerates
//! interstitial noise bytes, and stops at an end marker, a truncated block,
//! or the end of the corpus. Extraction never fails; it returns whatever run
//! was present, possibly empty.

/// Parameters for the block-sequence walk
#[derive(Debug, Clone)]
pub struct SequenceConfig {
    /// Size of each data block, excluding the counter byte
    pub block_size: usize,
    /// First (and wrap-around) counter value
    pub counter_start: u8,
    /// Last counter value before wrapping back to `counter_start`
    pub counter_end: u8,
    /// Byte that cleanly terminates a sequence
    pub end_marker: u8,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            block_size: 8,
            counter_start: 0x40,
            counter_end: 0x7F,
            end_marker: 0xF0,
        }
    }
}

/// One counter-tagged block extracted from a sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedBlock {
    /// The counter byte that tagged this block
    pub counter: u8,
    /// The block payload, exactly `block_size` bytes
    pub bytes: Vec<u8>,
}

/// Walk forward from `start`, collecting counter-tagged blocks.
///
/// A byte that is neither the end marker nor the expected counter is skipped
/// as noise; real captures routinely interleave padding between blocks.
pub fn extract_blocks(data: &[u8], start: usize, config: &SequenceConfig) -> Vec<SequencedBlock> {
    let mut blocks = Vec::new();
    let mut cursor = start;
    let mut expected = config.counter_start;

    while cursor < data.len() {
        let byte = data[cursor];
        if byte == config.end_marker {
            break;
        }
        if byte == expected {
            let body = cursor + 1;
            if data.len() - body < config.block_size {
                // Truncated final block: end of available data, not an error
                break;
            }
            blocks.push(SequencedBlock {
                counter: expected,
                bytes: data[body..body + config.block_size].to_vec(),
            });
            cursor = body + config.block_size;
            expected = if expected >= config.counter_end {
                config.counter_start
            } else {
                expected + 1
            };
        } else {
            cursor += 1;
        }
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn corpus(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    #[test]
    fn test_two_blocks_then_marker() {
        let data = corpus(&[
            &[0x40],
            &[1, 2, 3, 4, 5, 6, 7, 8],
            &[0x41],
            &[9, 10, 11, 12, 13, 14, 15, 16],
            &[0xF0, 0xDE, 0xAD],
        ]);
        let blocks = extract_blocks(&data, 0, &SequenceConfig::default());
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].counter, 0x40);
        assert_eq!(blocks[0].bytes, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(blocks[1].counter, 0x41);
        assert_eq!(blocks[1].bytes, vec![9, 10, 11, 12, 13, 14, 15, 16]);
    }

    #[test]
    fn test_empty_when_marker_first() {
        let data = [0xF0, 0x40, 1, 2, 3];
        assert!(extract_blocks(&data, 0, &SequenceConfig::default()).is_empty());
    }

    #[test]
    fn test_truncated_block_stops() {
        // Counter present but only 3 of 8 payload bytes remain
        let data = [0x40, 1, 2, 3];
        assert!(extract_blocks(&data, 0, &SequenceConfig::default()).is_empty());
    }

    #[test]
    fn test_noise_bytes_skipped() {
        let data = corpus(&[
            &[0x00, 0x00, 0x40],
            &[1, 2, 3, 4, 5, 6, 7, 8],
            &[0xCC, 0x41],
            &[9, 10, 11, 12, 13, 14, 15, 16],
            &[0xF0],
        ]);
        let blocks = extract_blocks(&data, 0, &SequenceConfig::default());
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].counter, 0x41);
    }

    #[test]
    fn test_counter_wraps() {
        let config = SequenceConfig {
            block_size: 1,
            counter_start: 0x40,
            counter_end: 0x41,
            end_marker: 0xF0,
        };
        let data = [0x40, 0xAA, 0x41, 0xBB, 0x40, 0xCC, 0xF0];
        let blocks = extract_blocks(&data, 0, &config);
        let counters: Vec<u8> = blocks.iter().map(|b| b.counter).collect();
        assert_eq!(counters, vec![0x40, 0x41, 0x40]);
    }

    #[test]
    fn test_stops_at_corpus_end() {
        let data = [0x40, 0xAA, 0x41, 0xBB];
        let config = SequenceConfig {
            block_size: 1,
            ..SequenceConfig::default()
        };
        let blocks = extract_blocks(&data, 0, &config);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_start_past_end_is_empty() {
        let data = [0x40, 1, 2];
        assert!(extract_blocks(&data, 10, &SequenceConfig::default()).is_empty());
    }
}
