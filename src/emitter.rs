//! Group datagram formatting
//!
//! Every processed group leaves the decoder as a fixed 13-byte datagram:
//!
//! | bytes | content |
//! |-------|---------|
//! | 0..8  | big-endian data words of blocks A, B, C/C', D |
//! | 8..12 | class character per block |
//! | 12    | total bit errors, 127 = end of stream |
//!
//! The data bytes of a block labelled `x` are not trustworthy. An erased
//! block carries its raw received data bits, uncorrected, and a block
//! corrected above the display threshold may be a miscorrection. A consumer
//! should only use words whose class character is `A`, `B`, `C`, `c` or `D`.
//! Position 0 is the exception on diversity-recovered groups: there `x` marks
//! the recovery and block A still carries the trusted PI.

use crate::block::GroupDecode;
use crate::constants::BLOCKS_PER_GROUP;

/// Datagram length in bytes
pub const DATAGRAM_LEN: usize = 13;

/// Error byte reserved for the end-of-stream marker
pub const END_OF_STREAM: u8 = 127;

/// Highest error count reported for a real group
pub const MAX_REPORTED_ERRORS: u8 = END_OF_STREAM - 1;

/// Class character for blocks emitted under forced sync
pub const FORCED_LABEL: u8 = b'F';

/// Class character for a speculative PI-only emission
pub const SPECULATIVE_LABEL: u8 = b'?';

/// Class character for erased, uncertain or diversity-recovered blocks
pub const ERASED_LABEL: u8 = b'x';

/// One outbound group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datagram {
    pub bytes: [u8; DATAGRAM_LEN],
}

impl Datagram {
    /// Data word of block `index`
    pub fn word(&self, index: usize) -> u16 {
        u16::from_be_bytes([self.bytes[2 * index], self.bytes[2 * index + 1]])
    }

    pub fn pi(&self) -> u16 {
        self.word(0)
    }

    /// Class characters, e.g. `b"ABCD"`
    pub fn labels(&self) -> [u8; BLOCKS_PER_GROUP] {
        [self.bytes[8], self.bytes[9], self.bytes[10], self.bytes[11]]
    }

    pub fn errors(&self) -> u8 {
        self.bytes[12]
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.errors() == END_OF_STREAM
    }
}

/// Builds datagrams from decode results
pub struct GroupEmitter;

impl GroupEmitter {
    /// Datagram for a decoded group with explicit class characters
    pub fn format(decode: &GroupDecode, labels: [u8; BLOCKS_PER_GROUP]) -> Datagram {
        Self::assemble(decode.words(), labels, decode.total_errors)
    }

    /// Datagram using each block's own class character
    pub fn group(decode: &GroupDecode) -> Datagram {
        Self::format(decode, decode.blocks.map(|b| b.label))
    }

    /// Datagram for a group decoded under forced sync
    pub fn forced(decode: &GroupDecode) -> Datagram {
        Self::format(decode, [FORCED_LABEL; BLOCKS_PER_GROUP])
    }

    /// PI-only datagram emitted before sync is established
    pub fn speculative(pi: u16) -> Datagram {
        Self::assemble(
            [pi, 0, 0, 0],
            [SPECULATIVE_LABEL, ERASED_LABEL, ERASED_LABEL, ERASED_LABEL],
            0,
        )
    }

    /// Flush marker sent when the stream ends
    pub fn end_of_stream() -> Datagram {
        let mut bytes = [0u8; DATAGRAM_LEN];
        bytes[8..12].copy_from_slice(&[ERASED_LABEL; BLOCKS_PER_GROUP]);
        bytes[12] = END_OF_STREAM;
        Datagram { bytes }
    }

    fn assemble(words: [u16; BLOCKS_PER_GROUP], labels: [u8; BLOCKS_PER_GROUP], errors: u8) -> Datagram {
        let mut bytes = [0u8; DATAGRAM_LEN];
        for (i, word) in words.iter().enumerate() {
            bytes[2 * i..2 * i + 2].copy_from_slice(&word.to_be_bytes());
        }
        bytes[8..12].copy_from_slice(&labels);
        bytes[12] = errors.min(MAX_REPORTED_ERRORS);
        Datagram { bytes }
    }
}
