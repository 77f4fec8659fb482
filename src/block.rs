//! Block and group decoding
//!
//! A group is four 26-bit blocks. Each block is checked against the offset
//! word for its position (A, B, C or C', D); the syndrome left after removing
//! the offset indexes the locator table, which yields the correction.

use bitvec::prelude::*;

use crate::constants::*;
use crate::syndrome::{block_syndrome, checkword, SyndromeLocatorTable};

/// Offset words distinguishing block positions inside a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OffsetWord {
    A,
    B,
    C,
    CPrime,
    D,
}

impl OffsetWord {
    /// Offsets expected at each block position; position 2 also accepts C'
    pub const NOMINAL: [OffsetWord; BLOCKS_PER_GROUP] =
        [OffsetWord::A, OffsetWord::B, OffsetWord::C, OffsetWord::D];

    /// 10-bit offset constant
    pub const fn word(self) -> u16 {
        match self {
            OffsetWord::A => 0x0FC,
            OffsetWord::B => 0x198,
            OffsetWord::C => 0x168,
            OffsetWord::CPrime => 0x350,
            OffsetWord::D => 0x1B4,
        }
    }

    /// Class character used in emitted datagrams
    pub const fn label(self) -> u8 {
        match self {
            OffsetWord::A => b'A',
            OffsetWord::B => b'B',
            OffsetWord::C => b'C',
            OffsetWord::CPrime => b'c',
            OffsetWord::D => b'D',
        }
    }
}

/// Encode 16 data bits into a 26-bit block with the given offset word
pub fn encode_block(data: u16, offset: OffsetWord) -> u32 {
    let check = checkword(data) ^ offset.word();
    ((data as u32) << CHECK_BITS) | check as u32
}

/// Four raw 26-bit blocks as shifted in from the bit stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawGroup {
    pub blocks: [u32; BLOCKS_PER_GROUP],
}

impl RawGroup {
    /// Split a 104-bit window (oldest bit most significant) into blocks
    pub fn from_window(window: u128) -> Self {
        let mut blocks = [0u32; BLOCKS_PER_GROUP];
        for (i, block) in blocks.iter_mut().enumerate() {
            let shift = (BLOCKS_PER_GROUP - 1 - i) * BLOCK_SIZE;
            *block = ((window >> shift) as u32) & BLOCK_MASK;
        }
        Self { blocks }
    }

    /// Build a group from the first 104 bits of a bit slice (transmission order)
    pub fn from_bits(bits: &BitSlice<u8, Msb0>) -> Self {
        let mut blocks = [0u32; BLOCKS_PER_GROUP];
        for (i, block) in blocks.iter_mut().enumerate() {
            for bit in bits[i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE].iter() {
                *block = (*block << 1) | (*bit as u32);
            }
        }
        Self { blocks }
    }

    /// Encode four data words into a valid group
    ///
    /// Block 2 uses offset C' when `c_prime` is set (version B groups).
    pub fn encode(words: [u16; BLOCKS_PER_GROUP], c_prime: bool) -> Self {
        let mut blocks = [0u32; BLOCKS_PER_GROUP];
        for (i, block) in blocks.iter_mut().enumerate() {
            let offset = if i == 2 && c_prime {
                OffsetWord::CPrime
            } else {
                OffsetWord::NOMINAL[i]
            };
            *block = encode_block(words[i], offset);
        }
        Self { blocks }
    }

    /// Bits of the group in transmission order
    pub fn to_bits(&self) -> BitVec<u8, Msb0> {
        let mut bits = BitVec::with_capacity(GROUP_SIZE);
        for block in self.blocks {
            for i in (0..BLOCK_SIZE).rev() {
                bits.push((block >> i) & 1 != 0);
            }
        }
        bits
    }
}

/// Outcome class of one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockClass {
    /// Zero syndrome
    Good,
    /// Corrected within the error tolerance
    Corrected,
    /// Not correctable, or correction above tolerance
    Erased,
}

/// One decoded block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedBlock {
    /// Corrected data word (raw data bits when erased)
    pub value: u16,
    /// Error weight from the locator table, 16 = uncorrectable
    pub error_weight: u8,
    pub class: BlockClass,
    /// Offset word the block was matched against
    pub offset: OffsetWord,
    /// Class character for the emitted datagram
    pub label: u8,
}

impl DecodedBlock {
    pub fn is_erased(&self) -> bool {
        self.class == BlockClass::Erased
    }
}

/// Result of decoding one candidate group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupDecode {
    pub blocks: [DecodedBlock; BLOCKS_PER_GROUP],
    /// Saturating sum of block error weights
    pub total_errors: u8,
    /// 3 per single-bit correction plus 1 per double-bit correction
    pub confidence: u8,
}

impl GroupDecode {
    /// Score a set of decoded blocks
    pub fn from_blocks(blocks: [DecodedBlock; BLOCKS_PER_GROUP]) -> Self {
        let total_errors = blocks
            .iter()
            .fold(0u8, |acc, b| acc.saturating_add(b.error_weight));
        let confidence = blocks
            .iter()
            .map(|b| match b.error_weight {
                1 => 3u8,
                2 => 1,
                _ => 0,
            })
            .sum();

        Self {
            blocks,
            total_errors,
            confidence,
        }
    }

    /// PI code carried in block A, if block A was not erased
    pub fn pi(&self) -> Option<u16> {
        let a = &self.blocks[0];
        (!a.is_erased()).then_some(a.value)
    }

    /// Decoded data words
    pub fn words(&self) -> [u16; BLOCKS_PER_GROUP] {
        self.blocks.map(|b| b.value)
    }

    /// Whether `self` ranks strictly better than `other`
    ///
    /// Fewer total errors wins; equal totals are broken by confidence.
    pub fn better_than(&self, other: &GroupDecode) -> bool {
        self.total_errors < other.total_errors
            || (self.total_errors == other.total_errors && self.confidence > other.confidence)
    }
}

/// Stateless block decoder bound to a locator table and tolerances
#[derive(Debug, Clone, Copy)]
pub struct BlockDecoder<'t> {
    table: &'t SyndromeLocatorTable,
    /// Highest weight accepted as a correction
    pub ecc_max: u8,
    /// Corrected blocks above this weight are labelled 'x'
    pub display_threshold: u8,
}

impl<'t> BlockDecoder<'t> {
    pub fn new(table: &'t SyndromeLocatorTable, ecc_max: u8, display_threshold: u8) -> Self {
        Self {
            table,
            ecc_max,
            display_threshold,
        }
    }

    /// Decode one 26-bit block against a single offset word
    pub fn decode_block(&self, block: u32, offset: OffsetWord) -> DecodedBlock {
        let raw_data = (block >> CHECK_BITS) as u16;
        let entry = self.table.lookup(block_syndrome(block) ^ offset.word());

        let class = if entry.weight == 0 {
            BlockClass::Good
        } else if entry.is_erasure() || entry.weight > self.ecc_max {
            BlockClass::Erased
        } else {
            BlockClass::Corrected
        };

        let value = match class {
            BlockClass::Erased => raw_data,
            _ => raw_data ^ entry.error_pattern,
        };

        let label = match class {
            BlockClass::Good => offset.label(),
            BlockClass::Corrected if entry.weight <= self.display_threshold => offset.label(),
            _ => b'x',
        };

        DecodedBlock {
            value,
            error_weight: entry.weight,
            class,
            offset,
            label,
        }
    }

    /// Decode the four blocks of a group
    pub fn decode_group(&self, group: &RawGroup) -> GroupDecode {
        let mut blocks = [self.decode_block(0, OffsetWord::A); BLOCKS_PER_GROUP];

        for (i, &raw) in group.blocks.iter().enumerate() {
            blocks[i] = if i == 2 {
                let c = self.decode_block(raw, OffsetWord::C);
                let c_prime = self.decode_block(raw, OffsetWord::CPrime);
                if c_prime.error_weight < c.error_weight {
                    c_prime
                } else {
                    c
                }
            } else {
                self.decode_block(raw, OffsetWord::NOMINAL[i])
            };
        }

        GroupDecode::from_blocks(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syndrome::SYNDROME_TABLE;

    const WORDS: [u16; 4] = [0x1234, 0x0408, 0xE0CD, 0x5241];

    fn decoder() -> BlockDecoder<'static> {
        BlockDecoder::new(&SYNDROME_TABLE, 5, 5)
    }

    #[test]
    fn test_encoded_block_has_offset_syndrome() {
        for offset in [
            OffsetWord::A,
            OffsetWord::B,
            OffsetWord::C,
            OffsetWord::CPrime,
            OffsetWord::D,
        ] {
            let block = encode_block(0xBEEF, offset);
            assert_eq!(block_syndrome(block), offset.word());
        }
    }

    #[test]
    fn test_clean_group_round_trip() {
        let group = RawGroup::encode(WORDS, false);
        let result = decoder().decode_group(&group);

        assert_eq!(result.words(), WORDS);
        assert_eq!(result.total_errors, 0);
        assert_eq!(result.confidence, 0);
        assert_eq!(result.pi(), Some(0x1234));
        for (block, label) in result.blocks.iter().zip(b"ABCD") {
            assert_eq!(block.class, BlockClass::Good);
            assert_eq!(block.label, *label);
        }
    }

    #[test]
    fn test_c_prime_detected() {
        let group = RawGroup::encode(WORDS, true);
        let result = decoder().decode_group(&group);
        assert_eq!(result.blocks[2].offset, OffsetWord::CPrime);
        assert_eq!(result.blocks[2].label, b'c');
        assert_eq!(result.total_errors, 0);
    }

    #[test]
    fn test_single_bit_errors_corrected() {
        for (i, &word) in WORDS.iter().enumerate() {
            let clean = encode_block(word, OffsetWord::NOMINAL[i]);
            for bit in 0..BLOCK_SIZE {
                let block = decoder().decode_block(clean ^ (1 << bit), OffsetWord::NOMINAL[i]);
                assert_eq!(block.error_weight, 1, "block {} bit {}", i, bit);
                assert_eq!(block.value, word, "block {} bit {}", i, bit);
                assert_eq!(block.class, BlockClass::Corrected);
            }
        }
    }

    #[test]
    fn test_double_bit_errors() {
        let clean = encode_block(0x1234, OffsetWord::A);
        let mut restored = 0;
        let mut aliased_to_single = 0;
        for i in 0..BLOCK_SIZE {
            for j in (i + 1)..BLOCK_SIZE {
                let mask = (1u32 << i) | (1u32 << j);
                let block = decoder().decode_block(clean ^ mask, OffsetWord::A);
                assert_ne!(block.class, BlockClass::Good, "bits {},{} passed as clean", i, j);

                let entry = SYNDROME_TABLE.lookup(block_syndrome(clean ^ mask) ^ OffsetWord::A.word());
                if entry.weight == 2 && entry.error_pattern == (mask >> CHECK_BITS) as u16 {
                    assert_eq!(block.value, 0x1234, "bits {},{}", i, j);
                    restored += 1;
                }
                if block.error_weight == 1 {
                    aliased_to_single += 1;
                }
            }
        }
        // Distance-3 code: a few double patterns share a single-bit syndrome
        assert!(restored > 250, "only {} double errors restored", restored);
        assert_eq!(aliased_to_single, 21);
    }

    #[test]
    fn test_error_above_threshold_erased() {
        let strict = BlockDecoder::new(&SYNDROME_TABLE, 1, 1);
        let clean = encode_block(0x1234, OffsetWord::A);
        let block = strict.decode_block(clean ^ 0b11, OffsetWord::A);
        assert_eq!(block.error_weight, 2);
        assert_eq!(block.class, BlockClass::Erased);
        assert_eq!(block.label, b'x');
    }

    #[test]
    fn test_display_threshold_marks_corrected() {
        let quiet = BlockDecoder::new(&SYNDROME_TABLE, 5, 1);
        let clean = encode_block(0x1234, OffsetWord::A);
        let block = quiet.decode_block(clean ^ 0b101, OffsetWord::A);
        assert_eq!(block.class, BlockClass::Corrected);
        assert_eq!(block.value, 0x1234);
        assert_eq!(block.label, b'x');
    }

    #[test]
    fn test_confidence_score() {
        let mut group = RawGroup::encode(WORDS, false);
        group.blocks[0] ^= 1 << 20;
        group.blocks[1] ^= 1 << 3;
        group.blocks[3] ^= 0b11 << 12;
        let result = decoder().decode_group(&group);
        assert_eq!(result.total_errors, 4);
        assert_eq!(result.confidence, 7);
        assert_eq!(result.words(), WORDS);
    }

    #[test]
    fn test_window_and_bits_agree() {
        let group = RawGroup::encode(WORDS, false);
        let bits = group.to_bits();
        assert_eq!(bits.len(), GROUP_SIZE);
        assert_eq!(RawGroup::from_bits(&bits), group);

        let mut window = 0u128;
        for bit in bits.iter() {
            window = (window << 1) | (*bit as u128);
        }
        assert_eq!(RawGroup::from_window(window), group);
    }

    #[test]
    fn test_wrong_offset_not_good() {
        let block = encode_block(0x1234, OffsetWord::B);
        let decoded = decoder().decode_block(block, OffsetWord::A);
        assert_ne!(decoded.class, BlockClass::Good);
    }
}
