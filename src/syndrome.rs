//! RDS (26,16) syndrome computation and error locator table
//!
//! The RDS block code is a shortened cyclic code with generator polynomial
//! 0x5B9. A block carries 16 data bits followed by a 10-bit checkword that is
//! the CRC remainder of the data XORed with the block's offset word.
//!
//! The locator table maps each of the 1024 syndromes to the lowest-weight error
//! pattern producing it, enumerating single-bit errors, double-bit errors and
//! bursts of length 3 to 5 over all 26 bit positions.

use crc::{Algorithm, Crc};
use lazy_static::lazy_static;

use crate::constants::*;

/// RDS checkword as a 10-bit CRC (generator 0x5B9 with the x^10 term implied)
const CRC_RDS: Algorithm<u16> = Algorithm {
    width: 10,
    poly: GENERATOR_POLYNOMIAL & 0x3FF,
    init: 0x0,
    refin: false,
    refout: false,
    xorout: 0x0,
    check: 0x0,
    residue: 0x0,
};

/// RDS checkword CRC instance
const RDS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_RDS);

lazy_static! {
    /// Process-wide locator table, built on first use and never mutated
    pub static ref SYNDROME_TABLE: SyndromeLocatorTable = SyndromeLocatorTable::build();
}

/// Compute the 10-bit remainder of `message` (`length` bits, MSB first)
/// multiplied by x^10, modulo the RDS generator polynomial.
///
/// The register is fed `length` message bits and then flushed with 10 zero
/// shifts, which is the procedure receivers use to compute RDS checkwords.
///
/// # Example
/// ```
/// use rustyrds::syndrome::syndrome;
///
/// assert_eq!(syndrome(0, 16), 0);
/// assert!(syndrome(0x1234, 16) < 1024);
/// ```
pub fn syndrome(message: u32, length: u32) -> u16 {
    let mut reg: u32 = 0;
    let poly = GENERATOR_POLYNOMIAL as u32;

    for i in (0..length).rev() {
        reg = (reg << 1) | ((message >> i) & 0x01);
        if reg & (1 << CHECK_BITS) != 0 {
            reg ^= poly;
        }
    }

    for _ in 0..CHECK_BITS {
        reg <<= 1;
        if reg & (1 << CHECK_BITS) != 0 {
            reg ^= poly;
        }
    }

    (reg & CHECK_MASK) as u16
}

/// Checkword of a 16-bit data word before the offset word is applied
///
/// Equal to `syndrome(data, 16)`, computed through the table-driven CRC.
pub fn checkword(data: u16) -> u16 {
    RDS_CRC.checksum(&data.to_be_bytes())
}

/// Syndrome of a received 26-bit block with the offset word not yet removed
///
/// A block transmitted with offset word `w` and received without errors has
/// `block_syndrome(block) == w`.
pub fn block_syndrome(block: u32) -> u16 {
    checkword((block >> CHECK_BITS) as u16) ^ (block & CHECK_MASK) as u16
}

/// Syndrome produced by a 26-bit error mask (linear in the mask)
fn mask_syndrome(mask: u32) -> u16 {
    syndrome(mask >> CHECK_BITS, DATA_BITS as u32) ^ (mask & CHECK_MASK) as u16
}

/// Lowest-weight error pattern for one syndrome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyndromeEntry {
    /// Bits to flip in the 16 data bits
    pub error_pattern: u16,
    /// Number of flipped bits in the full 26-bit block, 16 = erasure
    pub weight: u8,
}

impl SyndromeEntry {
    const ERASURE: SyndromeEntry = SyndromeEntry {
        error_pattern: 0,
        weight: ERASURE_WEIGHT,
    };

    /// Whether the table found no correctable pattern for this syndrome
    pub fn is_erasure(&self) -> bool {
        self.weight >= ERASURE_WEIGHT
    }
}

/// Syndrome to error pattern lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyndromeLocatorTable {
    entries: [SyndromeEntry; SYNDROME_COUNT],
}

impl SyndromeLocatorTable {
    /// Build the table by exhaustive enumeration of correctable patterns
    pub fn build() -> Self {
        let mut table = Self {
            entries: [SyndromeEntry::ERASURE; SYNDROME_COUNT],
        };
        table.entries[0] = SyndromeEntry {
            error_pattern: 0,
            weight: 0,
        };

        // Single-bit errors
        for i in 0..BLOCK_SIZE {
            table.insert(1 << i);
        }

        // Double-bit errors
        for i in 0..BLOCK_SIZE {
            for j in (i + 1)..BLOCK_SIZE {
                table.insert((1 << i) | (1 << j));
            }
        }

        // Bursts of length 3..=5: both end bits set, interior arbitrary
        for len in 3..=5usize {
            let interior_bits = len - 2;
            for offset in 0..=(BLOCK_SIZE - len) {
                for interior in 0..(1u32 << interior_bits) {
                    let mask = (1u32 | (interior << 1) | (1u32 << (len - 1))) << offset;
                    table.insert(mask);
                }
            }
        }

        table
    }

    /// Record `mask` unless a lighter or equally light pattern already owns its syndrome
    fn insert(&mut self, mask: u32) {
        let weight = mask.count_ones() as u8;
        let slot = &mut self.entries[mask_syndrome(mask) as usize];
        if weight < slot.weight {
            *slot = SyndromeEntry {
                error_pattern: (mask >> CHECK_BITS) as u16,
                weight,
            };
        }
    }

    /// Look up the entry for a 10-bit syndrome (offset word already removed)
    pub fn lookup(&self, syndrome: u16) -> SyndromeEntry {
        self.entries[(syndrome as usize) & (SYNDROME_COUNT - 1)]
    }

    /// Number of syndromes with a correctable pattern
    pub fn correctable_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_erasure()).count()
    }
}
