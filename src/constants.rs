//! RDS framing constants (IEC 62106)

/// Bits per block: 16 information bits followed by a 10-bit checkword
pub const BLOCK_SIZE: usize = 26;

/// Information bits per block
pub const DATA_BITS: usize = 16;

/// Checkword bits per block
pub const CHECK_BITS: usize = 10;

/// Blocks per group
pub const BLOCKS_PER_GROUP: usize = 4;

/// Bits per group (4 x 26)
pub const GROUP_SIZE: usize = BLOCK_SIZE * BLOCKS_PER_GROUP;

/// Generator polynomial g(x) = x^10 + x^8 + x^7 + x^5 + x^4 + x^3 + 1
pub const GENERATOR_POLYNOMIAL: u16 = 0x5B9;

/// Mask selecting the 10 checkword bits of a block
pub const CHECK_MASK: u32 = (1 << CHECK_BITS) - 1;

/// Mask selecting all 26 bits of a block
pub const BLOCK_MASK: u32 = (1 << BLOCK_SIZE) - 1;

/// Number of distinct syndromes
pub const SYNDROME_COUNT: usize = 1 << CHECK_BITS;

/// Table weight meaning "no correction found"
pub const ERASURE_WEIGHT: u8 = 16;
