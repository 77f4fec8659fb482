use snafu::Snafu;

/// Rejected decoder configuration
#[derive(Debug, Snafu, Clone, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    /// Error tolerance outside the locator table's range
    #[snafu(display("ecc_max {ecc_max} exceeds the maximum correctable weight {max}"))]
    InvalidEccMax { ecc_max: u8, max: u8 },

    /// Diversity search deeper than the sample archive
    #[snafu(display("diversity depth {depth} outside 1..={max}"))]
    InvalidDiversityDepth { depth: usize, max: usize },

    /// Coherent integration factor must lie in (0, 1]
    #[snafu(display("coherent integration factor {alpha} outside (0, 1]"))]
    InvalidIntegrationFactor { alpha: f32 },

    /// PI increments must not grow with the error weight
    #[snafu(display("{bank} PI increment table is not non-increasing"))]
    IncrementTableNotMonotonic { bank: &'static str },

    /// Acquisition threshold must be positive
    #[snafu(display("acquisition threshold {threshold} must be positive"))]
    InvalidAcquireThreshold { threshold: i16 },

    /// Backfill deeper than the bit archive
    #[snafu(display("backfill of {groups} groups exceeds the archive of {max} groups"))]
    InvalidBackfill { groups: usize, max: usize },
}
