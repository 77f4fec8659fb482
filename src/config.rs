//! Decoder configuration
//!
//! Everything here is fixed at construction except the error tolerance, which
//! lives behind an [`EccThreshold`] handle so a control thread can change it
//! while another thread drives the decoder.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use snafu::ensure;

use crate::constants::ERASURE_WEIGHT;
use crate::error::*;

/// Deepest diversity search the sample archive supports, in group periods
pub const MAX_DIVERSITY_DEPTH: usize = 32;

/// Deepest backfill the bit archive supports, in group periods
pub const MAX_BACKFILL_GROUPS: usize = 8;

/// Which PI detection passes feed the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiIntegration {
    /// Hard-decided bits only
    Nominal,
    /// Group-period coherent integration only
    Coherent,
    Both,
}

impl PiIntegration {
    pub fn nominal(self) -> bool {
        matches!(self, PiIntegration::Nominal | PiIntegration::Both)
    }

    pub fn coherent(self) -> bool {
        matches!(self, PiIntegration::Coherent | PiIntegration::Both)
    }
}

/// Diversity combining search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiversityMode {
    Off,
    /// Current group plus one archived repeat
    TwoPoint,
    /// Current group plus one or two archived repeats
    ThreePoint,
}

/// Configuration for the RDS decoder
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Highest block error weight accepted as a correction
    pub ecc_max: u8,
    /// Corrected blocks above this weight are labelled 'x' in datagrams
    pub display_threshold: u8,
    /// PI detection passes
    pub pi_integration: PiIntegration,
    /// Leaky integrator factor for the coherent pass
    pub coherent_alpha: f32,
    /// Vote increment per block-0 error weight 0..=4, nominal bank
    pub nominal_increments: [i16; 5],
    /// Vote increment per block-0 error weight 0..=4, coherent bank
    pub coherent_increments: [i16; 5],
    /// Bucket weight that declares acquisition
    pub acquire_threshold: i16,
    /// Accumulated bit errors that drop sync
    pub sync_loss_errors: u32,
    pub diversity: DiversityMode,
    /// Archived group periods searched by the diversity combiner
    pub diversity_depth: usize,
    /// Treat every 104-bit window as aligned and always emit
    pub force_sync: bool,
    /// Earlier groups emitted after acquisition
    pub backfill_groups: usize,
    /// Emit PI-only datagrams while unsynchronized
    pub speculative_pi: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            ecc_max: 5,
            display_threshold: 2,
            pi_integration: PiIntegration::Both,
            coherent_alpha: 0.25,
            nominal_increments: [19, 9, 5, 4, 3],
            coherent_increments: [19, 9, 1, 1, 0],
            acquire_threshold: 55,
            sync_loss_errors: 512 * 8,
            diversity: DiversityMode::Off,
            diversity_depth: 4,
            force_sync: false,
            backfill_groups: 4,
            speculative_pi: false,
        }
    }
}

impl DecoderConfig {
    /// Reject settings the decoder cannot honour while streaming
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = ERASURE_WEIGHT - 1;
        ensure!(
            self.ecc_max <= max,
            InvalidEccMaxSnafu {
                ecc_max: self.ecc_max,
                max
            }
        );

        if self.diversity != DiversityMode::Off {
            ensure!(
                (1..=MAX_DIVERSITY_DEPTH).contains(&self.diversity_depth),
                InvalidDiversityDepthSnafu {
                    depth: self.diversity_depth,
                    max: MAX_DIVERSITY_DEPTH
                }
            );
        }

        ensure!(
            self.coherent_alpha > 0.0 && self.coherent_alpha <= 1.0,
            InvalidIntegrationFactorSnafu {
                alpha: self.coherent_alpha
            }
        );

        ensure!(
            is_non_increasing(&self.nominal_increments),
            IncrementTableNotMonotonicSnafu { bank: "nominal" }
        );
        ensure!(
            is_non_increasing(&self.coherent_increments),
            IncrementTableNotMonotonicSnafu { bank: "coherent" }
        );

        ensure!(
            self.acquire_threshold > 0,
            InvalidAcquireThresholdSnafu {
                threshold: self.acquire_threshold
            }
        );

        ensure!(
            self.backfill_groups <= MAX_BACKFILL_GROUPS,
            InvalidBackfillSnafu {
                groups: self.backfill_groups,
                max: MAX_BACKFILL_GROUPS
            }
        );

        Ok(())
    }
}

fn is_non_increasing(table: &[i16]) -> bool {
    table.windows(2).all(|w| w[0] >= w[1])
}

/// Shared, lock-free error tolerance
///
/// Clones share the same value. Reads and writes are relaxed atomics; the
/// decoder picks up a new value at its next group.
#[derive(Debug, Clone)]
pub struct EccThreshold(Arc<AtomicU8>);

impl EccThreshold {
    pub fn new(value: u8) -> Self {
        Self(Arc::new(AtomicU8::new(value)))
    }

    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }

    /// Set the tolerance, clamped to the largest correctable weight
    pub fn set(&self, value: u8) {
        self.0.store(value.min(ERASURE_WEIGHT - 1), Ordering::Relaxed);
    }
}
