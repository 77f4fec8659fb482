//! ±1 bit drift compensation
//!
//! The last 128 hard-decided bits live in one shift register. The three
//! candidate groups (one bit earlier, nominal, one bit later) are windows of
//! that register at neighbouring lags, so a slip can be corrected after the
//! fact without re-acquiring sync.

use tracing::debug;

use crate::block::{BlockDecoder, GroupDecode, RawGroup};
use crate::constants::GROUP_SIZE;

/// Largest total error a drifted candidate may have to be adopted
pub const MAX_DRIFT_ERRORS: u8 = 12;

/// Mask selecting one group-sized window
const WINDOW_MASK: u128 = (1u128 << GROUP_SIZE) - 1;

/// Shift register of recent hard bits, newest in the least significant bit
#[derive(Debug, Clone, Default)]
pub struct BitHistory {
    bits: u128,
    /// Bits shifted in since the last reset
    valid: u64,
}

impl BitHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bit: bool) {
        self.bits = (self.bits << 1) | bit as u128;
        self.valid = self.valid.saturating_add(1);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Bits received since the last reset
    pub fn len(&self) -> u64 {
        self.valid
    }

    pub fn is_empty(&self) -> bool {
        self.valid == 0
    }

    /// Group whose last bit arrived `lag` bits ago
    ///
    /// `None` when that window would reach back before the last reset.
    pub fn window(&self, lag: usize) -> Option<RawGroup> {
        if lag + GROUP_SIZE > 128 || self.valid < (lag + GROUP_SIZE) as u64 {
            return None;
        }
        Some(RawGroup::from_window((self.bits >> lag) & WINDOW_MASK))
    }
}

/// Which candidate the compensator adopted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Group ended one bit earlier than expected
    Previous,
    Current,
    /// Group ended one bit later than expected
    Next,
}

/// Chosen candidate and where it ended
#[derive(Debug, Clone, Copy)]
pub struct DriftChoice {
    pub decode: GroupDecode,
    pub alignment: Alignment,
    /// Bits between the end of the chosen group and the newest bit
    pub lag: usize,
}

/// Chooses between the nominal group and its ±1 bit neighbours
#[derive(Debug, Clone, Copy)]
pub struct DriftCompensator {
    max_errors: u8,
}

impl Default for DriftCompensator {
    fn default() -> Self {
        Self {
            max_errors: MAX_DRIFT_ERRORS,
        }
    }
}

impl DriftCompensator {
    pub fn new(max_errors: u8) -> Self {
        Self { max_errors }
    }

    /// Decode the nominal group ending `lag` bits ago and its neighbours
    ///
    /// A neighbour replaces the nominal group only when it has strictly fewer
    /// errors, fewer than the drift limit, and carries `trusted_pi`. Returns
    /// `None` if the nominal window is not available.
    pub fn select(
        &self,
        decoder: &BlockDecoder<'_>,
        history: &BitHistory,
        lag: usize,
        trusted_pi: Option<u16>,
    ) -> Option<DriftChoice> {
        let current = DriftChoice {
            decode: decoder.decode_group(&history.window(lag)?),
            alignment: Alignment::Current,
            lag,
        };

        let previous = history.window(lag + 1).map(|raw| DriftChoice {
            decode: decoder.decode_group(&raw),
            alignment: Alignment::Previous,
            lag: lag + 1,
        });
        let next = lag
            .checked_sub(1)
            .and_then(|l| history.window(l))
            .map(|raw| DriftChoice {
                decode: decoder.decode_group(&raw),
                alignment: Alignment::Next,
                lag: lag - 1,
            });

        let mut best = current;
        for candidate in [previous, next].into_iter().flatten() {
            let eligible = candidate.decode.total_errors < self.max_errors
                && candidate.decode.total_errors < current.decode.total_errors
                && trusted_pi.is_some()
                && candidate.decode.pi() == trusted_pi;
            if eligible && (best.alignment == Alignment::Current || candidate.decode.better_than(&best.decode)) {
                best = candidate;
            }
        }

        if best.alignment != Alignment::Current {
            debug!(
                alignment = ?best.alignment,
                errors = best.decode.total_errors,
                nominal_errors = current.decode.total_errors,
                "drift compensated"
            );
        }

        Some(best)
    }
}
