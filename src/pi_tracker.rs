//! Programme Identification voting
//!
//! Group alignment is acquired without a clean block A by voting: every bit,
//! the 104-bit window ending at that bit is treated as a candidate group and
//! its block 0 is decoded against offset A. Low-weight decodes add a vote to
//! the bucket of the PI they carry. A bucket that collects enough weight marks
//! the window as aligned.
//!
//! The block code is cyclic, so a window one bit off a real block A still
//! decodes with weight 2 to a shifted PI, every group. While locked, those
//! shadow buckets grow without bound; [`ResyncPolicy::Locked`] keeps them from
//! stealing a healthy lock.
//!
//! Two banks vote independently:
//! - **nominal**: the hard-decided bit history
//! - **coherent**: a ring of 104 leaky integrators, one per bit position in
//!   the group period, sliced into bits. Block A repeats every group, so
//!   integration at the group period lifts a weak PI above the noise.

use tracing::{debug, trace};

use crate::block::{BlockDecoder, OffsetWord, RawGroup};
use crate::config::{DecoderConfig, PiIntegration};
use crate::constants::{BLOCK_SIZE, GROUP_SIZE};
use crate::drift::BitHistory;
use crate::syndrome::SYNDROME_TABLE;

/// Block-0 decodes at or above this weight are not votes
pub const MAX_VOTE_WEIGHT: u8 = 5;

/// Number of PI buckets per bank
pub const PI_SPACE: usize = 1 << 16;

/// Blocks between agings of the nominal bank
pub const NOMINAL_AGE_BLOCKS: u64 = 25;

/// Blocks between agings of the coherent bank
pub const COHERENT_AGE_BLOCKS: u64 = 50;

/// Vote state for one PI value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PiHypothesis {
    pub weight: i16,
    pub vote_count: i8,
    /// Absolute bit index of the latest vote
    pub last_seen_bit: i64,
}

/// Source of a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiSource {
    Nominal,
    Coherent,
}

/// One qualifying block-0 decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PiDetection {
    pub pi: u16,
    pub source: PiSource,
    /// Block-0 error weight
    pub error_weight: u8,
    /// Bucket state after the vote
    pub hypothesis: PiHypothesis,
}

/// Outcome of one bit's detection passes
#[derive(Debug, Clone, Copy, Default)]
pub struct PiObservation {
    pub nominal: Option<PiDetection>,
    pub coherent: Option<PiDetection>,
    /// Detection that declared (re)synchronization at this bit
    pub resync: Option<PiDetection>,
}

/// Which detections may declare a resync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncPolicy {
    /// Unsynchronized: any PI reaching the threshold
    Open,
    /// Locked to `trusted`. Another PI takes over only after the last group
    /// failed to confirm `trusted`, and only on a clean nominal block.
    Locked { trusted: u16, confirmed: bool },
    /// Forced sync
    Disabled,
}

impl ResyncPolicy {
    fn admits(self, detection: &PiDetection) -> bool {
        match self {
            ResyncPolicy::Open => true,
            ResyncPolicy::Locked { trusted, confirmed } => {
                !confirmed
                    && detection.pi != trusted
                    && detection.error_weight == 0
                    && detection.source == PiSource::Nominal
            }
            ResyncPolicy::Disabled => false,
        }
    }
}

/// One bank of 65536 PI hypotheses
#[derive(Debug, Clone)]
pub struct PiBank {
    hypotheses: Box<[PiHypothesis]>,
    increments: [i16; MAX_VOTE_WEIGHT as usize],
    age_period: u64,
    bits_since_age: u64,
}

impl PiBank {
    pub fn new(increments: [i16; MAX_VOTE_WEIGHT as usize], age_blocks: u64) -> Self {
        Self {
            hypotheses: vec![PiHypothesis::default(); PI_SPACE].into_boxed_slice(),
            increments,
            age_period: BLOCK_SIZE as u64 * age_blocks,
            bits_since_age: 0,
        }
    }

    pub fn get(&self, pi: u16) -> PiHypothesis {
        self.hypotheses[pi as usize]
    }

    /// Add a vote for `pi`; returns the updated bucket
    ///
    /// Weights at or above [`MAX_VOTE_WEIGHT`] are ignored.
    pub fn vote(&mut self, pi: u16, error_weight: u8, bit: i64) -> Option<PiHypothesis> {
        let increment = *self.increments.get(error_weight as usize)?;
        let h = &mut self.hypotheses[pi as usize];
        h.weight = h.weight.saturating_add(increment);
        h.vote_count = h.vote_count.saturating_add(1);
        h.last_seen_bit = bit;
        Some(*h)
    }

    /// Advance the age clock by one bit, aging every bucket when due
    pub fn tick(&mut self) {
        self.bits_since_age += 1;
        if self.bits_since_age >= self.age_period {
            self.bits_since_age = 0;
            self.age();
        }
    }

    /// Move every bucket one step towards zero
    pub fn age(&mut self) {
        for h in self.hypotheses.iter_mut() {
            h.weight -= h.weight.signum();
            h.vote_count -= h.vote_count.signum();
        }
    }

    /// Anti-thrash decay after a resync: winner keeps half, others a quarter
    pub fn decay_after_resync(&mut self, winner: u16) {
        for (pi, h) in self.hypotheses.iter_mut().enumerate() {
            if pi == winner as usize {
                h.weight /= 2;
            } else {
                h.weight /= 4;
            }
        }
    }

    pub fn reset_age_clock(&mut self) {
        self.bits_since_age = 0;
    }
}

/// Group-period leaky integrator over raw samples
#[derive(Debug, Clone)]
pub struct CoherentIntegrator {
    acc: [f32; GROUP_SIZE],
    /// Slot receiving the next sample; also the oldest slot
    pos: usize,
    filled: usize,
    alpha: f32,
}

impl CoherentIntegrator {
    pub fn new(alpha: f32) -> Self {
        Self {
            acc: [0.0; GROUP_SIZE],
            pos: 0,
            filled: 0,
            alpha,
        }
    }

    pub fn push(&mut self, sample: f32) {
        let slot = &mut self.acc[self.pos];
        *slot = (1.0 - self.alpha) * *slot + self.alpha * sample;
        self.pos = (self.pos + 1) % GROUP_SIZE;
        self.filled = (self.filled + 1).min(GROUP_SIZE);
    }

    /// Integrated group ending at the latest sample, sliced to bits
    pub fn window(&self) -> Option<RawGroup> {
        if self.filled < GROUP_SIZE {
            return None;
        }
        let mut window = 0u128;
        for i in 0..GROUP_SIZE {
            let value = self.acc[(self.pos + i) % GROUP_SIZE];
            window = (window << 1) | (value >= 0.0) as u128;
        }
        Some(RawGroup::from_window(window))
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.alpha);
    }
}

/// PI hypothesis tracker driving acquisition and re-acquisition
#[derive(Debug, Clone)]
pub struct PiTracker {
    nominal: PiBank,
    coherent: PiBank,
    integrator: CoherentIntegrator,
    integration: PiIntegration,
    acquire_threshold: i16,
}

impl PiTracker {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            nominal: PiBank::new(config.nominal_increments, NOMINAL_AGE_BLOCKS),
            coherent: PiBank::new(config.coherent_increments, COHERENT_AGE_BLOCKS),
            integrator: CoherentIntegrator::new(config.coherent_alpha),
            integration: config.pi_integration,
            acquire_threshold: config.acquire_threshold,
        }
    }

    pub fn nominal_bank(&self) -> &PiBank {
        &self.nominal
    }

    pub fn coherent_bank(&self) -> &PiBank {
        &self.coherent
    }

    /// Run both detection passes for the newest bit
    ///
    /// `history` must already contain the bit derived from `sample`. A resync
    /// is declared when a bucket reaches the acquisition threshold and
    /// `policy` admits the detection.
    pub fn observe(
        &mut self,
        history: &BitHistory,
        sample: f32,
        bit: i64,
        policy: ResyncPolicy,
    ) -> PiObservation {
        let decoder = BlockDecoder::new(&SYNDROME_TABLE, MAX_VOTE_WEIGHT - 1, MAX_VOTE_WEIGHT - 1);
        let mut observation = PiObservation::default();

        self.nominal.tick();
        self.coherent.tick();

        if self.integration.nominal() {
            if let Some(raw) = history.window(0) {
                observation.nominal =
                    Self::vote_block(&mut self.nominal, &decoder, raw.blocks[0], bit, PiSource::Nominal);
            }
        }

        if self.integration.coherent() {
            self.integrator.push(sample);
            if let Some(raw) = self.integrator.window() {
                observation.coherent =
                    Self::vote_block(&mut self.coherent, &decoder, raw.blocks[0], bit, PiSource::Coherent);
            }
        }

        if policy == ResyncPolicy::Disabled {
            return observation;
        }

        observation.resync = [observation.nominal, observation.coherent]
            .into_iter()
            .flatten()
            .filter(|d| d.hypothesis.weight >= self.acquire_threshold)
            .find(|d| policy.admits(d));

        if let Some(winner) = observation.resync {
            debug!(
                pi = format_args!("{:04X}", winner.pi),
                source = ?winner.source,
                weight = winner.hypothesis.weight,
                votes = winner.hypothesis.vote_count,
                "PI acquired"
            );
            self.nominal.decay_after_resync(winner.pi);
            self.coherent.decay_after_resync(winner.pi);
        }

        observation
    }

    fn vote_block(
        bank: &mut PiBank,
        decoder: &BlockDecoder<'_>,
        block: u32,
        bit: i64,
        source: PiSource,
    ) -> Option<PiDetection> {
        let decoded = decoder.decode_block(block, OffsetWord::A);
        if decoded.is_erased() || decoded.error_weight >= MAX_VOTE_WEIGHT {
            return None;
        }
        let hypothesis = bank.vote(decoded.value, decoded.error_weight, bit)?;
        trace!(
            pi = format_args!("{:04X}", decoded.value),
            ?source,
            error_weight = decoded.error_weight,
            weight = hypothesis.weight,
            "PI vote"
        );
        Some(PiDetection {
            pi: decoded.value,
            source,
            error_weight: decoded.error_weight,
            hypothesis,
        })
    }

    /// Clear integrators and age clocks after a stream discontinuity
    ///
    /// Bucket weights survive: they describe the station, not the stream.
    pub fn reset(&mut self) {
        self.integrator.reset();
        self.nominal.reset_age_clock();
        self.coherent.reset_age_clock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PI: u16 = 0x1234;

    fn group_samples(words: [u16; 4]) -> Vec<f32> {
        RawGroup::encode(words, false)
            .to_bits()
            .iter()
            .map(|b| if *b { 1.0 } else { -1.0 })
            .collect()
    }

    fn feed(
        tracker: &mut PiTracker,
        history: &mut BitHistory,
        samples: &[f32],
        bit: &mut i64,
        policy: ResyncPolicy,
    ) -> Vec<PiDetection> {
        let mut resyncs = Vec::new();
        for &s in samples {
            history.push(s >= 0.0);
            let obs = tracker.observe(history, s, *bit, policy);
            *bit += 1;
            resyncs.extend(obs.resync);
        }
        resyncs
    }

    #[test]
    fn test_bank_vote_increments() {
        let mut bank = PiBank::new([19, 9, 5, 4, 3], NOMINAL_AGE_BLOCKS);
        assert_eq!(bank.vote(PI, 0, 10).unwrap().weight, 19);
        assert_eq!(bank.vote(PI, 1, 11).unwrap().weight, 28);
        assert!(bank.vote(PI, 5, 12).is_none());
        let h = bank.get(PI);
        assert_eq!(h.vote_count, 2);
        assert_eq!(h.last_seen_bit, 11);
    }

    #[test]
    fn test_bank_saturates() {
        let mut bank = PiBank::new([i16::MAX, 9, 5, 4, 3], NOMINAL_AGE_BLOCKS);
        bank.vote(PI, 0, 0);
        bank.vote(PI, 0, 1);
        assert_eq!(bank.get(PI).weight, i16::MAX);
    }

    #[test]
    fn test_bank_aging() {
        let mut bank = PiBank::new([19, 9, 5, 4, 3], 1);
        bank.vote(PI, 0, 0);
        for _ in 0..BLOCK_SIZE {
            bank.tick();
        }
        let h = bank.get(PI);
        assert_eq!(h.weight, 18);
        assert_eq!(h.vote_count, 0);
    }

    #[test]
    fn test_resync_decay() {
        let mut bank = PiBank::new([19, 9, 5, 4, 3], NOMINAL_AGE_BLOCKS);
        for _ in 0..4 {
            bank.vote(PI, 0, 0);
            bank.vote(0x4321, 0, 0);
        }
        bank.decay_after_resync(PI);
        assert_eq!(bank.get(PI).weight, 38);
        assert_eq!(bank.get(0x4321).weight, 19);
    }

    #[test]
    fn test_acquires_after_three_clean_groups() {
        let config = DecoderConfig {
            pi_integration: PiIntegration::Nominal,
            ..Default::default()
        };
        let mut tracker = PiTracker::new(&config);
        let mut history = BitHistory::new();
        let mut bit = 0;

        let group = group_samples([PI, 0x0408, 0x2020, 0x4142]);
        for n in 0..2 {
            let resyncs = feed(&mut tracker, &mut history, &group, &mut bit, ResyncPolicy::Open);
            assert!(resyncs.is_empty(), "resynced after {} groups", n + 1);
        }
        let resyncs = feed(&mut tracker, &mut history, &group, &mut bit, ResyncPolicy::Open);
        assert_eq!(resyncs.len(), 1);
        assert_eq!(resyncs[0].pi, PI);
        assert_eq!(resyncs[0].error_weight, 0);
        // Detection fires on the last bit of the third group
        assert_eq!(resyncs[0].hypothesis.last_seen_bit, 3 * GROUP_SIZE as i64 - 1);
        assert_eq!(tracker.nominal_bank().get(PI).weight, 57 / 2);
    }

    #[test]
    fn test_same_pi_does_not_resync_in_sync() {
        let mut tracker = PiTracker::new(&DecoderConfig::default());
        let mut history = BitHistory::new();
        let mut bit = 0;
        let group = group_samples([PI, 0x0408, 0x2020, 0x4142]);
        let policy = ResyncPolicy::Locked {
            trusted: PI,
            confirmed: false,
        };
        for _ in 0..6 {
            let resyncs = feed(&mut tracker, &mut history, &group, &mut bit, policy);
            assert!(resyncs.is_empty());
        }
    }

    #[test]
    fn test_pi_change_resyncs() {
        let mut tracker = PiTracker::new(&DecoderConfig::default());
        let mut history = BitHistory::new();
        let mut bit = 0;
        let group = group_samples([0xBEEF, 0x0408, 0x2020, 0x4142]);
        let policy = ResyncPolicy::Locked {
            trusted: PI,
            confirmed: false,
        };
        let mut resyncs = Vec::new();
        for _ in 0..4 {
            resyncs.extend(feed(&mut tracker, &mut history, &group, &mut bit, policy));
        }
        assert!(!resyncs.is_empty());
        assert_eq!(resyncs[0].pi, 0xBEEF);
        assert_eq!(resyncs[0].error_weight, 0);
    }

    #[test]
    fn test_confirmed_lock_holds() {
        let mut tracker = PiTracker::new(&DecoderConfig::default());
        let mut history = BitHistory::new();
        let mut bit = 0;
        let group = group_samples([0xBEEF, 0x0408, 0x2020, 0x4142]);
        let policy = ResyncPolicy::Locked {
            trusted: PI,
            confirmed: true,
        };
        for _ in 0..6 {
            assert!(feed(&mut tracker, &mut history, &group, &mut bit, policy).is_empty());
        }
        assert!(tracker.nominal_bank().get(0xBEEF).weight >= 55);
    }

    #[test]
    fn test_shifted_pi_votes_but_never_steals_lock() {
        let mut tracker = PiTracker::new(&DecoderConfig::default());
        let mut history = BitHistory::new();
        let mut bit = 0;
        let group = group_samples([PI, 0x0408, 0x2020, 0x4142]);
        let policy = ResyncPolicy::Locked {
            trusted: PI,
            confirmed: false,
        };
        for _ in 0..20 {
            assert!(feed(&mut tracker, &mut history, &group, &mut bit, policy).is_empty());
        }
        // One bit late, block A decodes with weight 2 to PI << 1
        assert!(tracker.nominal_bank().get(PI << 1).weight > 55);
    }

    #[test]
    fn test_forced_sync_never_resyncs() {
        let mut tracker = PiTracker::new(&DecoderConfig::default());
        let mut history = BitHistory::new();
        let mut bit = 0;
        let group = group_samples([PI, 0x0408, 0x2020, 0x4142]);
        for _ in 0..5 {
            let resyncs = feed(&mut tracker, &mut history, &group, &mut bit, ResyncPolicy::Disabled);
            assert!(resyncs.is_empty());
        }
    }

    #[test]
    fn test_coherent_pass_recovers_noisy_block() {
        let config = DecoderConfig {
            pi_integration: PiIntegration::Coherent,
            coherent_alpha: 0.5,
            ..Default::default()
        };
        let mut tracker = PiTracker::new(&config);
        let mut history = BitHistory::new();
        let mut bit = 0;

        let clean = group_samples([PI, 0x0408, 0x2020, 0x4142]);
        let mut resyncs = Vec::new();
        for n in 0..8 {
            // Flip a different weak bit of block A every repeat
            let mut group = clean.clone();
            for k in 0..4 {
                let idx = (n * 7 + k * 5) % BLOCK_SIZE;
                group[idx] = -0.2 * group[idx];
            }
            resyncs.extend(feed(&mut tracker, &mut history, &group, &mut bit, ResyncPolicy::Open));
        }
        assert!(resyncs.iter().any(|d| d.pi == PI && d.source == PiSource::Coherent));
    }

    #[test]
    fn test_integrator_window_order() {
        let mut integrator = CoherentIntegrator::new(1.0);
        let samples = group_samples([PI, 1, 2, 3]);
        for &s in &samples {
            integrator.push(s);
        }
        assert_eq!(integrator.window(), Some(RawGroup::encode([PI, 1, 2, 3], false)));
        integrator.reset();
        assert_eq!(integrator.window(), None);
    }
}
