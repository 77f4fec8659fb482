//! Streaming RDS group decoder
//!
//! Consumes one soft sample per bit, keeps group alignment and hands every
//! processed group to the caller as a [`Datagram`].
//!
//! **States**:
//! - `NoSync`: only the PI tracker runs; no groups are emitted
//! - `Sync`: every 104 bits the drift compensator picks the best of three
//!   candidate alignments, optionally improved by diversity combining
//! - `ForceSync`: operator override, every 104-bit window is emitted as a group
//!
//! A NaN sample ([`GAP`]) marks a discontinuity in the upstream stream and
//! resets all stream state.

use tracing::{debug, info, instrument, warn};

use crate::block::{BlockDecoder, GroupDecode};
use crate::config::{DecoderConfig, DiversityMode, EccThreshold};
use crate::constants::GROUP_SIZE;
use crate::diversity::{slice_group, DiversityCombiner, SampleArchive};
use crate::drift::{BitHistory, DriftCompensator};
use crate::emitter::{Datagram, GroupEmitter};
use crate::error::ConfigError;
use crate::pi_tracker::{PiDetection, PiObservation, PiTracker, ResyncPolicy};
use crate::syndrome::SYNDROME_TABLE;

/// Sample value marking a stream discontinuity
pub const GAP: f32 = f32::NAN;

/// Whether `sample` is the discontinuity marker
pub fn is_gap(sample: f32) -> bool {
    sample.is_nan()
}

/// Alignment state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    NoSync,
    Sync,
    ForceSync,
}

/// Result of feeding one sample
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Nothing to report
    Idle,
    /// A group boundary was processed
    Group(Datagram),
    /// Alignment (re)acquired; carries backfilled groups and the triggering
    /// group, the latter dropped if it overlaps the last emitted group
    Acquired { pi: u16, groups: Vec<Datagram> },
    /// Too many accumulated errors; carries the last group emitted under sync
    SyncLost { last: Datagram, errors: u32 },
    /// PI-only datagram while searching
    Speculative(Datagram),
    /// Gap marker consumed, stream state cleared; carries the group that
    /// ended right before the gap, if one was pending
    Reset { flushed: Option<Datagram> },
}

impl Transition {
    /// Datagrams to hand downstream, in order
    pub fn into_datagrams(self) -> Vec<Datagram> {
        match self {
            Transition::Group(d) | Transition::Speculative(d) => vec![d],
            Transition::SyncLost { last, .. } => vec![last],
            Transition::Acquired { groups, .. } => groups,
            Transition::Reset { flushed } => flushed.into_iter().collect(),
            Transition::Idle => Vec::new(),
        }
    }
}

/// RDS bit-stream decoder
pub struct RdsDecoder {
    config: DecoderConfig,
    ecc_max: EccThreshold,
    state: SyncState,
    trusted_pi: Option<u16>,
    /// Last processed group carried the trusted PI
    confirmed: bool,
    history: BitHistory,
    archive: SampleArchive,
    tracker: PiTracker,
    drift: DriftCompensator,
    diversity: DiversityCombiner,
    /// Bits since the end of the last processed group
    bits_since_boundary: usize,
    /// Absolute index of the next bit
    bit_index: i64,
    /// Bit errors since the last resync
    error_accumulator: u32,
    /// Archive position just past the last emitted group
    last_emitted_end: u64,
    groups_emitted: u64,
}

impl RdsDecoder {
    /// Create a decoder, rejecting configurations it cannot honour
    pub fn new(config: DecoderConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let diversity_depth = match config.diversity {
            DiversityMode::Off => 0,
            _ => config.diversity_depth,
        };
        let archive_groups = config.backfill_groups.max(diversity_depth) + 1;

        Ok(Self {
            ecc_max: EccThreshold::new(config.ecc_max),
            state: if config.force_sync {
                SyncState::ForceSync
            } else {
                SyncState::NoSync
            },
            trusted_pi: None,
            confirmed: false,
            history: BitHistory::new(),
            archive: SampleArchive::with_groups(archive_groups),
            tracker: PiTracker::new(&config),
            drift: DriftCompensator::default(),
            diversity: DiversityCombiner::new(config.diversity, config.diversity_depth),
            bits_since_boundary: 0,
            bit_index: 0,
            error_accumulator: 0,
            last_emitted_end: 0,
            groups_emitted: 0,
            config,
        })
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// PI of the station the decoder is locked to
    pub fn trusted_pi(&self) -> Option<u16> {
        self.trusted_pi
    }

    /// Handle for adjusting the error tolerance from another thread
    pub fn ecc_max(&self) -> EccThreshold {
        self.ecc_max.clone()
    }

    /// Groups emitted so far, backfill and speculative datagrams included
    pub fn groups_emitted(&self) -> u64 {
        self.groups_emitted
    }

    /// Read-only view of the PI tracker
    pub fn tracker(&self) -> &PiTracker {
        &self.tracker
    }

    /// Enter or leave forced sync
    pub fn set_force_sync(&mut self, force: bool) {
        match (force, self.state) {
            (true, SyncState::ForceSync) | (false, SyncState::NoSync) | (false, SyncState::Sync) => {}
            (true, _) => {
                info!("forced sync enabled");
                self.state = SyncState::ForceSync;
                self.bits_since_boundary = 0;
            }
            (false, SyncState::ForceSync) => {
                info!("forced sync disabled");
                self.state = SyncState::NoSync;
                self.trusted_pi = None;
            }
        }
    }

    /// Process a batch of samples, calling `sink` for every datagram
    ///
    /// Returns the number of samples consumed, which is always the whole batch.
    #[instrument(skip_all, fields(samples = samples.len()))]
    pub fn work<F>(&mut self, samples: &[f32], mut sink: F) -> usize
    where
        F: FnMut(Datagram),
    {
        for &sample in samples {
            for datagram in self.step(sample).into_datagrams() {
                sink(datagram);
            }
        }
        samples.len()
    }

    /// Flush the pending group and emit the end-of-stream marker
    pub fn finish<F>(&mut self, mut sink: F)
    where
        F: FnMut(Datagram),
    {
        if let Some(datagram) = self.flush_pending() {
            sink(datagram);
        }
        sink(GroupEmitter::end_of_stream());
    }

    /// Feed one sample
    pub fn step(&mut self, sample: f32) -> Transition {
        if is_gap(sample) {
            let flushed = self.flush_pending();
            self.reset_stream();
            return Transition::Reset { flushed };
        }

        self.history.push(sample >= 0.0);
        self.archive.push(sample);
        let bit = self.bit_index;
        self.bit_index += 1;
        self.bits_since_boundary += 1;

        let observation = self
            .tracker
            .observe(&self.history, sample, bit, self.resync_policy());
        if let Some(detection) = observation.resync {
            return self.acquire(detection);
        }

        match self.state {
            SyncState::NoSync => self.speculate(&observation),
            // Decide one bit late so the "next" candidate is available
            SyncState::Sync if self.bits_since_boundary > GROUP_SIZE => self.group_boundary(1),
            SyncState::Sync => Transition::Idle,
            SyncState::ForceSync if self.bits_since_boundary >= GROUP_SIZE => self.forced_group(),
            SyncState::ForceSync => Transition::Idle,
        }
    }

    fn resync_policy(&self) -> ResyncPolicy {
        match (self.state, self.trusted_pi) {
            (SyncState::ForceSync, _) => ResyncPolicy::Disabled,
            (SyncState::Sync, Some(trusted)) => ResyncPolicy::Locked {
                trusted,
                confirmed: self.confirmed,
            },
            _ => ResyncPolicy::Open,
        }
    }

    fn block_decoder(&self) -> BlockDecoder<'static> {
        let ecc_max = self.ecc_max.get();
        BlockDecoder::new(&SYNDROME_TABLE, ecc_max, self.config.display_threshold.min(ecc_max))
    }

    /// Adopt a PI detection as the new alignment
    fn acquire(&mut self, detection: PiDetection) -> Transition {
        let decoder = self.block_decoder();
        let previous = self.state;
        let end = self.archive.position();

        let mut groups = Vec::new();
        let mut emitted_end = None;
        if previous == SyncState::NoSync {
            for k in (1..=self.config.backfill_groups).rev() {
                let Some(group_end) = end.checked_sub((k * GROUP_SIZE) as u64) else {
                    continue;
                };
                // Never repeat a group already emitted; one bit of overlap is drift
                if group_end < self.last_emitted_end + GROUP_SIZE as u64 - 1 {
                    continue;
                }
                let Some(samples) = self.archive.group_ending(group_end) else {
                    continue;
                };
                let decode = decoder.decode_group(&slice_group(&samples));
                if decode.pi() == Some(detection.pi) {
                    groups.push(GroupEmitter::group(&decode));
                    emitted_end = Some(group_end);
                }
            }
        }

        // Off the old grid, the triggering window can overlap the last emitted group
        let overlaps = end < self.last_emitted_end + GROUP_SIZE as u64 - 1;
        if let Some(raw) = self.history.window(0).filter(|_| !overlaps) {
            groups.push(GroupEmitter::group(&decoder.decode_group(&raw)));
            emitted_end = Some(end);
        }

        info!(
            pi = format_args!("{:04X}", detection.pi),
            from = ?previous,
            source = ?detection.source,
            groups = groups.len(),
            "sync acquired"
        );

        self.state = SyncState::Sync;
        self.trusted_pi = Some(detection.pi);
        self.confirmed = true;
        self.error_accumulator = 0;
        self.bits_since_boundary = 0;
        if let Some(e) = emitted_end {
            self.last_emitted_end = e;
        }
        self.groups_emitted += groups.len() as u64;

        Transition::Acquired {
            pi: detection.pi,
            groups,
        }
    }

    /// Decode the group that ended `lag` bits ago, allowing ±1 bit of drift
    fn group_boundary(&mut self, lag: usize) -> Transition {
        let decoder = self.block_decoder();
        let Some(choice) = self.drift.select(&decoder, &self.history, lag, self.trusted_pi) else {
            return Transition::Idle;
        };
        self.bits_since_boundary = choice.lag;
        self.confirmed = choice.decode.pi() == self.trusted_pi;

        let end = self.archive.position() - choice.lag as u64;
        let datagram = match self
            .diversity
            .search(&decoder, &self.archive, end, &choice.decode, self.trusted_pi)
        {
            Some(recovery) => {
                self.error_accumulator += recovery.decode.total_errors as u32;
                GroupEmitter::format(&recovery.decode, recovery.labels)
            }
            None => {
                self.error_accumulator += choice.decode.total_errors as u32;
                GroupEmitter::group(&choice.decode)
            }
        };
        self.last_emitted_end = end;
        self.groups_emitted += 1;

        if self.error_accumulator > self.config.sync_loss_errors {
            warn!(
                errors = self.error_accumulator,
                pi = ?self.trusted_pi,
                "sync lost"
            );
            let errors = self.error_accumulator;
            self.state = SyncState::NoSync;
            self.error_accumulator = 0;
            return Transition::SyncLost {
                last: datagram,
                errors,
            };
        }

        Transition::Group(datagram)
    }

    /// Evaluate a boundary that is due but still waiting for its "next" bit
    fn flush_pending(&mut self) -> Option<Datagram> {
        match self.state {
            SyncState::Sync if self.bits_since_boundary >= GROUP_SIZE => self
                .group_boundary(self.bits_since_boundary - GROUP_SIZE)
                .into_datagrams()
                .pop(),
            _ => None,
        }
    }

    fn forced_group(&mut self) -> Transition {
        let Some(raw) = self.history.window(0) else {
            return Transition::Idle;
        };
        let decode: GroupDecode = self.block_decoder().decode_group(&raw);
        self.bits_since_boundary = 0;
        self.last_emitted_end = self.archive.position();
        self.groups_emitted += 1;
        Transition::Group(GroupEmitter::forced(&decode))
    }

    fn speculate(&mut self, observation: &PiObservation) -> Transition {
        if !self.config.speculative_pi {
            return Transition::Idle;
        }
        match observation.nominal {
            Some(d) if d.error_weight == 0 && d.hypothesis.vote_count >= 2 => {
                debug!(pi = format_args!("{:04X}", d.pi), votes = d.hypothesis.vote_count, "speculative PI");
                self.groups_emitted += 1;
                Transition::Speculative(GroupEmitter::speculative(d.pi))
            }
            _ => Transition::Idle,
        }
    }

    /// Clear stream state after a discontinuity
    fn reset_stream(&mut self) {
        debug!(state = ?self.state, bit = self.bit_index, "gap: resetting stream state");
        self.history.reset();
        self.archive.reset();
        self.tracker.reset();
        self.diversity.reset();
        self.error_accumulator = 0;
        self.bits_since_boundary = 0;
        self.confirmed = false;
        if self.state == SyncState::Sync {
            self.state = SyncState::NoSync;
        }
    }
}
