//! Diversity combining over repeated groups
//!
//! Broadcasters repeat groups. When a group decodes with residual errors, the
//! raw samples of the same bit positions one or more group periods earlier
//! are summed with the current samples and re-sliced. Independent noise
//! averages out while the repeated content adds up coherently.
//!
//! A sum is only as good as the repeat: a period carrying different content
//! decodes to plausible garbage. Candidates are therefore merged block by
//! block. Blocks the nominal decode got right are never touched, and a
//! damaged block is replaced only where the summed samples carry the
//! replacement.

use bitvec::prelude::*;
use tracing::{debug, trace};

use crate::block::{encode_block, BlockClass, BlockDecoder, DecodedBlock, GroupDecode, RawGroup};
use crate::config::DiversityMode;
use crate::constants::{BLOCKS_PER_GROUP, BLOCK_SIZE, GROUP_SIZE};
use crate::emitter::ERASED_LABEL;

/// Rolling store of raw samples addressed by absolute sample index
#[derive(Debug, Clone)]
pub struct SampleArchive {
    ring: Vec<f32>,
    /// Absolute index of the next sample to be pushed
    next: u64,
    /// Samples before this index belong to a previous stream segment
    segment_start: u64,
}

impl SampleArchive {
    /// Archive holding `groups` group periods plus a few bits of drift margin
    pub fn with_groups(groups: usize) -> Self {
        Self {
            ring: vec![0.0; groups * GROUP_SIZE + 4],
            next: 0,
            segment_start: 0,
        }
    }

    pub fn push(&mut self, sample: f32) {
        let len = self.ring.len() as u64;
        self.ring[(self.next % len) as usize] = sample;
        self.next += 1;
    }

    /// Absolute index of the next sample
    pub fn position(&self) -> u64 {
        self.next
    }

    /// Oldest absolute index still held for the current segment
    pub fn oldest(&self) -> u64 {
        self.segment_start
            .max(self.next.saturating_sub(self.ring.len() as u64))
    }

    /// Start a new segment; older samples become unreachable
    pub fn reset(&mut self) {
        self.segment_start = self.next;
    }

    /// Copy the group of samples ending just before absolute index `end`
    pub fn group_ending(&self, end: u64) -> Option<[f32; GROUP_SIZE]> {
        let start = end.checked_sub(GROUP_SIZE as u64)?;
        if start < self.oldest() || end > self.next {
            return None;
        }
        let len = self.ring.len() as u64;
        let mut out = [0.0f32; GROUP_SIZE];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.ring[((start + i as u64) % len) as usize];
        }
        Some(out)
    }
}

/// Slice soft samples to a raw group
pub fn slice_group(samples: &[f32; GROUP_SIZE]) -> RawGroup {
    let mut bits = bitvec![u8, Msb0; 0; GROUP_SIZE];
    for (i, &s) in samples.iter().enumerate() {
        bits.set(i, s >= 0.0);
    }
    RawGroup::from_bits(&bits)
}

/// A group improved by combining
#[derive(Debug, Clone)]
pub struct Recovery {
    pub decode: GroupDecode,
    /// Class characters, position 0 marked as diversity-recovered
    pub labels: [u8; BLOCKS_PER_GROUP],
    /// Group-period separations that were summed
    pub separations: Vec<usize>,
}

/// Searches archived repeats for a better decode
#[derive(Debug, Clone)]
pub struct DiversityCombiner {
    mode: DiversityMode,
    depth: usize,
    /// Start indices of archived periods already spent on a recovery
    used: Vec<u64>,
}

impl DiversityCombiner {
    pub fn new(mode: DiversityMode, depth: usize) -> Self {
        Self {
            mode,
            depth,
            used: Vec::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.mode != DiversityMode::Off
    }

    /// Separation sets to try, nearest repeats first
    fn separations(&self) -> Vec<Vec<usize>> {
        let mut sets = Vec::new();
        for p in 1..=self.depth {
            sets.push(vec![p]);
            if self.mode == DiversityMode::ThreePoint {
                for q in (p + 1)..=self.depth {
                    sets.push(vec![p, q]);
                }
            }
        }
        sets
    }

    /// Try to beat `nominal`, the decode of the group ending before `end`
    ///
    /// Only candidates carrying `trusted_pi` and agreeing with every good
    /// nominal block qualify, and the merged result must rank strictly better
    /// than the nominal decode.
    pub fn search(
        &mut self,
        decoder: &BlockDecoder<'_>,
        archive: &SampleArchive,
        end: u64,
        nominal: &GroupDecode,
        trusted_pi: Option<u16>,
    ) -> Option<Recovery> {
        if !self.enabled() || nominal.total_errors == 0 {
            return None;
        }
        let current = archive.group_ending(end)?;
        let oldest = archive.oldest();
        self.used.retain(|&start| start >= oldest);

        let mut best: Option<(GroupDecode, Vec<usize>)> = None;

        'sets: for separations in self.separations() {
            let mut summed = current;
            for &p in &separations {
                let Some(start) = end.checked_sub(((p + 1) * GROUP_SIZE) as u64) else {
                    continue 'sets;
                };
                if self.used.contains(&start) {
                    continue 'sets;
                }
                let Some(repeat) = archive.group_ending(start + GROUP_SIZE as u64) else {
                    continue 'sets;
                };
                for (s, r) in summed.iter_mut().zip(repeat.iter()) {
                    *s += r;
                }
            }

            let combined = decoder.decode_group(&slice_group(&summed));
            trace!(?separations, errors = combined.total_errors, "diversity candidate");

            if trusted_pi.is_some() && combined.pi() != trusted_pi {
                continue;
            }
            let Some(decode) = merge(nominal, &combined, &current, &summed) else {
                continue;
            };
            let improves = match &best {
                Some((b, _)) => decode.better_than(b),
                None => decode.better_than(nominal),
            };
            if improves {
                let perfect = decode.total_errors == 0;
                best = Some((decode, separations));
                if perfect {
                    break;
                }
            }
        }

        let (decode, separations) = best?;
        self.used.extend(
            separations
                .iter()
                .filter_map(|&p| end.checked_sub(((p + 1) * GROUP_SIZE) as u64)),
        );
        debug!(
            ?separations,
            errors = decode.total_errors,
            nominal_errors = nominal.total_errors,
            "diversity recovery"
        );

        let mut labels = decode.blocks.map(|b| b.label);
        labels[0] = ERASED_LABEL;
        Some(Recovery {
            decode,
            labels,
            separations,
        })
    }

    pub fn reset(&mut self) {
        self.used.clear();
    }
}

/// Merge a combined decode into the nominal one, block by block
///
/// Returns `None` when the candidate contradicts a good nominal block or
/// replaces nothing.
fn merge(
    nominal: &GroupDecode,
    combined: &GroupDecode,
    current: &[f32; GROUP_SIZE],
    summed: &[f32; GROUP_SIZE],
) -> Option<GroupDecode> {
    let mut blocks = nominal.blocks;
    let mut replaced = false;

    for (i, (kept, found)) in blocks.iter_mut().zip(combined.blocks.iter()).enumerate() {
        if kept.class == BlockClass::Good {
            if found.is_erased() || found.value != kept.value {
                return None;
            }
            continue;
        }
        let span = i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE;
        if !found.is_erased()
            && found.error_weight < kept.error_weight
            && supported(found, &current[span.clone()], &summed[span])
        {
            *kept = *found;
            replaced = true;
        }
    }

    replaced.then(|| GroupDecode::from_blocks(blocks))
}

/// Every bit where `block` overrides the current samples must be carried by
/// a summed sample of the block's sign and greater magnitude
fn supported(block: &DecodedBlock, current: &[f32], summed: &[f32]) -> bool {
    let codeword = encode_block(block.value, block.offset);
    current.iter().zip(summed).enumerate().all(|(j, (&c, &s))| {
        let bit = (codeword >> (BLOCK_SIZE - 1 - j)) & 1 == 1;
        (c >= 0.0) == bit || ((s >= 0.0) == bit && s.abs() > c.abs())
    })
}
