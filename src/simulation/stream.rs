use tracing::debug;

use super::groups::GroupSource;
use super::noise;
use crate::decoder::GAP;

/// Impairment applied after a given group
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamEvent {
    /// Duplicate the last bit (receiver clock slipped late)
    InsertBit,
    /// Drop the last bit (receiver clock slipped early)
    DropBit,
    /// Discontinuity marker
    Gap,
    /// Flip the given bits of this group (0..104, transmission order)
    FlipBits(&'static [usize]),
}

/// Builds a soft-sample stream from a group source
#[derive(Debug, Clone)]
pub struct StreamBuilder {
    source: GroupSource,
    groups: usize,
    amplitude: f32,
    noise: Option<(f32, u64)>,
    events: Vec<(usize, StreamEvent)>,
}

impl StreamBuilder {
    pub fn new(source: GroupSource) -> Self {
        Self {
            source,
            groups: 1,
            amplitude: 1.0,
            noise: None,
            events: Vec::new(),
        }
    }

    pub fn groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Seeded white Gaussian noise with standard deviation `sigma`
    pub fn noise(mut self, sigma: f32, seed: u64) -> Self {
        self.noise = Some((sigma, seed));
        self
    }

    /// Apply `event` to group `group` (zero-based)
    pub fn event(mut self, group: usize, event: StreamEvent) -> Self {
        self.events.push((group, event));
        self
    }

    /// Render the stream; gaps appear as [`GAP`] samples
    pub fn build(mut self) -> Vec<f32> {
        let mut segments: Vec<Vec<f32>> = vec![Vec::new()];

        for index in 0..self.groups {
            let group = self.source.next_group();
            let mut samples: Vec<f32> = group
                .to_bits()
                .iter()
                .map(|b| if *b { self.amplitude } else { -self.amplitude })
                .collect();

            let mut gap_after = false;
            for (_, event) in self.events.iter().filter(|(g, _)| *g == index) {
                match event {
                    StreamEvent::InsertBit => {
                        let last = *samples.last().unwrap_or(&self.amplitude);
                        samples.push(last);
                    }
                    StreamEvent::DropBit => {
                        samples.pop();
                    }
                    StreamEvent::FlipBits(bits) => {
                        for &b in bits.iter() {
                            if let Some(s) = samples.get_mut(b) {
                                *s = -*s;
                            }
                        }
                    }
                    StreamEvent::Gap => gap_after = true,
                }
            }

            if let Some(current) = segments.last_mut() {
                current.extend(samples);
            }
            if gap_after {
                segments.push(Vec::new());
            }
        }

        let mut out = Vec::new();
        for (i, mut segment) in segments.into_iter().enumerate() {
            if let Some((sigma, seed)) = self.noise {
                noise::add_white_noise(&mut segment, sigma, seed.wrapping_add(i as u64));
            }
            if i > 0 {
                out.push(GAP);
            }
            out.extend(segment);
        }
        debug!(groups = self.groups, samples = out.len(), "stream built");
        out
    }
}
