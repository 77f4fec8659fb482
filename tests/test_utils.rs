//! Shared utilities for integration tests
#![allow(dead_code)]

use rustyrds::constants::GROUP_SIZE;
use rustyrds::simulation::GroupSource;
use rustyrds::{Datagram, DecoderConfig, RdsDecoder, Transition};

/// Decode a whole stream, including the end-of-stream flush
pub fn decode_all(config: DecoderConfig, samples: &[f32]) -> (RdsDecoder, Vec<Datagram>) {
    let mut decoder = RdsDecoder::new(config).expect("valid config");
    let mut out = Vec::new();
    let consumed = decoder.work(samples, |d| out.push(d));
    assert_eq!(consumed, samples.len(), "decoder must consume the whole batch");
    decoder.finish(|d| out.push(d));
    (decoder, out)
}

/// Feed samples one at a time, keeping every non-idle transition with its sample index
pub fn transitions(decoder: &mut RdsDecoder, samples: &[f32]) -> Vec<(usize, Transition)> {
    samples
        .iter()
        .enumerate()
        .map(|(i, &s)| (i, decoder.step(s)))
        .filter(|(_, t)| *t != Transition::Idle)
        .collect()
}

/// Datagrams that carry a group, end-of-stream marker dropped
pub fn groups(datagrams: &[Datagram]) -> Vec<Datagram> {
    datagrams.iter().filter(|d| !d.is_end_of_stream()).copied().collect()
}

pub fn words(datagram: &Datagram) -> [u16; 4] {
    [datagram.word(0), datagram.word(1), datagram.word(2), datagram.word(3)]
}

/// The first `n` groups a fresh source for `pi` transmits
pub fn expected_words(pi: u16, n: usize) -> Vec<[u16; 4]> {
    let mut source = GroupSource::new(pi);
    (0..n).map(|_| source.next_words().0).collect()
}

/// Weaken and invert the given bits of group `group` so a clean repeat outvotes them
pub fn weaken(samples: &mut [f32], group: usize, bits: &[usize]) {
    for &b in bits {
        samples[group * GROUP_SIZE + b] *= -0.3;
    }
}

pub fn labels(datagram: &Datagram) -> String {
    String::from_utf8_lossy(&datagram.labels()).into_owned()
}
