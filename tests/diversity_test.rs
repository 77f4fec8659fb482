//! Integration tests for diversity combining
//!
//! The simulated station repeats each PS segment every six groups, so a
//! damaged 0A group has an identical clean copy six periods earlier.

#[path = "test_utils.rs"]
mod test_utils;

use rustyrds::simulation::{GroupSource, StreamBuilder};
use rustyrds::tracing_init::init_test_tracing;
use rustyrds::{DecoderConfig, DiversityMode};
use test_utils::{decode_all, expected_words, groups, labels, weaken, words};

const PI: u16 = 0x1234;
const DAMAGED: usize = 13;
const REPEAT: usize = DAMAGED - 6;
/// A burst in block B and another across the end of block C into D
const DAMAGE: [usize; 12] = [30, 31, 33, 36, 40, 45, 80, 81, 82, 83, 84, 85];

fn damaged_stream() -> Vec<f32> {
    let mut samples = StreamBuilder::new(GroupSource::new(PI)).groups(16).build();
    weaken(&mut samples, DAMAGED, &DAMAGE);
    samples
}

fn config(mode: DiversityMode, depth: usize) -> DecoderConfig {
    DecoderConfig {
        diversity: mode,
        diversity_depth: depth,
        ..Default::default()
    }
}

#[test]
fn test_damage_visible_without_diversity() {
    init_test_tracing();
    let (_, out) = decode_all(config(DiversityMode::Off, 4), &damaged_stream());
    let decoded = groups(&out);
    assert_eq!(decoded.len(), 16);
    assert!(decoded[DAMAGED].errors() > 0);
    assert_ne!(words(&decoded[DAMAGED]), words(&decoded[REPEAT]));
}

#[test]
fn test_two_point_recovers_from_repeat() {
    init_test_tracing();
    let (_, out) = decode_all(config(DiversityMode::TwoPoint, 6), &damaged_stream());
    let decoded = groups(&out);

    assert_eq!(decoded.len(), 16);
    let recovered = &decoded[DAMAGED];
    assert_eq!(recovered.errors(), 0);
    assert_eq!(labels(recovered), "xBCD");
    assert_eq!(words(recovered), words(&decoded[REPEAT]));

    // Undamaged groups are untouched by the search
    for (i, d) in decoded.iter().enumerate().filter(|(i, _)| *i != DAMAGED) {
        assert_eq!(d.errors(), 0, "group {}", i);
        assert_ne!(d.labels()[0], b'x', "group {}", i);
    }
}

#[test]
fn test_three_point_recovers_from_repeat() {
    init_test_tracing();
    let (_, out) = decode_all(config(DiversityMode::ThreePoint, 6), &damaged_stream());
    let decoded = groups(&out);
    assert_eq!(decoded[DAMAGED].errors(), 0);
    assert_eq!(words(&decoded[DAMAGED]), words(&decoded[REPEAT]));
    assert_eq!(decoded[DAMAGED].labels()[0], b'x');
}

#[test]
fn test_shallow_search_leaves_nominal_decode() {
    init_test_tracing();
    let (_, nominal) = decode_all(config(DiversityMode::Off, 4), &damaged_stream());
    let nominal = groups(&nominal)[DAMAGED];

    // No identical copy within five periods: the nearer groups carry other
    // PS segments and must not leak into the damaged one
    for mode in [DiversityMode::TwoPoint, DiversityMode::ThreePoint] {
        let (_, out) = decode_all(config(mode, 5), &damaged_stream());
        let decoded = groups(&out);
        assert_eq!(decoded.len(), 16);
        assert_eq!(decoded[DAMAGED], nominal, "{:?}", mode);
    }
}

#[test]
fn test_deep_three_point_search_finds_true_repeat() {
    init_test_tracing();
    let expected = expected_words(PI, 16);
    let (_, out) = decode_all(config(DiversityMode::ThreePoint, 8), &damaged_stream());
    let decoded = groups(&out);
    assert_eq!(decoded[DAMAGED].errors(), 0);
    assert_eq!(words(&decoded[DAMAGED]), expected[DAMAGED]);
    assert_eq!(labels(&decoded[DAMAGED]), "xBCD");
}

#[test]
fn test_damage_right_after_acquisition() {
    init_test_tracing();
    let expected = expected_words(PI, 6);
    for damaged in [2, 3] {
        let mut samples = StreamBuilder::new(GroupSource::new(PI)).groups(6).build();
        weaken(&mut samples, damaged, &[80, 81, 82, 83, 84, 85, 86]);

        // Most separations reach before the start of the stream
        let (_, out) = decode_all(config(DiversityMode::TwoPoint, 8), &samples);
        let decoded = groups(&out);
        assert_eq!(decoded.len(), 6);
        for (i, (d, e)) in decoded.iter().zip(&expected).enumerate() {
            assert_eq!(words(d)[..3], e[..3], "group {}", i);
            if i != damaged {
                assert_eq!(d.errors(), 0, "group {}", i);
            }
        }
        assert_eq!(labels(&decoded[damaged]), "ABCx");
    }
}
