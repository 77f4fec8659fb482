//! Seeded channel impairments for soft bit samples
//!
//! Samples are nominally ±amplitude; noise is added in place so a test can
//! reproduce the same stream from the same seed.

use rand::prelude::*;
use rand_distr::{Distribution, Normal, Uniform};
use tracing::warn;

/// Noise standard deviation giving `snr_db` per bit for unit amplitude
pub fn sigma_for_snr(snr_db: f32) -> f32 {
    10.0_f32.powf(-snr_db / 20.0)
}

/// Add white Gaussian noise
pub fn add_white_noise(samples: &mut [f32], sigma: f32, seed: u64) {
    let normal = match Normal::new(0.0, sigma) {
        Ok(normal) => normal,
        Err(e) => {
            warn!(sigma, error = %e, "invalid noise level, leaving samples clean");
            return;
        }
    };
    let mut rng = StdRng::seed_from_u64(seed);
    for sample in samples.iter_mut() {
        *sample += normal.sample(&mut rng);
    }
}

/// Slow amplitude fading (QSB), `period` samples per cycle, depth 0..1
pub fn apply_fading(samples: &mut [f32], period: f32, depth: f32) {
    for (i, sample) in samples.iter_mut().enumerate() {
        let phase = 2.0 * std::f32::consts::PI * i as f32 / period;
        *sample *= 1.0 - depth * 0.5 * (1.0 + phase.sin());
    }
}

/// Replace a random fraction of samples with impulsive spikes
pub fn add_random_spikes(samples: &mut [f32], probability: f32, seed: u64) {
    let Ok(spike) = Uniform::new(-1.5f32, 1.5) else {
        return;
    };
    let mut rng = StdRng::seed_from_u64(seed);
    for sample in samples.iter_mut() {
        if rng.random::<f32>() < probability {
            *sample = spike.sample(&mut rng);
        }
    }
}

/// Count samples whose sign differs from the clean reference
pub fn count_bit_errors(clean: &[f32], noisy: &[f32]) -> usize {
    clean
        .iter()
        .zip(noisy)
        .filter(|(c, n)| (**c >= 0.0) != (**n >= 0.0))
        .count()
}
