//! Noise generation utilities for synthetic camera frames.
//!
//! Provides the two noise sources of the camera model:
//! - Poisson shot noise on the expected electron count of each pixel
//! - Gaussian readout noise with zero mean
//!
//! Sampling runs in parallel row bands through [`map_seeded`], so a given seed
//! always reproduces the same field regardless of thread scheduling.

use crate::algo::map_seeded;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, Poisson};

/// Rows per parallel band for noise generation.
const NOISE_BAND_ROWS: usize = 64;

/// Means at or above this are sampled from Normal(mean, sqrt(mean)).
///
/// `Poisson::new` rejects means past roughly 1.8e19; well below that the
/// Normal approximation is exact to far better than one count in a million.
const POISSON_NORMAL_CUTOFF: f64 = 1.0e12;

fn sample_poisson(mean: f64, rng: &mut StdRng) -> f64 {
    if !(mean > 0.0) {
        // Zero or NaN mean means zero electrons, and no draw is consumed
        return 0.0;
    }
    if !mean.is_finite() {
        return mean;
    }
    if mean < POISSON_NORMAL_CUTOFF {
        if let Ok(poisson) = Poisson::new(mean) {
            return poisson.sample(rng);
        }
    }
    Normal::new(mean, mean.sqrt()).map_or(mean, |normal| normal.sample(rng).round().max(0.0))
}

/// Sample a full sensor electron image.
///
/// Every pixel receives a Poisson draw around its expected electron count
/// (signal plus dark current) and, when `read_noise` is positive, an
/// independent Normal(0, `read_noise`) readout term. The result may be
/// negative where readout noise dominates; quantization downstream clamps it.
/// Means too large for a Poisson sampler fall back to the Normal limit, so
/// overexposed pixels come out near their mean rather than dark.
///
/// # Arguments
/// * `mean_electrons` - Expected electrons per pixel
/// * `read_noise` - Readout noise RMS in electrons
/// * `seed` - Seed for the banded RNG streams
///
/// # Example
/// ```
/// use ndarray::Array2;
/// use shared::image_proc::noise::sample_sensor_electrons;
///
/// let zeros = Array2::<f64>::zeros((8, 8));
/// let out = sample_sensor_electrons(&zeros, 0.0, 42);
/// assert!(out.iter().all(|&v| v == 0.0));
/// ```
pub fn sample_sensor_electrons(
    mean_electrons: &Array2<f64>,
    read_noise: f64,
    seed: u64,
) -> Array2<f64> {
    let readout = if read_noise > 0.0 {
        Normal::new(0.0, read_noise).ok()
    } else {
        None
    };

    map_seeded(mean_electrons, seed, NOISE_BAND_ROWS, |&mean, rng| {
        let shot = sample_poisson(mean, rng);
        shot + readout.as_ref().map_or(0.0, |dist| dist.sample(rng))
    })
}
