//! Noise mechanisms for private workload selection and answer release.

use ndarray::Array1;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::sampling::{inverse_cdf_sample, softmax};

/// Add Gaussian noise to every coordinate of an answer vector in-place.
pub fn add_gaussian_noise<R: Rng + ?Sized>(answers: &mut Array1<f64>, sigma: f64, rng: &mut R) {
    if !sigma.is_finite() || sigma <= 0.0 || answers.is_empty() {
        return;
    }

    let dist = match Normal::new(0.0, sigma) {
        Ok(d) => d,
        Err(_) => return,
    };

    answers.mapv_inplace(|x| {
        if x.is_finite() {
            x + dist.sample(rng)
        } else {
            x
        }
    });
}

/// Gaussian mechanism releasing noisy workload answers.
#[derive(Clone, Debug)]
pub struct GaussianMechanism {
    /// Standard deviation of the per-coordinate noise.
    pub stddev: f64,
}

impl GaussianMechanism {
    /// Create a new Gaussian mechanism.
    pub fn new(stddev: f64) -> Self {
        Self { stddev }
    }

    /// Return a noised copy of `answers`; the input is left untouched.
    pub fn privatize<R: Rng + ?Sized>(&self, answers: &Array1<f64>, rng: &mut R) -> Array1<f64> {
        let mut out = answers.clone();
        add_gaussian_noise(&mut out, self.stddev, rng);
        out
    }
}

/// Exponential mechanism over a finite candidate list scored by error.
///
/// Candidates with larger scores are exponentially more likely to be picked.
#[derive(Clone, Debug)]
pub struct ExponentialMechanism {
    /// Multiplier applied to scores before the softmax.
    pub factor: f64,
}

impl ExponentialMechanism {
    /// Create a new exponential mechanism.
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }

    /// Selection distribution `softmax(factor * scores)`.
    pub fn distribution(&self, scores: &[f64]) -> Vec<f64> {
        let scaled: Vec<f64> = scores.iter().map(|&s| self.factor * s).collect();
        softmax(&scaled)
    }

    /// Sample one candidate position, or `None` for an empty score list.
    pub fn select<R: Rng + ?Sized>(&self, scores: &[f64], rng: &mut R) -> Option<usize> {
        if scores.is_empty() {
            return None;
        }
        let dist = self.distribution(scores);
        let u: f64 = rng.gen();
        Some(inverse_cdf_sample(&dist, u))
    }
}
