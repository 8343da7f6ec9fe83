//! Random sampling primitives: subsets, softmax and inverse-CDF draws.

use rand::seq::index;
use rand::seq::SliceRandom;
use rand::Rng;

/// Sample `k` distinct indices from `[0, n)` uniformly without replacement.
///
/// `k` is capped at `n`. The returned order is random.
pub fn sample_without_replacement<R: Rng + ?Sized>(n: usize, k: usize, rng: &mut R) -> Vec<usize> {
    if n == 0 || k == 0 {
        return Vec::new();
    }
    index::sample(rng, n, k.min(n)).into_vec()
}

/// Sample `k` distinct items from `pool` without replacement.
pub fn sample_from<T: Clone, R: Rng + ?Sized>(pool: &[T], k: usize, rng: &mut R) -> Vec<T> {
    sample_without_replacement(pool.len(), k, rng)
        .into_iter()
        .map(|i| pool[i].clone())
        .collect()
}

/// Random permutation of `[0, n)`.
pub fn permutation<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut out: Vec<usize> = (0..n).collect();
    out.shuffle(rng);
    out
}

/// Max-shifted softmax.
///
/// A constant input (including all zeros) yields the uniform distribution. If
/// the maximum is `+inf` the mass is split evenly across the maximal entries;
/// any other non-finite maximum falls back to uniform.
pub fn softmax(v: &[f64]) -> Vec<f64> {
    if v.is_empty() {
        return Vec::new();
    }
    let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        let winners = if max == f64::INFINITY {
            v.iter().filter(|&&x| x == max).count()
        } else {
            0
        };
        if winners == 0 {
            return vec![1.0 / v.len() as f64; v.len()];
        }
        return v
            .iter()
            .map(|&x| if x == max { 1.0 / winners as f64 } else { 0.0 })
            .collect();
    }

    let exps: Vec<f64> = v
        .iter()
        .map(|&x| if x.is_nan() { 0.0 } else { (x - max).exp() })
        .collect();
    // The maximal entry contributes exp(0) = 1, so the sum is at least one.
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Position of the first cumulative mass reaching `u`.
///
/// Draws from `dist` when `u` is uniform on `[0, 1)`. Rounding slack in the
/// cumulative sum is absorbed by the last entry.
pub fn inverse_cdf_sample(dist: &[f64], u: f64) -> usize {
    assert!(!dist.is_empty(), "distribution must not be empty");
    let mut cumulative = 0.0;
    for (i, &p) in dist.iter().enumerate() {
        cumulative += p;
        if cumulative >= u {
            return i;
        }
    }
    dist.len() - 1
}

/// Draw one index proportionally to the non-negative `weights`.
///
/// Zero total weight falls back to a uniform draw.
pub fn categorical_sample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    assert!(!weights.is_empty(), "weights must not be empty");
    let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    if !total.is_finite() || total <= 0.0 {
        return rng.gen_range(0..weights.len());
    }
    let u: f64 = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w.max(0.0);
        if cumulative > u {
            return i;
        }
    }
    // Rounding slack: return the last entry with positive weight.
    weights
        .iter()
        .rposition(|&w| w > 0.0)
        .unwrap_or(weights.len() - 1)
}
