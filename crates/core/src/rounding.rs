//! Unbiased rounding of fractional assignments to 0/1 assignments.

use ndarray::Array1;
use rand::Rng;

use crate::error::{DpError, Result};
use crate::sampling::{categorical_sample, permutation, sample_without_replacement};

/// Select exactly `m` positions so that position `i` is chosen with
/// probability `x[i]`.
///
/// `x` is expected to lie in `[0, 1]` and sum to `m`; entries are clipped to
/// `[0, 1]` and a small deviation of the sum is absorbed proportionally. Uses
/// systematic sampling over a random permutation: one uniform offset, `m`
/// evenly spaced thresholds, and every threshold picks the cell whose
/// cumulative interval contains it. Returned positions are ascending.
pub fn unbiased_sample<R: Rng + ?Sized>(x: &Array1<f64>, m: usize, rng: &mut R) -> Result<Vec<usize>> {
    let n = x.len();
    if m > n {
        return Err(DpError::precondition(format!(
            "cannot select {m} cells out of {n}"
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(DpError::numerical("fractional assignment contains non-finite values"));
    }
    if m == 0 {
        return Ok(Vec::new());
    }

    let weights: Vec<f64> = x.iter().map(|v| v.clamp(0.0, 1.0)).collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        let mut out = sample_without_replacement(n, m, rng);
        out.sort_unstable();
        return Ok(out);
    }

    let spacing = total / m as f64;
    let offset: f64 = rng.gen();
    let mut chosen = vec![false; n];
    let mut count = 0usize;
    let mut k = 0usize;
    let mut threshold = offset * spacing;
    let mut cumulative = 0.0;
    for i in permutation(n, rng) {
        cumulative += weights[i];
        while k < m && threshold < cumulative {
            if !chosen[i] {
                chosen[i] = true;
                count += 1;
            }
            k += 1;
            threshold = (k as f64 + offset) * spacing;
        }
        if k == m {
            break;
        }
    }

    // Slack guard: rounding in the cumulative sum, or a cell heavier than the
    // spacing, can leave thresholds unclaimed. Refill by weight among the
    // unchosen cells so the count stays exact.
    while count < m {
        let rest: Vec<usize> = (0..n).filter(|&i| !chosen[i]).collect();
        let rest_weights: Vec<f64> = rest.iter().map(|&i| weights[i]).collect();
        chosen[rest[categorical_sample(&rest_weights, rng)]] = true;
        count += 1;
    }

    Ok((0..n).filter(|&i| chosen[i]).collect())
}

/// Pick one position per row block of `block` entries.
///
/// Each block is treated as an unnormalized categorical distribution; a block
/// without mass draws uniformly. Returns flattened positions, one per block.
pub fn one_to_many_sample<R: Rng + ?Sized>(
    x: &Array1<f64>,
    block: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    if block == 0 {
        return Err(DpError::invalid("block size must be positive"));
    }
    if x.len() % block != 0 {
        return Err(DpError::shape(
            (x.len() / block + 1) * block,
            x.len(),
        ));
    }
    let mut out = Vec::with_capacity(x.len() / block);
    for (r, row) in x.exact_chunks(block).into_iter().enumerate() {
        let weights: Vec<f64> = row
            .iter()
            .map(|&v| if v.is_finite() { v } else { 0.0 })
            .collect();
        out.push(r * block + categorical_sample(&weights, rng));
    }
    Ok(out)
}
