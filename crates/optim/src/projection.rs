//! Projections onto the assignment constraint sets.

use ndarray::Array1;

/// Constraint set the optimizer projects onto after every step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    /// `{x in [0, 1]^n : sum(x) = total}`.
    SimplexCap {
        /// Target sum.
        total: f64,
    },
    /// Every consecutive block of `block` entries lies on the probability simplex.
    OneToMany {
        /// Entries per table-1 row.
        block: usize,
    },
}

impl Projection {
    /// Project `x` onto this constraint set.
    pub fn apply(&self, x: &Array1<f64>) -> Array1<f64> {
        match *self {
            Projection::SimplexCap { total } => project_simplex_cap(x, total),
            Projection::OneToMany { block } => project_one_to_many(x, block),
        }
    }
}

/// Project onto `{x in [0, 1]^n : sum(x) = m}`.
///
/// Entries are clipped to `[0, 1]`. If the clipped mass exceeds `m` it is
/// scaled down uniformly. Otherwise the entries are visited in descending
/// order and the shortest prefix is set to 1 such that the remaining entries,
/// scaled by `(m - k) / rest`, stay at or below 1; a remainder with no mass is
/// filled uniformly. When no prefix qualifies (only possible for `m > n`) the
/// scan ends on the last entry and every entry is set to 1 without scaling.
pub fn project_simplex_cap(x: &Array1<f64>, m: f64) -> Array1<f64> {
    let n = x.len();
    let m = m.max(0.0);
    let mut clipped = x.mapv(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) });
    if n == 0 {
        return clipped;
    }

    let sum = clipped.sum();
    if sum > m {
        let scale = m / sum;
        clipped.mapv_inplace(|v| v * scale);
        return clipped;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| clipped[b].total_cmp(&clipped[a]));
    let sorted: Vec<f64> = order.iter().map(|&i| clipped[i]).collect();

    // suffix[k] = sum(sorted[k..]); trailing zeros sum to exactly zero.
    let mut suffix = vec![0.0; n + 1];
    for k in (0..n).rev() {
        suffix[k] = suffix[k + 1] + sorted[k];
    }

    let mut out_sorted = vec![1.0; n];
    for k in 0..n {
        let need = m - k as f64;
        let rest = suffix[k];
        if rest <= 0.0 {
            let fill = (need / (n - k) as f64).clamp(0.0, 1.0);
            out_sorted[k..].iter_mut().for_each(|v| *v = fill);
            break;
        }
        if sorted[k] * need / rest <= 1.0 {
            let scale = need / rest;
            for j in k..n {
                out_sorted[j] = (sorted[j] * scale).min(1.0);
            }
            break;
        }
    }

    let mut out = Array1::zeros(n);
    for (p, &i) in order.iter().enumerate() {
        out[i] = out_sorted[p];
    }
    out
}

/// Euclidean projection onto the probability simplex `{x >= 0 : sum(x) = 1}`.
///
/// Sort-and-threshold construction: find the largest prefix whose shifted
/// entries stay positive and subtract the matching threshold from all entries.
pub fn project_simplex(v: &[f64]) -> Vec<f64> {
    if v.is_empty() {
        return Vec::new();
    }
    let clean: Vec<f64> = v
        .iter()
        .map(|&x| if x.is_finite() { x } else { 0.0 })
        .collect();
    let mut sorted = clean.clone();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (j, &u) in sorted.iter().enumerate() {
        cumulative += u;
        let t = (cumulative - 1.0) / (j + 1) as f64;
        if u - t > 0.0 {
            theta = t;
        }
    }
    clean.into_iter().map(|x| (x - theta).max(0.0)).collect()
}

/// Project every row block of `block` entries onto the probability simplex.
///
/// Panics if `x.len()` is not a multiple of `block`.
pub fn project_one_to_many(x: &Array1<f64>, block: usize) -> Array1<f64> {
    assert!(block > 0, "block size must be positive");
    assert!(
        x.len() % block == 0,
        "vector length must be a multiple of the block size"
    );
    let mut out = Array1::zeros(x.len());
    for (row, mut dst) in x
        .exact_chunks(block)
        .into_iter()
        .zip(out.exact_chunks_mut(block))
    {
        let projected = project_simplex(&row.to_vec());
        dst.iter_mut()
            .zip(projected)
            .for_each(|(d, v)| *d = v);
    }
    out
}

/// Whether `x` lies in `[0, 1]^n` with sum `m` up to `tol`.
pub fn is_simplex_cap_feasible(x: &Array1<f64>, m: f64, tol: f64) -> bool {
    x.iter().all(|&v| (-tol..=1.0 + tol).contains(&v)) && (x.sum() - m).abs() <= tol
}

/// Whether every row block of `x` sums to 1 with entries in `[0, 1]`.
pub fn is_one_to_many_feasible(x: &Array1<f64>, block: usize, tol: f64) -> bool {
    if block == 0 || x.len() % block != 0 {
        return false;
    }
    x.iter().all(|&v| (-tol..=1.0 + tol).contains(&v))
        && x.exact_chunks(block)
            .into_iter()
            .all(|row| (row.sum() - 1.0).abs() <= tol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn cap_scales_down_excess_mass() {
        let out = project_simplex_cap(&array![1.0, 1.0, 2.0, -1.0], 1.5);
        assert!((out.sum() - 1.5).abs() < 1e-12);
        assert_eq!(out[3], 0.0);
        assert!((out[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn cap_saturates_large_entries() {
        // Raising mass to 2.5 pushes the largest entry to the cap.
        let out = project_simplex_cap(&array![0.9, 0.3, 0.3], 2.5);
        assert!((out.sum() - 2.5).abs() < 1e-12);
        assert_eq!(out[0], 1.0);
        assert!((out[1] - 0.75).abs() < 1e-12);
        assert!((out[2] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn cap_fills_empty_remainder() {
        let out = project_simplex_cap(&array![1.0, 0.0, 0.0], 2.0);
        assert_eq!(out[0], 1.0);
        assert!((out[1] - 0.5).abs() < 1e-12);
        assert!((out[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn cap_beyond_length_saturates_everything() {
        let out = project_simplex_cap(&array![0.2, 0.1], 5.0);
        assert_eq!(out, array![1.0, 1.0]);
    }

    #[test]
    fn integral_assignment_is_fixed_point() {
        let x = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        assert_eq!(project_simplex_cap(&x, 3.0), x);
    }

    #[test]
    fn simplex_projection_known_value() {
        let out = project_simplex(&[0.5, 0.5, 1.0]);
        assert!((out[0] - 1.0 / 6.0).abs() < 1e-12);
        assert!((out[1] - 1.0 / 6.0).abs() < 1e-12);
        assert!((out[2] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn one_to_many_blocks_are_independent() {
        let x = array![2.0, 0.0, 0.0, 0.1, 0.1, 0.1];
        let out = project_one_to_many(&x, 3);
        let values = out.to_vec();
        assert_eq!(values[..3], [1.0, 0.0, 0.0]);
        for v in &values[3..] {
            assert!((v - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    proptest! {
        #[test]
        fn cap_output_is_feasible(
            raw in proptest::collection::vec(-2.0f64..3.0, 1..50),
            frac in 0.0f64..=1.0,
        ) {
            let x = Array1::from_vec(raw);
            let m = frac * x.len() as f64;
            let out = project_simplex_cap(&x, m);
            prop_assert!(is_simplex_cap_feasible(&out, m, 1e-9));
        }

        #[test]
        fn cap_is_idempotent(
            raw in proptest::collection::vec(-2.0f64..3.0, 1..50),
            frac in 0.0f64..=1.0,
        ) {
            let x = Array1::from_vec(raw);
            let m = frac * x.len() as f64;
            let once = project_simplex_cap(&x, m);
            let twice = project_simplex_cap(&once, m);
            for (a, b) in once.iter().zip(twice.iter()) {
                prop_assert!((a - b).abs() < 1e-9);
            }
        }

        #[test]
        fn one_to_many_output_is_feasible(
            raw in proptest::collection::vec(-5.0f64..5.0, 1..12),
            rows in 1usize..6,
        ) {
            let block = raw.len();
            let tiled: Vec<f64> = (0..rows)
                .flat_map(|r| raw.iter().map(move |v| v * (r as f64 + 1.0)))
                .collect();
            let out = project_one_to_many(&Array1::from_vec(tiled), block);
            prop_assert!(is_one_to_many_feasible(&out, block, 1e-9));
        }
    }
}
