//! Projected gradient descent on the workload-matching objective.
//!
//! Minimizes `‖Q·b/m − a‖²` over the constraint set of a [`Projection`], with a
//! fixed step size of `m² / (2·σ_max(Q)²)` and a fixed number of steps.

use ndarray::Array1;
use rand::Rng;

use dp_relational_core::{sample_without_replacement, DpError, Result, SparseMatrix};

use crate::power::{largest_singular_value, POWER_MAX_ITERATIONS, POWER_TOLERANCE};
use crate::projection::Projection;

/// Step budget for the standard assignment.
pub const STANDARD_STEPS: usize = 100;

/// Step budget for the one-to-many assignment.
pub const ONE_TO_MANY_STEPS: usize = 20;

/// Callback information emitted after each optimization step.
#[derive(Clone, Debug)]
pub struct CallbackArgs<'a> {
    /// Zero-based optimization step.
    pub step: usize,
    /// Objective value after the step.
    pub loss: f64,
    /// Current (projected) iterate.
    pub params: &'a Array1<f64>,
}

/// Result of a [`pgd_optimize`] run.
#[derive(Clone, Debug)]
pub struct PgdResult {
    /// Final projected iterate.
    pub solution: Array1<f64>,
    /// Largest singular value estimate of `Q`.
    pub sigma_max: f64,
    /// Step size used for every update.
    pub learning_rate: f64,
    /// Objective value at `solution`.
    pub loss: f64,
}

/// Gradient of `‖Q·b/m − a‖²` with respect to `b`.
pub fn gradient(q: &SparseMatrix, b: &Array1<f64>, a: &Array1<f64>, m: f64) -> Array1<f64> {
    let residual = q.dot(b) / m - a;
    q.t_dot(&residual) * (2.0 / m)
}

/// Objective `‖Q·b/m − a‖²`.
pub fn loss(q: &SparseMatrix, b: &Array1<f64>, a: &Array1<f64>, m: f64) -> f64 {
    let residual = q.dot(b) / m - a;
    residual.dot(&residual)
}

/// Inverse Lipschitz constant of the gradient, `m² / (2σ²)`.
///
/// A zero or non-finite `sigma` yields a step size of 0.
pub fn learning_rate(sigma: f64, m: f64) -> f64 {
    if !sigma.is_finite() || sigma <= 0.0 {
        return 0.0;
    }
    (m * m) / (2.0 * sigma * sigma)
}

/// Random integral start with `m` unit entries among `n`.
pub fn random_start<R: Rng + ?Sized>(n: usize, m: usize, rng: &mut R) -> Result<Array1<f64>> {
    if m > n {
        return Err(DpError::precondition(format!(
            "cannot place {m} relationships in {n} cells"
        )));
    }
    let mut b = Array1::zeros(n);
    for i in sample_without_replacement(n, m, rng) {
        b[i] = 1.0;
    }
    Ok(b)
}

/// Random integral start with one unit entry per block of `block` entries.
pub fn random_one_to_many_start<R: Rng + ?Sized>(
    rows: usize,
    block: usize,
    rng: &mut R,
) -> Result<Array1<f64>> {
    if block == 0 && rows > 0 {
        return Err(DpError::precondition("one-to-many block must be non-empty"));
    }
    let mut b = Array1::zeros(rows * block);
    for r in 0..rows {
        b[r * block + rng.gen_range(0..block)] = 1.0;
    }
    Ok(b)
}

/// Run `steps` projected gradient steps from `b0`.
///
/// Every update is `b ← P(b − lr·∇)`. The callback observes each iterate but
/// cannot stop the run.
#[allow(clippy::too_many_arguments)]
pub fn pgd_optimize<R: Rng + ?Sized>(
    q: &SparseMatrix,
    b0: Array1<f64>,
    a: &Array1<f64>,
    m: f64,
    steps: usize,
    projection: &Projection,
    rng: &mut R,
    mut callback: impl FnMut(CallbackArgs<'_>),
) -> Result<PgdResult> {
    if b0.len() != q.ncols() {
        return Err(DpError::shape(q.ncols(), b0.len()));
    }
    if a.len() != q.nrows() {
        return Err(DpError::shape(q.nrows(), a.len()));
    }
    if !m.is_finite() || m <= 0.0 {
        return Err(DpError::invalid(format!(
            "relationship count must be positive, got {m}"
        )));
    }
    if let Projection::OneToMany { block } = *projection {
        if block == 0 || b0.len() % block != 0 {
            return Err(DpError::precondition(format!(
                "iterate of length {} does not split into blocks of {block}",
                b0.len()
            )));
        }
    }

    let estimate = largest_singular_value(q, POWER_TOLERANCE, POWER_MAX_ITERATIONS, rng);
    let lr = learning_rate(estimate.value, m);

    let mut b = b0;
    for step in 0..steps {
        let g = gradient(q, &b, a, m);
        b.scaled_add(-lr, &g);
        b = projection.apply(&b);

        callback(CallbackArgs {
            step,
            loss: loss(q, &b, a, m),
            params: &b,
        });
    }

    let final_loss = loss(q, &b, a, m);
    if !final_loss.is_finite() {
        return Err(DpError::numerical("optimizer diverged to a non-finite loss"));
    }
    Ok(PgdResult {
        solution: b,
        sigma_max: estimate.value,
        learning_rate: lr,
        loss: final_loss,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{is_one_to_many_feasible, is_simplex_cap_feasible};
    use crate::test_utils::{indicator_rows, relative_l2_error};
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn gradient_matches_closed_form() {
        let q = SparseMatrix::from_diagonal(&[1.0, 2.0]);
        let b = array![1.0, 1.0];
        let a = array![0.0, 0.0];
        // residual = [0.5, 1.0], Qᵀr = [0.5, 2.0], times 2/m = 1.
        let g = gradient(&q, &b, &a, 2.0);
        assert_eq!(g, array![0.5, 2.0]);
        assert!((loss(&q, &b, &a, 2.0) - 1.25).abs() < 1e-12);
    }

    #[test]
    fn zero_sigma_freezes_iterate() {
        assert_eq!(learning_rate(0.0, 3.0), 0.0);
        assert_eq!(learning_rate(f64::NAN, 3.0), 0.0);
        assert!((learning_rate(2.0, 4.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn loss_does_not_increase_on_learnable_target() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        // Three query rows over twelve cells; target puts all mass in row 0.
        let q = indicator_rows(3, 12);
        let target = array![1.0, 0.0, 0.0];
        let m = 4.0;
        let start = random_start(12, 4, &mut rng).expect("fits");
        let initial = loss(&q, &start, &target, m);

        let mut history = Vec::new();
        let result = pgd_optimize(
            &q,
            start,
            &target,
            m,
            STANDARD_STEPS,
            &Projection::SimplexCap { total: m },
            &mut rng,
            |args| history.push(args.loss),
        )
        .expect("valid inputs");

        assert_eq!(history.len(), STANDARD_STEPS);
        assert!(result.loss <= initial + 1e-12);
        assert!(result.loss < 1e-6, "loss = {}", result.loss);
        assert!(is_simplex_cap_feasible(&result.solution, m, 1e-9));
        let fitted = q.dot(&result.solution) / m;
        assert!(relative_l2_error(&target, &fitted) < 1e-3);
        for pair in history.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-9);
        }
    }

    #[test]
    fn one_to_many_iterates_stay_feasible() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let q = indicator_rows(2, 8);
        let target = array![0.25, 0.75];
        let mut start = Array1::zeros(8);
        start[0] = 1.0;
        start[4] = 1.0;
        let result = pgd_optimize(
            &q,
            start,
            &target,
            2.0,
            ONE_TO_MANY_STEPS,
            &Projection::OneToMany { block: 4 },
            &mut rng,
            |args| assert!(is_one_to_many_feasible(args.params, 4, 1e-9)),
        )
        .expect("valid inputs");
        assert!(is_one_to_many_feasible(&result.solution, 4, 1e-9));
    }

    #[test]
    fn empty_query_matrix_keeps_projected_start() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let q = SparseMatrix::empty(4);
        let start = array![1.0, 0.0, 1.0, 0.0];
        let result = pgd_optimize(
            &q,
            start.clone(),
            &Array1::zeros(0),
            2.0,
            10,
            &Projection::SimplexCap { total: 2.0 },
            &mut rng,
            |_| {},
        )
        .expect("valid inputs");
        assert_eq!(result.learning_rate, 0.0);
        assert_eq!(result.solution, start);
    }

    #[test]
    fn random_starts_are_integral_and_feasible() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let b = random_start(10, 4, &mut rng).expect("fits");
        assert!(is_simplex_cap_feasible(&b, 4.0, 0.0));
        assert!(b.iter().all(|&v| v == 0.0 || v == 1.0));
        assert!(random_start(3, 4, &mut rng).is_err());

        let b = random_one_to_many_start(3, 5, &mut rng).expect("non-empty block");
        assert!(is_one_to_many_feasible(&b, 5, 0.0));
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let q = SparseMatrix::from_diagonal(&[1.0, 1.0]);
        let err = pgd_optimize(
            &q,
            Array1::zeros(3),
            &Array1::zeros(2),
            1.0,
            1,
            &Projection::SimplexCap { total: 1.0 },
            &mut rng,
            |_| {},
        )
        .unwrap_err();
        assert!(matches!(err, DpError::ShapeMismatch { .. }));
    }
}
