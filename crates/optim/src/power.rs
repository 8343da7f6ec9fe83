//! Largest singular value of a sparse matrix by power iteration.

use ndarray::Array1;
use rand::Rng;
use rand_distr::StandardNormal;

use dp_relational_core::SparseMatrix;

/// Default convergence tolerance on successive estimates.
pub const POWER_TOLERANCE: f64 = 1e-6;

/// Default iteration cap.
pub const POWER_MAX_ITERATIONS: usize = 1000;

/// Outcome of a power iteration run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SingularValueEstimate {
    /// Estimated largest singular value.
    pub value: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether successive estimates agreed within tolerance.
    pub converged: bool,
}

/// Estimate `sigma_max(q)` by alternating products with `q` and `qᵀ`.
///
/// Starts from a random unit vector and stops once two successive estimates
/// differ by less than `tolerance`. Hitting `max_iterations` is not an
/// error: the latest estimate is returned with `converged == false`. A matrix
/// without rows, columns or nonzero action yields `0`.
pub fn largest_singular_value<R: Rng + ?Sized>(
    q: &SparseMatrix,
    tolerance: f64,
    max_iterations: usize,
    rng: &mut R,
) -> SingularValueEstimate {
    let zero = SingularValueEstimate {
        value: 0.0,
        iterations: 0,
        converged: true,
    };
    if q.nrows() == 0 || q.ncols() == 0 || q.nnz() == 0 {
        return zero;
    }

    let mut v: Array1<f64> = (0..q.ncols())
        .map(|_| rng.sample::<f64, _>(StandardNormal))
        .collect();
    let norm = l2(&v);
    if norm == 0.0 {
        v.fill(1.0);
        let n = l2(&v);
        v /= n;
    } else {
        v /= norm;
    }

    let mut previous = 0.0;
    let mut estimate = 0.0;
    for iteration in 1..=max_iterations {
        let mut u = q.dot(&v);
        let u_norm = l2(&u);
        if u_norm == 0.0 {
            return SingularValueEstimate {
                iterations: iteration,
                ..zero
            };
        }
        u /= u_norm;

        v = q.t_dot(&u);
        estimate = l2(&v);
        if estimate == 0.0 {
            return SingularValueEstimate {
                iterations: iteration,
                ..zero
            };
        }
        v /= estimate;

        if (estimate - previous).abs() < tolerance {
            return SingularValueEstimate {
                value: estimate,
                iterations: iteration,
                converged: true,
            };
        }
        previous = estimate;
    }

    tracing::trace!(
        estimate,
        max_iterations,
        "power iteration hit its cap, using latest estimate"
    );
    SingularValueEstimate {
        value: estimate,
        iterations: max_iterations,
        converged: false,
    }
}

fn l2(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}
