//! Conversions between zero-concentrated DP (ρ) and approximate (ε, δ)-DP.
//!
//! Uses the tight conversion of Canonne, Kamath and Steinke (2020), evaluated
//! by bisection over the Rényi order.

use dp_relational_core::{DpError, Result};

const BISECTION_STEPS: usize = 1000;

/// Smallest δ such that ρ-zCDP implies (ε, δ)-DP.
pub fn cdp_delta(rho: f64, eps: f64) -> Result<f64> {
    if !rho.is_finite() || rho < 0.0 {
        return Err(DpError::invalid("rho must be finite and non-negative"));
    }
    if !eps.is_finite() || eps < 0.0 {
        return Err(DpError::invalid("epsilon must be finite and non-negative"));
    }
    if rho == 0.0 {
        return Ok(0.0);
    }

    // Bisection for the optimal Rényi order on the sign of the derivative.
    let mut amin = 1.01;
    let mut amax = (eps + 1.0) / (2.0 * rho) + 2.0;
    let mut alpha = amin;
    for _ in 0..BISECTION_STEPS {
        alpha = (amin + amax) / 2.0;
        let derivative = (2.0 * alpha - 1.0) * rho - eps + (-1.0 / alpha).ln_1p();
        if derivative < 0.0 {
            amin = alpha;
        } else {
            amax = alpha;
        }
    }

    let delta = ((alpha - 1.0) * (alpha * rho - eps) + alpha * (-1.0 / alpha).ln_1p()).exp()
        / (alpha - 1.0);
    Ok(delta.min(1.0))
}

/// Smallest ε such that ρ-zCDP implies (ε, δ)-DP.
pub fn cdp_eps(rho: f64, delta: f64) -> Result<f64> {
    if !rho.is_finite() || rho < 0.0 {
        return Err(DpError::invalid("rho must be finite and non-negative"));
    }
    if !(delta > 0.0) {
        return Err(DpError::invalid("delta must be positive"));
    }
    if delta >= 1.0 || rho == 0.0 {
        return Ok(0.0);
    }

    let mut epsmin = 0.0;
    let mut epsmax = rho + 2.0 * (rho * (1.0 / delta).ln()).sqrt();
    for _ in 0..BISECTION_STEPS {
        let eps = (epsmin + epsmax) / 2.0;
        if cdp_delta(rho, eps)? <= delta {
            epsmax = eps;
        } else {
            epsmin = eps;
        }
    }
    Ok(epsmax)
}

/// Largest ρ such that ρ-zCDP implies (ε, δ)-DP.
pub fn cdp_rho(eps: f64, delta: f64) -> Result<f64> {
    if !eps.is_finite() || eps < 0.0 {
        return Err(DpError::invalid("epsilon must be finite and non-negative"));
    }
    if !(delta > 0.0) {
        return Err(DpError::invalid("delta must be positive"));
    }
    if delta >= 1.0 {
        return Ok(0.0);
    }

    let mut rhomin = 0.0;
    let mut rhomax = eps + 1.0;
    for _ in 0..BISECTION_STEPS {
        let rho = (rhomin + rhomax) / 2.0;
        if cdp_delta(rho, eps)? <= delta {
            rhomin = rho;
        } else {
            rhomax = rho;
        }
    }
    Ok(rhomin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_rho_has_zero_delta() {
        assert_eq!(cdp_delta(0.0, 1.0).expect("valid"), 0.0);
        assert_eq!(cdp_eps(0.0, 1e-5).expect("valid"), 0.0);
    }

    #[test]
    fn rho_for_unit_epsilon() {
        // Reference value of the conversion at eps=1, delta=1e-5.
        let rho = cdp_rho(1.0, 1e-5).expect("valid");
        assert!((rho - 0.030557).abs() < 1e-5, "rho = {rho}");
    }

    #[test]
    fn eps_and_rho_are_inverse() {
        let rho = cdp_rho(3.0, 1e-6).expect("valid");
        let eps = cdp_eps(rho, 1e-6).expect("valid");
        assert!((eps - 3.0).abs() < 1e-6, "eps = {eps}");
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(cdp_delta(-1.0, 1.0).is_err());
        assert!(cdp_rho(1.0, 0.0).is_err());
        assert!(cdp_eps(1.0, -0.5).is_err());
        assert_eq!(cdp_rho(1.0, 1.0).expect("valid"), 0.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 16, .. ProptestConfig::default() })]

        #[test]
        fn rho_grows_with_epsilon(
            eps_a in 0.1f64..10.0,
            eps_b in 0.1f64..10.0,
        ) {
            let low = eps_a.min(eps_b);
            let high = eps_a.max(eps_b);
            let rho_low = cdp_rho(low, 1e-5).expect("valid");
            let rho_high = cdp_rho(high, 1e-5).expect("valid");
            prop_assert!(rho_high >= rho_low - 1e-12);
        }

        #[test]
        fn rho_meets_delta(eps in 0.1f64..10.0) {
            let rho = cdp_rho(eps, 1e-5).expect("valid");
            prop_assert!(cdp_delta(rho, eps).expect("valid") <= 1e-5 * (1.0 + 1e-9));
        }
    }
}
