//! Per-run privacy parameters for relationship learning.

use serde::{Deserialize, Serialize};

use dp_relational_core::{DpError, ExponentialMechanism, GaussianMechanism, Result};

use crate::cdp::cdp_rho;

/// Per-query budget used when the run has no rounds.
///
/// Large enough that selection and release are effectively noiseless, finite
/// so that nothing downstream divides by zero.
pub const UNBOUNDED_EPSILON0: f64 = 100_000.0;

/// Inputs to the privacy parameter derivation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationalBudget {
    /// Total epsilon allocated to the relationship table.
    pub epsilon: f64,
    /// Target delta.
    pub delta: f64,
    /// Number of outer rounds `T`.
    pub rounds: usize,
    /// Workloads added per round.
    pub k_new_queries: usize,
    /// Candidate pool size for the exponential mechanism.
    pub k_choose_from: usize,
    /// Fraction of each round's budget spent on selection, in `(0, 1)`.
    pub exp_mech_alpha: f64,
    /// Maximum relationships per table-1 row (sensitivity bound).
    pub dmax: usize,
    /// Number of relationships in the original data.
    pub m_privacy: usize,
}

impl RelationalBudget {
    /// Validate the budget inputs.
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(DpError::invalid("epsilon must be positive and finite"));
        }
        if !self.delta.is_finite() || self.delta <= 0.0 || self.delta >= 1.0 {
            return Err(DpError::invalid("delta must be in (0, 1)"));
        }
        if !(self.exp_mech_alpha > 0.0 && self.exp_mech_alpha < 1.0) {
            return Err(DpError::precondition("exp_mech_alpha must be in (0, 1)"));
        }
        if self.k_new_queries == 0 {
            return Err(DpError::invalid("k_new_queries must be positive"));
        }
        if self.k_new_queries > self.k_choose_from {
            return Err(DpError::precondition(format!(
                "k_new_queries ({}) must not exceed k_choose_from ({})",
                self.k_new_queries, self.k_choose_from
            )));
        }
        if self.dmax == 0 {
            return Err(DpError::invalid("dmax must be positive"));
        }
        if self.m_privacy == 0 {
            return Err(DpError::invalid("m_privacy must be positive"));
        }
        Ok(())
    }
}

/// Scalars derived once per run from a [`RelationalBudget`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrivacyParams {
    /// Total zCDP budget.
    pub rho: f64,
    /// Per-round, per-query epsilon.
    pub epsilon0: f64,
    /// Multiplier applied to errors before the selection softmax.
    pub exp_mech_factor: f64,
    /// Standard deviation of the answer noise.
    pub gm_stddev: f64,
    /// Workloads added per round.
    pub k_new_queries: usize,
    /// Number of outer rounds.
    pub rounds: usize,
}

impl PrivacyParams {
    /// Derive the run's privacy parameters.
    ///
    /// `epsilon0 = sqrt(2 rho / (k_new_queries * rounds))`, split between the
    /// exponential mechanism (`sqrt(alpha)`) and the Gaussian mechanism
    /// (`sqrt(1 - alpha)`), each rescaled by `m_privacy / dmax`.
    pub fn derive(budget: &RelationalBudget) -> Result<Self> {
        budget.validate()?;

        let rho = cdp_rho(budget.epsilon, budget.delta)?;
        let epsilon0 = if budget.rounds == 0 {
            UNBOUNDED_EPSILON0
        } else {
            ((2.0 * rho) / (budget.k_new_queries as f64 * budget.rounds as f64)).sqrt()
        };
        if !epsilon0.is_finite() || epsilon0 <= 0.0 {
            return Err(DpError::numerical(format!(
                "per-round epsilon is degenerate ({epsilon0})"
            )));
        }

        let scale = budget.m_privacy as f64 / budget.dmax as f64;
        let exp_mech_factor = budget.exp_mech_alpha.sqrt() * epsilon0 * scale;
        let gm_stddev =
            (2.0f64.sqrt() / ((1.0 - budget.exp_mech_alpha).sqrt() * epsilon0)) / scale;

        Ok(Self {
            rho,
            epsilon0,
            exp_mech_factor,
            gm_stddev,
            k_new_queries: budget.k_new_queries,
            rounds: budget.rounds,
        })
    }

    /// zCDP consumed by `k_new_queries * rounds` releases at `epsilon0`.
    ///
    /// Equals `rho` whenever `rounds > 0`.
    pub fn composed_rho(&self) -> f64 {
        self.k_new_queries as f64 * self.rounds as f64 * self.epsilon0 * self.epsilon0 / 2.0
    }

    /// Selection mechanism for new workloads.
    pub fn exponential_mechanism(&self) -> ExponentialMechanism {
        ExponentialMechanism::new(self.exp_mech_factor)
    }

    /// Release mechanism for workload answers.
    pub fn gaussian_mechanism(&self) -> GaussianMechanism {
        GaussianMechanism::new(self.gm_stddev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget() -> RelationalBudget {
        RelationalBudget {
            epsilon: 1.0,
            delta: 1e-5,
            rounds: 10,
            k_new_queries: 3,
            k_choose_from: 300,
            exp_mech_alpha: 0.2,
            dmax: 10,
            m_privacy: 1_000,
        }
    }

    #[test]
    fn derived_scales_follow_the_split() {
        let b = budget();
        let p = PrivacyParams::derive(&b).expect("valid budget");
        let expected_eps0 = (2.0 * p.rho / 30.0).sqrt();
        assert!((p.epsilon0 - expected_eps0).abs() < 1e-12);
        assert!((p.exp_mech_factor - 0.2f64.sqrt() * expected_eps0 * 100.0).abs() < 1e-9);
        let expected_sd = 2.0f64.sqrt() / (0.8f64.sqrt() * expected_eps0) * 0.01;
        assert!((p.gm_stddev - expected_sd).abs() < 1e-12);
    }

    #[test]
    fn composition_spends_the_whole_budget() {
        let p = PrivacyParams::derive(&budget()).expect("valid budget");
        assert!((p.composed_rho() - p.rho).abs() < 1e-12);
    }

    #[test]
    fn zero_rounds_is_finite() {
        let b = RelationalBudget {
            rounds: 0,
            ..budget()
        };
        let p = PrivacyParams::derive(&b).expect("zero rounds is allowed");
        assert_eq!(p.epsilon0, UNBOUNDED_EPSILON0);
        assert!(p.gm_stddev.is_finite());
        assert!(p.exp_mech_factor.is_finite());
        assert_eq!(p.composed_rho(), 0.0);
    }

    #[test]
    fn alpha_outside_unit_interval_rejected() {
        for alpha in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let b = RelationalBudget {
                exp_mech_alpha: alpha,
                ..budget()
            };
            assert!(matches!(
                PrivacyParams::derive(&b),
                Err(DpError::Precondition { .. })
            ));
        }
    }

    #[test]
    fn too_many_new_queries_rejected() {
        let b = RelationalBudget {
            k_new_queries: 5,
            k_choose_from: 4,
            ..budget()
        };
        assert!(matches!(
            PrivacyParams::derive(&b),
            Err(DpError::Precondition { .. })
        ));
    }

    #[test]
    fn mechanisms_carry_derived_scales() {
        let p = PrivacyParams::derive(&budget()).expect("valid budget");
        assert_eq!(p.gaussian_mechanism().stddev, p.gm_stddev);
        assert_eq!(p.exponential_mechanism().factor, p.exp_mech_factor);
    }
}
