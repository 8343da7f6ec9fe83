//! Run configuration for relationship synthesis.
//!
//! All fields have defaults, so a partial JSON/TOML document deserializes into
//! a complete configuration.

use serde::{Deserialize, Serialize};

use dp_relational_accounting::RelationalBudget;
use dp_relational_core::{DpError, Result};

/// Default table-2 to table-1 slice ratio in one-to-many mode.
pub const DEFAULT_EXPANSION_RATIO: f64 = 2.5;

/// Compute target for the synthesis loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    /// Host CPU.
    #[default]
    Cpu,
}

/// Shape constraint on the learned assignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignmentMode {
    /// Exactly `n_relationship_synth` binary relationships anywhere in the cross product.
    #[default]
    Standard,
    /// Exactly one table-2 partner per table-1 row.
    OneToMany {
        /// Table-2 slice size relative to the table-1 slice size, at least 1.
        #[serde(default = "default_expansion_ratio")]
        expansion_ratio: f64,
    },
}

fn default_expansion_ratio() -> f64 {
    DEFAULT_EXPANSION_RATIO
}

impl AssignmentMode {
    /// One-to-many mode with the default expansion ratio.
    pub fn one_to_many() -> Self {
        AssignmentMode::OneToMany {
            expansion_ratio: DEFAULT_EXPANSION_RATIO,
        }
    }

    /// Whether this is the one-to-many mode.
    pub fn is_one_to_many(&self) -> bool {
        matches!(self, AssignmentMode::OneToMany { .. })
    }
}

/// Relationships the current-answer estimate is computed over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerScope {
    /// Only relationships inside the active slice, normalized by their count.
    #[default]
    Slice,
    /// Every relationship of the current global vector.
    Full,
}

/// Parameters of one relationship synthesis run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationalSynthConfig {
    /// Total epsilon for the relationship table.
    pub epsilon: f64,
    /// Target delta.
    pub delta: f64,
    /// Number of outer rounds `T`.
    pub rounds: usize,
    /// Target number of cross-product cells per slice.
    pub subtable_size: usize,
    /// Number of selected workloads fitted per slice; `None` fits all of them.
    pub queries_to_reuse: Option<usize>,
    /// Workloads added by the exponential mechanism each round.
    pub k_new_queries: usize,
    /// Candidate pool size for the exponential mechanism.
    pub k_choose_from: usize,
    /// Share of each round's budget spent on selection, in `(0, 1)`.
    pub exp_mech_alpha: f64,
    /// Fit the worst-fitting selected workloads instead of a random subset.
    pub choose_worst: bool,
    /// Slices optimized per round.
    pub slices_per_iter: usize,
    /// Compute target.
    pub device: Device,
    /// Assignment shape.
    pub mode: AssignmentMode,
    /// Relationships used for the current-answer estimate.
    pub answer_scope: AnswerScope,
    /// Seed for [`crate::RelationalSynthesizer::from_seed`]; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for RelationalSynthConfig {
    fn default() -> Self {
        Self {
            epsilon: 1.0,
            delta: 1e-5,
            rounds: 100,
            subtable_size: 100_000,
            queries_to_reuse: None,
            k_new_queries: 3,
            k_choose_from: 300,
            exp_mech_alpha: 0.2,
            choose_worst: true,
            slices_per_iter: 1,
            device: Device::Cpu,
            mode: AssignmentMode::Standard,
            answer_scope: AnswerScope::Slice,
            seed: None,
        }
    }
}

impl RelationalSynthConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(DpError::invalid("epsilon must be positive"));
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
        if self.subtable_size == 0 {
            return Err(DpError::precondition("subtable_size must be positive"));
        }
        if self.slices_per_iter == 0 {
            return Err(DpError::precondition("slices_per_iter must be positive"));
        }
        if self.queries_to_reuse == Some(0) {
            return Err(DpError::config("queries_to_reuse must be positive when set"));
        }
        if let AssignmentMode::OneToMany { expansion_ratio } = self.mode {
            if !expansion_ratio.is_finite() || expansion_ratio < 1.0 {
                return Err(DpError::precondition(format!(
                    "expansion_ratio must be at least 1, got {expansion_ratio}"
                )));
            }
        }
        Ok(())
    }

    /// Budget inputs for a dataset with the given sensitivity and size.
    pub fn budget(&self, dmax: usize, m_privacy: usize) -> RelationalBudget {
        RelationalBudget {
            epsilon: self.epsilon,
            delta: self.delta,
            rounds: self.rounds,
            k_new_queries: self.k_new_queries,
            k_choose_from: self.k_choose_from,
            exp_mech_alpha: self.exp_mech_alpha,
            dmax,
            m_privacy,
        }
    }

    /// Set the total epsilon.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set delta.
    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    /// Set the number of rounds.
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set the slice size target.
    pub fn with_subtable_size(mut self, subtable_size: usize) -> Self {
        self.subtable_size = subtable_size;
        self
    }

    /// Cap the number of workloads fitted per slice.
    pub fn with_queries_to_reuse(mut self, queries_to_reuse: Option<usize>) -> Self {
        self.queries_to_reuse = queries_to_reuse;
        self
    }

    /// Set how many workloads are added per round.
    pub fn with_k_new_queries(mut self, k_new_queries: usize) -> Self {
        self.k_new_queries = k_new_queries;
        self
    }

    /// Set the exponential mechanism candidate pool size.
    pub fn with_k_choose_from(mut self, k_choose_from: usize) -> Self {
        self.k_choose_from = k_choose_from;
        self
    }

    /// Set the selection budget share.
    pub fn with_exp_mech_alpha(mut self, alpha: f64) -> Self {
        self.exp_mech_alpha = alpha;
        self
    }

    /// Fit worst-fitting (`true`) or random (`false`) selected workloads.
    pub fn with_choose_worst(mut self, choose_worst: bool) -> Self {
        self.choose_worst = choose_worst;
        self
    }

    /// Set the number of slices per round.
    pub fn with_slices_per_iter(mut self, slices_per_iter: usize) -> Self {
        self.slices_per_iter = slices_per_iter;
        self
    }

    /// Set the assignment mode.
    pub fn with_mode(mut self, mode: AssignmentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the current-answer scope.
    pub fn with_answer_scope(mut self, scope: AnswerScope) -> Self {
        self.answer_scope = scope;
        self
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
