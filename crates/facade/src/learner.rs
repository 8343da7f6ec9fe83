//! The private relationship-learning loop.
//!
//! Each round draws `slices_per_iter` random slices of the cross product. The
//! first slice of a round adds new workloads with the exponential mechanism
//! and releases their answers with the Gaussian mechanism. Every slice then
//! fits the relationships inside it to the noisy answers of the selected
//! workloads by projected gradient descent, rounds the fractional solution
//! and writes it back into the global vector.

use std::time::Instant;

use ndarray::Array1;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace};

use dp_relational_accounting::PrivacyParams;
use dp_relational_core::{
    one_to_many_sample, unbiased_sample, DpError, RelationshipVector, Result, SparseMatrix,
};
use dp_relational_optim::{
    pgd_optimize, random_one_to_many_start, random_start, Projection, ONE_TO_MANY_STEPS,
    STANDARD_STEPS,
};

use crate::config::{AnswerScope, AssignmentMode, Device, RelationalSynthConfig};
use crate::query::{dataset_answer, l1_error, validate_query_manager, QueryManager};
use crate::selection::{exponential_selection, rerank, AnswerCache, WorkloadSelector};
use crate::slicing::{Slice, SliceSampler};

/// Outcome of one slice iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct SliceReport {
    /// Zero-based round.
    pub round: usize,
    /// Zero-based slice within the round.
    pub slice: usize,
    /// Relationships inside the slice.
    pub relationships: usize,
    /// Workloads fitted by the optimizer.
    pub fitted_workloads: usize,
    /// Final optimizer loss; `None` when the slice was skipped.
    pub loss: Option<f64>,
}

/// Learn a private relationship vector for the tables described by `qm`.
///
/// `callback` runs after every round with the current vector and the round
/// index. All randomness comes from `rng`.
pub fn learn_relationship_vector<Q, R, F>(
    qm: &Q,
    config: &RelationalSynthConfig,
    rng: &mut R,
    callback: F,
) -> Result<RelationshipVector>
where
    Q: QueryManager + ?Sized,
    R: Rng + ?Sized,
    F: FnMut(&Q, &RelationshipVector, usize),
{
    RelationalSynthesizer::with_rng(config.clone(), rng)?.run(qm, callback)
}

/// Stateful runner exposing the privacy parameters and selected workloads of
/// its last run.
#[derive(Debug)]
pub struct RelationalSynthesizer<R = ChaCha8Rng> {
    config: RelationalSynthConfig,
    rng: R,
    params: Option<PrivacyParams>,
    cache: AnswerCache,
    reports: Vec<SliceReport>,
}

impl RelationalSynthesizer<ChaCha8Rng> {
    /// Runner seeded from `config.seed`, or from a fresh random seed.
    pub fn from_seed(config: RelationalSynthConfig) -> Result<Self> {
        let seed = config.seed.unwrap_or_else(rand::random);
        info!(seed, "seeding relationship synthesizer");
        Self::with_rng(config, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> RelationalSynthesizer<R> {
    /// Runner drawing randomness from `rng`.
    pub fn with_rng(config: RelationalSynthConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng,
            params: None,
            cache: AnswerCache::new(),
            reports: Vec::new(),
        })
    }

    /// The run configuration.
    pub fn config(&self) -> &RelationalSynthConfig {
        &self.config
    }

    /// Privacy parameters of the last run.
    pub fn privacy_params(&self) -> Option<&PrivacyParams> {
        self.params.as_ref()
    }

    /// Workloads selected during the last run, in selection order.
    pub fn selected_workloads(&self) -> &[usize] {
        self.cache.workloads()
    }

    /// Selected workloads with their released answers.
    pub fn answer_cache(&self) -> &AnswerCache {
        &self.cache
    }

    /// One report per slice iteration of the last run.
    pub fn reports(&self) -> &[SliceReport] {
        &self.reports
    }

    /// Run the full learning loop.
    pub fn run<Q, F>(&mut self, qm: &Q, mut callback: F) -> Result<RelationshipVector>
    where
        Q: QueryManager + ?Sized,
        F: FnMut(&Q, &RelationshipVector, usize),
    {
        self.check_inputs(qm)?;
        let params = PrivacyParams::derive(
            &self
                .config
                .budget(qm.dmax(), qm.n_relationship_orig()),
        )?;
        info!(
            rho = params.rho,
            epsilon0 = params.epsilon0,
            exp_mech_factor = params.exp_mech_factor,
            gm_stddev = params.gm_stddev,
            "derived privacy parameters"
        );
        self.params = Some(params.clone());
        self.reports.clear();

        let (n1, n2) = (qm.n_syn1(), qm.n_syn2());
        let mut b = match self.config.mode {
            AssignmentMode::Standard => {
                RelationshipVector::random(n1, n2, qm.n_relationship_synth(), &mut self.rng)?
            }
            AssignmentMode::OneToMany { .. } => {
                RelationshipVector::random_one_to_many(n1, n2, &mut self.rng)?
            }
        };

        let sampler = SliceSampler::new(n1, n2, self.config.subtable_size, &self.config.mode);
        let sizes = sampler.sizes();
        debug!(
            table1 = sizes.table1,
            table2 = sizes.table2,
            "slice dimensions"
        );

        let mut selector = WorkloadSelector::new(qm.workload_count());
        for round in 0..self.config.rounds {
            for s in 0..self.config.slices_per_iter {
                let slice = sampler.sample(&b, &mut self.rng);
                let report = self.fit_slice(qm, &params, &mut selector, &mut b, &slice, round, s)?;
                self.reports.push(report);
            }
            info!(
                round,
                selected = selector.cache().len(),
                relationships = b.nnz(),
                "round complete"
            );
            callback(qm, &b, round);
        }

        self.cache = selector.cache().clone();
        Ok(b)
    }

    fn check_inputs<Q: QueryManager + ?Sized>(&self, qm: &Q) -> Result<()> {
        match self.config.device {
            Device::Cpu => {}
        }
        validate_query_manager(qm)?;
        if self.config.mode.is_one_to_many() != qm.one_to_many() {
            return Err(DpError::precondition(format!(
                "assignment mode {:?} does not match a query manager with one_to_many = {}",
                self.config.mode,
                qm.one_to_many()
            )));
        }
        let m = qm.n_relationship_synth();
        if m >= qm.n_syn_cross() {
            return Err(DpError::precondition(format!(
                "{m} relationships do not fit strictly inside a {}x{} cross product",
                qm.n_syn1(),
                qm.n_syn2()
            )));
        }
        if self.config.mode.is_one_to_many() && m != qm.n_syn1() {
            return Err(DpError::precondition(format!(
                "one-to-many synthesis needs one relationship per table-1 row ({} != {m})",
                qm.n_syn1()
            )));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn fit_slice<Q: QueryManager + ?Sized>(
        &mut self,
        qm: &Q,
        params: &PrivacyParams,
        selector: &mut WorkloadSelector,
        b: &mut RelationshipVector,
        slice: &Slice,
        round: usize,
        s: usize,
    ) -> Result<SliceReport> {
        let start = Instant::now();
        let positions = b.positions_in(&slice.offsets);
        let sub_m = positions.len();
        if sub_m < 1 {
            debug!(round, slice = s, "slice holds no relationships, skipping");
            return Ok(SliceReport {
                round,
                slice: s,
                relationships: 0,
                fitted_workloads: 0,
                loss: None,
            });
        }

        let t2 = slice.table2.len();
        let current: Vec<(usize, usize)> = match self.config.answer_scope {
            AnswerScope::Slice => positions
                .iter()
                .map(|&p| (slice.table1[p / t2], slice.table2[p % t2]))
                .collect(),
            AnswerScope::Full => b.pairs().collect(),
        };
        let estimate = |w: usize| dataset_answer(qm, w, current.iter().copied());

        if s == 0 {
            let candidates = selector.candidates(self.config.k_choose_from, &mut self.rng);
            let errors = candidates
                .iter()
                .map(|&w| l1_error(qm.true_answers(w), &estimate(w)))
                .collect();
            let k = self.config.k_new_queries.min(candidates.len());
            let winners = exponential_selection(
                candidates,
                errors,
                k,
                &params.exponential_mechanism(),
                &mut self.rng,
            );
            let gaussian = params.gaussian_mechanism();
            for &w in &winners {
                selector.accept(w, qm.true_answers(w), &gaussian, &mut self.rng);
            }
            debug!(round, new_workloads = ?winners, "exponential mechanism selection");
        }
        let selected_at = Instant::now();

        let cache = selector.cache();
        let errors: Vec<f64> = cache
            .iter()
            .map(|(w, noisy)| l1_error(noisy, &estimate(w)))
            .collect();
        let k = self
            .config
            .queries_to_reuse
            .map_or(cache.len(), |q| q.min(cache.len()));
        let chosen = rerank(&errors, k, self.config.choose_worst, &mut self.rng);

        let blocks = chosen
            .iter()
            .map(|&p| qm.query_matrix(cache.workloads()[p], &slice.table1, &slice.table2))
            .collect::<Result<Vec<_>>>()?;
        let q = if blocks.is_empty() {
            SparseMatrix::empty(slice.len())
        } else {
            SparseMatrix::vstack(&blocks)?
        };
        let a: Array1<f64> = chosen
            .iter()
            .flat_map(|&p| cache.answer(p).iter().copied())
            .collect();
        let built_at = Instant::now();

        let m = sub_m as f64;
        let (start_point, projection, steps) = match self.config.mode {
            AssignmentMode::Standard => (
                random_start(slice.len(), sub_m, &mut self.rng)?,
                Projection::SimplexCap { total: m },
                STANDARD_STEPS,
            ),
            AssignmentMode::OneToMany { .. } => (
                random_one_to_many_start(slice.table1.len(), t2, &mut self.rng)?,
                Projection::OneToMany { block: t2 },
                ONE_TO_MANY_STEPS,
            ),
        };
        let result = pgd_optimize(
            &q,
            start_point,
            &a,
            m,
            steps,
            &projection,
            &mut self.rng,
            |args| trace!(step = args.step, loss = args.loss, "pgd step"),
        )?;
        let optimized_at = Instant::now();

        let picked = match self.config.mode {
            AssignmentMode::Standard => unbiased_sample(&result.solution, sub_m, &mut self.rng)?,
            AssignmentMode::OneToMany { .. } => {
                one_to_many_sample(&result.solution, t2, &mut self.rng)?
            }
        };
        let new_cells: Vec<usize> = picked.iter().map(|&p| slice.offsets[p]).collect();
        *b = b.replace_slice(&slice.offsets, &new_cells)?;

        debug!(
            round,
            slice = s,
            sub_m,
            fitted = chosen.len(),
            sigma_max = result.sigma_max,
            loss = result.loss,
            select_ms = (selected_at - start).as_secs_f64() * 1e3,
            build_ms = (built_at - selected_at).as_secs_f64() * 1e3,
            optimize_ms = (optimized_at - built_at).as_secs_f64() * 1e3,
            rounding_ms = optimized_at.elapsed().as_secs_f64() * 1e3,
            "slice fitted"
        );
        Ok(SliceReport {
            round,
            slice: s,
            relationships: sub_m,
            fitted_workloads: chosen.len(),
            loss: Some(result.loss),
        })
    }
}
