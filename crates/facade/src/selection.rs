//! Private workload selection and per-slice re-ranking.

use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::Rng;

use dp_relational_core::{sample_from, ExponentialMechanism, GaussianMechanism};

/// Selected workloads paired with their noisy answers.
///
/// Answers are noised once, when the workload is selected, and reused for
/// the rest of the run.
#[derive(Clone, Debug, Default)]
pub struct AnswerCache {
    workloads: Vec<usize>,
    answers: Vec<Array1<f64>>,
}

impl AnswerCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a workload and its released answer.
    pub fn push(&mut self, workload: usize, noisy_answer: Array1<f64>) {
        self.workloads.push(workload);
        self.answers.push(noisy_answer);
    }

    /// Number of selected workloads.
    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    /// Whether nothing has been selected yet.
    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }

    /// Selected workload indices in selection order.
    pub fn workloads(&self) -> &[usize] {
        &self.workloads
    }

    /// Noisy answer stored at `position`.
    pub fn answer(&self, position: usize) -> &Array1<f64> {
        &self.answers[position]
    }

    /// `(workload, noisy answer)` pairs in selection order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Array1<f64>)> + '_ {
        self.workloads.iter().copied().zip(self.answers.iter())
    }
}

/// Tracks which workloads have been selected and releases their answers.
#[derive(Clone, Debug)]
pub struct WorkloadSelector {
    unselected: Vec<usize>,
    cache: AnswerCache,
}

impl WorkloadSelector {
    /// Selector over workloads `0..workload_count`, none selected.
    pub fn new(workload_count: usize) -> Self {
        Self {
            unselected: (0..workload_count).collect(),
            cache: AnswerCache::new(),
        }
    }

    /// Workloads not yet selected, in their original order.
    pub fn unselected(&self) -> &[usize] {
        &self.unselected
    }

    /// The answer cache.
    pub fn cache(&self) -> &AnswerCache {
        &self.cache
    }

    /// Uniform candidate pool of at most `k_choose_from` unselected workloads.
    pub fn candidates<R: Rng + ?Sized>(&self, k_choose_from: usize, rng: &mut R) -> Vec<usize> {
        sample_from(&self.unselected, k_choose_from, rng)
    }

    /// Move `workload` to the selected set and cache its noisy answer.
    pub fn accept<R: Rng + ?Sized>(
        &mut self,
        workload: usize,
        true_answer: &Array1<f64>,
        mechanism: &GaussianMechanism,
        rng: &mut R,
    ) {
        self.unselected.retain(|&w| w != workload);
        self.cache.push(workload, mechanism.privatize(true_answer, rng));
    }
}

/// Pick up to `k` candidates with the exponential mechanism, without replacement.
///
/// `errors[p]` scores `candidates[p]`. Each draw removes the winner and its
/// error before the next draw; winners are returned in draw order.
pub fn exponential_selection<R: Rng + ?Sized>(
    mut candidates: Vec<usize>,
    mut errors: Vec<f64>,
    k: usize,
    mechanism: &ExponentialMechanism,
    rng: &mut R,
) -> Vec<usize> {
    assert_eq!(candidates.len(), errors.len(), "one error per candidate");
    let mut chosen = Vec::with_capacity(k.min(candidates.len()));
    for _ in 0..k {
        let Some(pos) = mechanism.select(&errors, rng) else {
            break;
        };
        chosen.push(candidates.remove(pos));
        errors.remove(pos);
    }
    chosen
}

/// Positions of the `k` selected workloads to fit in this slice.
///
/// With `choose_worst` the positions are ranked ascending by
/// `(error, position)` and the last `k` kept; otherwise a uniform shuffle is
/// truncated the same way.
pub fn rerank<R: Rng + ?Sized>(
    errors: &[f64],
    k: usize,
    choose_worst: bool,
    rng: &mut R,
) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..errors.len()).collect();
    if choose_worst {
        ranked.sort_by(|&a, &b| errors[a].total_cmp(&errors[b]).then(a.cmp(&b)));
    } else {
        ranked.shuffle(rng);
    }
    let skip = ranked.len().saturating_sub(k);
    ranked.split_off(skip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn rerank_keeps_worst_in_ascending_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let errors = [0.3, 0.9, 0.1, 0.9, 0.5];
        assert_eq!(rerank(&errors, 3, true, &mut rng), vec![4, 1, 3]);
        assert_eq!(rerank(&errors, 10, true, &mut rng).len(), 5);
    }

    #[test]
    fn rerank_random_is_a_subset() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut picked = rerank(&[0.0; 6], 4, false, &mut rng);
        picked.sort_unstable();
        picked.dedup();
        assert_eq!(picked.len(), 4);
        assert!(picked.iter().all(|&p| p < 6));
    }

    #[test]
    fn selection_without_replacement() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mech = ExponentialMechanism::new(1.0);
        let chosen = exponential_selection(vec![10, 11, 12], vec![0.0, 0.0, 0.0], 5, &mech, &mut rng);
        let mut sorted = chosen.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![10, 11, 12]);
    }

    #[test]
    fn large_factor_picks_the_worst_candidate() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mech = ExponentialMechanism::new(1e6);
        let chosen = exponential_selection(vec![3, 7, 9], vec![0.1, 0.8, 0.2], 1, &mech, &mut rng);
        assert_eq!(chosen, vec![7]);
    }

    #[test]
    fn accepted_workloads_leave_the_pool() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut selector = WorkloadSelector::new(4);
        let truth = array![0.5, 0.5];
        selector.accept(2, &truth, &GaussianMechanism::new(0.0), &mut rng);
        assert_eq!(selector.unselected(), &[0, 1, 3]);
        assert_eq!(selector.cache().workloads(), &[2]);
        // Zero noise releases the true answer.
        assert_eq!(selector.cache().answer(0), &truth);
        assert!(selector.candidates(10, &mut rng).iter().all(|&w| w != 2));
    }
}
