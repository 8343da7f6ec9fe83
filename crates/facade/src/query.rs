//! Workloads and the query manager contract.
//!
//! A workload is a histogram query over pairs of related rows. Every table-1
//! row `i` maps to a row-block offset `offsets1[i]` and every table-2 row `j`
//! to `offsets2[j]`; the relationship `(i, j)` falls into histogram cell
//! `offsets1[i] + offsets2[j]`. Answers are normalized by the number of
//! relationships counted.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use dp_relational_core::{DpError, RelationshipVector, Result, SparseMatrix};

/// Which entity table an offset vector belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableSide {
    /// The table whose rows own relationships.
    Table1,
    /// The related table.
    Table2,
}

/// Sizes describing the synthetic tables and the original relationship data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationalShape {
    /// Rows in synthetic table 1.
    pub n_syn1: usize,
    /// Rows in synthetic table 2.
    pub n_syn2: usize,
    /// Relationships to synthesize.
    pub n_relationship_synth: usize,
    /// Relationships in the original data.
    pub n_relationship_orig: usize,
    /// Maximum relationships per table-1 row in the original data.
    pub dmax: usize,
    /// Whether the data is one-to-many.
    pub one_to_many: bool,
}

/// Source of workloads and table shapes for the synthesis loop.
pub trait QueryManager {
    /// Rows in synthetic table 1.
    fn n_syn1(&self) -> usize;

    /// Rows in synthetic table 2.
    fn n_syn2(&self) -> usize;

    /// Size of the flattened cross product.
    fn n_syn_cross(&self) -> usize {
        self.n_syn1() * self.n_syn2()
    }

    /// Relationships to synthesize.
    fn n_relationship_synth(&self) -> usize;

    /// Relationships in the original data.
    fn n_relationship_orig(&self) -> usize;

    /// Maximum relationships per table-1 row in the original data.
    fn dmax(&self) -> usize;

    /// Whether the data is one-to-many.
    fn one_to_many(&self) -> bool;

    /// Number of workloads.
    fn workload_count(&self) -> usize;

    /// Name of workload `w`.
    fn workload_name(&self, w: usize) -> &str;

    /// Normalized histogram of workload `w` over the original relationships.
    fn true_answers(&self, w: usize) -> &Array1<f64>;

    /// Offsets of the synthetic rows of `side` for workload `w`.
    fn offsets(&self, w: usize, side: TableSide) -> &[usize];

    /// Number of histogram cells of workload `w`.
    fn range_size(&self, w: usize) -> usize;

    /// Query matrix of workload `w` restricted to the cross product of
    /// `table1 × table2`.
    ///
    /// Column `a * table2.len() + c` stands for the cell
    /// `(table1[a], table2[c])` and carries a single 1 in the row of its
    /// histogram cell.
    fn query_matrix(&self, w: usize, table1: &[usize], table2: &[usize]) -> Result<SparseMatrix> {
        let off1 = self.offsets(w, TableSide::Table1);
        let off2 = self.offsets(w, TableSide::Table2);
        let t2 = table2.len();
        let mut triplets = Vec::with_capacity(table1.len() * t2);
        for (a, &i) in table1.iter().enumerate() {
            for (c, &j) in table2.iter().enumerate() {
                triplets.push((off1[i] + off2[j], a * t2 + c, 1.0));
            }
        }
        SparseMatrix::from_triplets(self.range_size(w), table1.len() * t2, triplets)
    }

    /// Shape summary.
    fn shape(&self) -> RelationalShape {
        RelationalShape {
            n_syn1: self.n_syn1(),
            n_syn2: self.n_syn2(),
            n_relationship_synth: self.n_relationship_synth(),
            n_relationship_orig: self.n_relationship_orig(),
            dmax: self.dmax(),
            one_to_many: self.one_to_many(),
        }
    }
}

/// Check every workload's offsets and answers against the table shapes.
pub fn validate_query_manager<Q: QueryManager + ?Sized>(qm: &Q) -> Result<()> {
    if qm.n_syn1() == 0 || qm.n_syn2() == 0 {
        return Err(DpError::invalid("synthetic tables must be non-empty"));
    }
    if qm.workload_count() == 0 {
        return Err(DpError::precondition("query manager has no workloads"));
    }
    for w in 0..qm.workload_count() {
        let off1 = qm.offsets(w, TableSide::Table1);
        let off2 = qm.offsets(w, TableSide::Table2);
        if off1.len() != qm.n_syn1() {
            return Err(DpError::shape(qm.n_syn1(), off1.len()));
        }
        if off2.len() != qm.n_syn2() {
            return Err(DpError::shape(qm.n_syn2(), off2.len()));
        }
        let range = qm.range_size(w);
        if qm.true_answers(w).len() != range {
            return Err(DpError::shape(range, qm.true_answers(w).len()));
        }
        let top = off1.iter().max().copied().unwrap_or(0) + off2.iter().max().copied().unwrap_or(0);
        if top >= range {
            return Err(DpError::invalid(format!(
                "workload '{}' maps a relationship to cell {top} beyond its range {range}",
                qm.workload_name(w)
            )));
        }
    }
    Ok(())
}

/// Normalized histogram of workload `w` over `pairs`.
///
/// An empty pair set yields the zero vector.
pub fn dataset_answer<Q, I>(qm: &Q, w: usize, pairs: I) -> Array1<f64>
where
    Q: QueryManager + ?Sized,
    I: IntoIterator<Item = (usize, usize)>,
{
    let off1 = qm.offsets(w, TableSide::Table1);
    let off2 = qm.offsets(w, TableSide::Table2);
    let mut hist = Array1::zeros(qm.range_size(w));
    let mut count = 0usize;
    for (i, j) in pairs {
        hist[off1[i] + off2[j]] += 1.0;
        count += 1;
    }
    if count > 0 {
        hist /= count as f64;
    }
    hist
}

/// L1 distance between two answer vectors.
pub fn l1_error(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Per-table offsets of one workload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadOffsets {
    /// Offset of each table-1 row.
    pub table1: Vec<usize>,
    /// Offset of each table-2 row.
    pub table2: Vec<usize>,
}

impl WorkloadOffsets {
    /// Offsets of a two-way marginal over one categorical attribute per table.
    ///
    /// Cell `code1 * cardinality2 + code2` counts relationships whose table-1
    /// row has category `code1` and table-2 row has category `code2`.
    pub fn from_categories(codes1: &[usize], codes2: &[usize], cardinality2: usize) -> Self {
        Self {
            table1: codes1.iter().map(|&c| c * cardinality2).collect(),
            table2: codes2.to_vec(),
        }
    }
}

/// Histogram workload with its true answer on the original data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    /// Human-readable name.
    pub name: String,
    /// Number of histogram cells.
    pub range_size: usize,
    /// Normalized histogram over the original relationships.
    pub true_answers: Array1<f64>,
    /// Offsets of the synthetic rows.
    pub offsets: WorkloadOffsets,
}

impl Workload {
    /// Workload with a precomputed true answer.
    pub fn new(
        name: impl Into<String>,
        range_size: usize,
        true_answers: Array1<f64>,
        offsets: WorkloadOffsets,
    ) -> Result<Self> {
        if true_answers.len() != range_size {
            return Err(DpError::shape(range_size, true_answers.len()));
        }
        Ok(Self {
            name: name.into(),
            range_size,
            true_answers,
            offsets,
        })
    }

    /// Workload whose true answer is the normalized histogram of
    /// `original_pairs` under `original` offsets.
    pub fn from_relationships(
        name: impl Into<String>,
        range_size: usize,
        original: &WorkloadOffsets,
        original_pairs: &[(usize, usize)],
        synthetic: WorkloadOffsets,
    ) -> Result<Self> {
        let mut hist = Array1::zeros(range_size);
        for &(i, j) in original_pairs {
            let (Some(&o1), Some(&o2)) = (original.table1.get(i), original.table2.get(j)) else {
                return Err(DpError::invalid(format!(
                    "original relationship ({i}, {j}) has no offsets"
                )));
            };
            let cell = o1 + o2;
            if cell >= range_size {
                return Err(DpError::invalid(format!(
                    "original relationship ({i}, {j}) maps to cell {cell} beyond range {range_size}"
                )));
            }
            hist[cell] += 1.0;
        }
        if !original_pairs.is_empty() {
            hist /= original_pairs.len() as f64;
        }
        Self::new(name, range_size, hist, synthetic)
    }
}

/// Query manager holding every workload in memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InMemoryQueryManager {
    shape: RelationalShape,
    workloads: Vec<Workload>,
}

impl InMemoryQueryManager {
    /// Build and validate a query manager.
    pub fn new(shape: RelationalShape, workloads: Vec<Workload>) -> Result<Self> {
        let qm = Self { shape, workloads };
        validate_query_manager(&qm)?;
        Ok(qm)
    }

    /// The stored workloads.
    pub fn workloads(&self) -> &[Workload] {
        &self.workloads
    }
}

impl QueryManager for InMemoryQueryManager {
    fn n_syn1(&self) -> usize {
        self.shape.n_syn1
    }

    fn n_syn2(&self) -> usize {
        self.shape.n_syn2
    }

    fn n_relationship_synth(&self) -> usize {
        self.shape.n_relationship_synth
    }

    fn n_relationship_orig(&self) -> usize {
        self.shape.n_relationship_orig
    }

    fn dmax(&self) -> usize {
        self.shape.dmax
    }

    fn one_to_many(&self) -> bool {
        self.shape.one_to_many
    }

    fn workload_count(&self) -> usize {
        self.workloads.len()
    }

    fn workload_name(&self, w: usize) -> &str {
        &self.workloads[w].name
    }

    fn true_answers(&self, w: usize) -> &Array1<f64> {
        &self.workloads[w].true_answers
    }

    fn offsets(&self, w: usize, side: TableSide) -> &[usize] {
        match side {
            TableSide::Table1 => &self.workloads[w].offsets.table1,
            TableSide::Table2 => &self.workloads[w].offsets.table2,
        }
    }

    fn range_size(&self, w: usize) -> usize {
        self.workloads[w].range_size
    }

    fn shape(&self) -> RelationalShape {
        self.shape
    }
}

/// Fit of a relationship vector against every workload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// L1 error per workload, in workload order.
    pub errors: Vec<f64>,
    /// Mean of `errors`.
    pub mean_error: f64,
}

/// Compare the histogram of `b` with every workload's true answer.
pub fn evaluate_relationships<Q: QueryManager + ?Sized>(
    qm: &Q,
    b: &RelationshipVector,
) -> Result<Evaluation> {
    if b.n1() != qm.n_syn1() || b.n2() != qm.n_syn2() {
        return Err(DpError::shape(qm.n_syn_cross(), b.len()));
    }
    let errors: Vec<f64> = (0..qm.workload_count())
        .map(|w| l1_error(qm.true_answers(w), &dataset_answer(qm, w, b.pairs())))
        .collect();
    let mean_error = if errors.is_empty() {
        0.0
    } else {
        errors.iter().sum::<f64>() / errors.len() as f64
    };
    Ok(Evaluation { errors, mean_error })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // Table 1 has categories [0, 1, 1], table 2 has [1, 0]; both binary.
    fn manager() -> InMemoryQueryManager {
        let original = WorkloadOffsets::from_categories(&[0, 1], &[0, 1], 2);
        let synthetic = WorkloadOffsets::from_categories(&[0, 1, 1], &[1, 0], 2);
        let w = Workload::from_relationships("a x b", 4, &original, &[(0, 0), (1, 1)], synthetic)
            .expect("valid workload");
        InMemoryQueryManager::new(
            RelationalShape {
                n_syn1: 3,
                n_syn2: 2,
                n_relationship_synth: 2,
                n_relationship_orig: 2,
                dmax: 1,
                one_to_many: false,
            },
            vec![w],
        )
        .expect("valid manager")
    }

    #[test]
    fn true_answers_are_normalized_histograms() {
        let qm = manager();
        assert_eq!(qm.true_answers(0), &array![0.5, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn dataset_answer_counts_cells() {
        let qm = manager();
        // (0, 1): 0*2 + 0 = 0; (2, 0): 1*2 + 1 = 3.
        let ans = dataset_answer(&qm, 0, vec![(0, 1), (2, 0)]);
        assert_eq!(ans, array![0.5, 0.0, 0.0, 0.5]);
        assert_eq!(dataset_answer(&qm, 0, Vec::new()), Array1::<f64>::zeros(4));
    }

    #[test]
    fn query_matrix_agrees_with_histogram() {
        let qm = manager();
        let table1 = [2, 0];
        let table2 = [0, 1];
        let q = qm.query_matrix(0, &table1, &table2).expect("in range");
        assert_eq!(q.nrows(), 4);
        assert_eq!(q.ncols(), 4);
        // Select (2, 0) and (0, 1): slice positions 0 and 3.
        let b = array![1.0, 0.0, 0.0, 1.0];
        let via_matrix = q.dot(&b) / 2.0;
        assert_eq!(via_matrix, dataset_answer(&qm, 0, vec![(2, 0), (0, 1)]));
    }

    #[test]
    fn evaluation_is_zero_on_a_perfect_fit() {
        let qm = manager();
        let b = RelationshipVector::from_pairs(3, 2, &[(0, 1), (1, 0)]).expect("valid");
        let eval = evaluate_relationships(&qm, &b).expect("matching shape");
        assert_eq!(eval.errors, vec![0.0]);
        assert_eq!(eval.mean_error, 0.0);
    }

    #[test]
    fn out_of_range_offsets_are_rejected() {
        let bad = Workload::new(
            "bad",
            2,
            array![0.5, 0.5],
            WorkloadOffsets {
                table1: vec![0, 2, 0],
                table2: vec![0, 0],
            },
        )
        .expect("answer length matches");
        let shape = manager().shape();
        assert!(InMemoryQueryManager::new(shape, vec![bad]).is_err());
    }
}
