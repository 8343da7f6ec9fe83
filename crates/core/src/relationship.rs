//! The global relationship vector between two entity tables.

use std::collections::HashSet;

use rand::Rng;

use crate::error::{DpError, Result};
use crate::sampling::sample_without_replacement;

/// Sparse 0/1 vector over the flattened `n1 x n2` cross product.
///
/// Cell `i * n2 + j` is set when table-1 row `i` relates to table-2 row `j`.
/// Only the set cells are stored, sorted and unique. The vector is never
/// patched in place: slice updates build a new value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationshipVector {
    n1: usize,
    n2: usize,
    cells: Vec<usize>,
}

impl RelationshipVector {
    /// An empty assignment.
    pub fn empty(n1: usize, n2: usize) -> Self {
        Self {
            n1,
            n2,
            cells: Vec::new(),
        }
    }

    /// Build from flattened cell offsets; duplicates collapse.
    pub fn from_cells(n1: usize, n2: usize, mut cells: Vec<usize>) -> Result<Self> {
        let len = n1.saturating_mul(n2);
        if let Some(&bad) = cells.iter().find(|&&c| c >= len) {
            return Err(DpError::invalid(format!(
                "cell {bad} out of bounds for {n1}x{n2} cross product"
            )));
        }
        cells.sort_unstable();
        cells.dedup();
        Ok(Self { n1, n2, cells })
    }

    /// Build from `(table1_row, table2_row)` pairs.
    pub fn from_pairs(n1: usize, n2: usize, pairs: &[(usize, usize)]) -> Result<Self> {
        if let Some(&(i, j)) = pairs.iter().find(|&&(i, j)| i >= n1 || j >= n2) {
            return Err(DpError::invalid(format!(
                "pair ({i}, {j}) out of bounds for {n1}x{n2} tables"
            )));
        }
        Self::from_cells(n1, n2, pairs.iter().map(|&(i, j)| i * n2 + j).collect())
    }

    /// `m` distinct cells drawn uniformly at random.
    pub fn random<R: Rng + ?Sized>(n1: usize, n2: usize, m: usize, rng: &mut R) -> Result<Self> {
        let len = n1.saturating_mul(n2);
        if m > len {
            return Err(DpError::precondition(format!(
                "cannot place {m} relationships in a {n1}x{n2} cross product"
            )));
        }
        Self::from_cells(n1, n2, sample_without_replacement(len, m, rng))
    }

    /// One uniformly random table-2 partner for every table-1 row.
    pub fn random_one_to_many<R: Rng + ?Sized>(n1: usize, n2: usize, rng: &mut R) -> Result<Self> {
        if n2 == 0 && n1 > 0 {
            return Err(DpError::precondition(
                "one-to-many assignment needs a non-empty table 2",
            ));
        }
        let cells = (0..n1).map(|i| i * n2 + rng.gen_range(0..n2)).collect();
        Self::from_cells(n1, n2, cells)
    }

    /// Size of table 1.
    pub fn n1(&self) -> usize {
        self.n1
    }

    /// Size of table 2.
    pub fn n2(&self) -> usize {
        self.n2
    }

    /// Length of the flattened vector (`n1 * n2`).
    pub fn len(&self) -> usize {
        self.n1 * self.n2
    }

    /// Whether the cross product is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of relationships (nonzero cells).
    pub fn nnz(&self) -> usize {
        self.cells.len()
    }

    /// Sorted nonzero cell offsets.
    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    /// Value at a flattened offset (0 or 1).
    pub fn get(&self, offset: usize) -> f64 {
        if self.contains(offset) {
            1.0
        } else {
            0.0
        }
    }

    /// Whether a flattened offset is set.
    pub fn contains(&self, offset: usize) -> bool {
        self.cells.binary_search(&offset).is_ok()
    }

    /// `(table1_row, table2_row)` pairs in row-major order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let n2 = self.n2;
        self.cells.iter().map(move |&c| (c / n2, c % n2))
    }

    /// Set cells belonging to table-1 row `i`.
    pub fn row_cells(&self, i: usize) -> &[usize] {
        let lo = self.cells.partition_point(|&c| c < i * self.n2);
        let hi = self.cells.partition_point(|&c| c < (i + 1) * self.n2);
        &self.cells[lo..hi]
    }

    /// Table-2 partners of table-1 row `i`, ascending.
    pub fn partners(&self, i: usize) -> Vec<usize> {
        self.row_cells(i).iter().map(|&c| c % self.n2).collect()
    }

    /// Positions within `offsets` whose cells are set.
    pub fn positions_in(&self, offsets: &[usize]) -> Vec<usize> {
        offsets
            .iter()
            .enumerate()
            .filter(|(_, &o)| self.contains(o))
            .map(|(p, _)| p)
            .collect()
    }

    /// Number of relationships falling on `offsets`.
    pub fn count_in(&self, offsets: &[usize]) -> usize {
        offsets.iter().filter(|&&o| self.contains(o)).count()
    }

    /// Replace the region covered by `slice_offsets` with `new_cells`.
    ///
    /// Builds a new vector from the cells outside the slice plus `new_cells`;
    /// every cell outside the slice keeps its value. `new_cells` must lie
    /// inside the slice.
    pub fn replace_slice(&self, slice_offsets: &[usize], new_cells: &[usize]) -> Result<Self> {
        let region: HashSet<usize> = slice_offsets.iter().copied().collect();
        if let Some(&stray) = new_cells.iter().find(|c| !region.contains(*c)) {
            return Err(DpError::invalid(format!(
                "cell {stray} lies outside the slice being replaced"
            )));
        }
        let mut cells: Vec<usize> = self
            .cells
            .iter()
            .copied()
            .filter(|c| !region.contains(c))
            .collect();
        cells.extend_from_slice(new_cells);
        cells.sort_unstable();
        cells.dedup();
        Ok(Self {
            n1: self.n1,
            n2: self.n2,
            cells,
        })
    }
}
