//! Compressed sparse row matrices for workload query matrices.

use ndarray::Array1;

use crate::error::{DpError, Result};

/// A real-valued sparse matrix in CSR layout.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// A matrix with no rows and `ncols` columns.
    pub fn empty(ncols: usize) -> Self {
        Self {
            nrows: 0,
            ncols,
            indptr: vec![0],
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from `(row, col, value)` triplets; duplicate coordinates are summed.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        mut triplets: Vec<(usize, usize, f64)>,
    ) -> Result<Self> {
        if let Some(&(r, c, _)) = triplets.iter().find(|(r, c, _)| *r >= nrows || *c >= ncols) {
            return Err(DpError::invalid(format!(
                "triplet ({r}, {c}) out of bounds for {nrows}x{ncols} matrix"
            )));
        }
        triplets.sort_unstable_by_key(|&(r, c, _)| (r, c));

        let mut indptr = vec![0usize; nrows + 1];
        let mut indices = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;
        for (r, c, v) in triplets {
            if last == Some((r, c)) {
                if let Some(prev) = values.last_mut() {
                    *prev += v;
                }
                continue;
            }
            indptr[r + 1] += 1;
            indices.push(c);
            values.push(v);
            last = Some((r, c));
        }
        for r in 0..nrows {
            indptr[r + 1] += indptr[r];
        }

        Ok(Self {
            nrows,
            ncols,
            indptr,
            indices,
            values,
        })
    }

    /// Square diagonal matrix.
    pub fn from_diagonal(diag: &[f64]) -> Self {
        let n = diag.len();
        Self {
            nrows: n,
            ncols: n,
            indptr: (0..=n).collect(),
            indices: (0..n).collect(),
            values: diag.to_vec(),
        }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Iterate the stored `(col, value)` pairs of one row.
    pub fn row(&self, r: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let span = self.indptr[r]..self.indptr[r + 1];
        self.indices[span.clone()]
            .iter()
            .copied()
            .zip(self.values[span].iter().copied())
    }

    /// Matrix-vector product `A x`.
    ///
    /// Panics if `x.len() != ncols`.
    pub fn dot(&self, x: &Array1<f64>) -> Array1<f64> {
        assert_eq!(x.len(), self.ncols, "vector length must match ncols");
        let mut out = Array1::zeros(self.nrows);
        for r in 0..self.nrows {
            let mut acc = 0.0;
            for (c, v) in self.row(r) {
                acc += v * x[c];
            }
            out[r] = acc;
        }
        out
    }

    /// Transposed product `Aᵀ y`.
    ///
    /// Panics if `y.len() != nrows`.
    pub fn t_dot(&self, y: &Array1<f64>) -> Array1<f64> {
        assert_eq!(y.len(), self.nrows, "vector length must match nrows");
        let mut out = Array1::zeros(self.ncols);
        for r in 0..self.nrows {
            let yr = y[r];
            if yr == 0.0 {
                continue;
            }
            for (c, v) in self.row(r) {
                out[c] += v * yr;
            }
        }
        out
    }

    /// Stack matrices with equal column counts on top of each other.
    pub fn vstack(blocks: &[SparseMatrix]) -> Result<Self> {
        let ncols = match blocks.first() {
            Some(b) => b.ncols,
            None => return Err(DpError::invalid("vstack needs at least one block")),
        };
        let mut out = Self::empty(ncols);
        for block in blocks {
            if block.ncols != ncols {
                return Err(DpError::shape(ncols, block.ncols));
            }
            let base = out.values.len();
            out.indptr
                .extend(block.indptr.iter().skip(1).map(|&p| p + base));
            out.indices.extend_from_slice(&block.indices);
            out.values.extend_from_slice(&block.values);
            out.nrows += block.nrows;
        }
        Ok(out)
    }

    /// Dense copy, for tests and small diagnostics.
    pub fn to_dense(&self) -> ndarray::Array2<f64> {
        let mut out = ndarray::Array2::zeros((self.nrows, self.ncols));
        for r in 0..self.nrows {
            for (c, v) in self.row(r) {
                out[(r, c)] += v;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> SparseMatrix {
        // [[1, 0, 2],
        //  [0, 3, 0]]
        SparseMatrix::from_triplets(2, 3, vec![(1, 1, 3.0), (0, 2, 1.5), (0, 0, 1.0), (0, 2, 0.5)])
            .expect("valid triplets")
    }

    #[test]
    fn triplets_merge_duplicates() {
        let m = sample();
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.to_dense(), array![[1.0, 0.0, 2.0], [0.0, 3.0, 0.0]]);
    }

    #[test]
    fn out_of_bounds_triplet_rejected() {
        assert!(SparseMatrix::from_triplets(1, 1, vec![(0, 1, 1.0)]).is_err());
    }

    #[test]
    fn products_match_dense() {
        let m = sample();
        let x = array![1.0, 2.0, 3.0];
        assert_eq!(m.dot(&x), m.to_dense().dot(&x));
        let y = array![1.0, -1.0];
        assert_eq!(m.t_dot(&y), m.to_dense().t().dot(&y));
    }

    #[test]
    fn vstack_appends_rows() {
        let m = sample();
        let d = SparseMatrix::from_diagonal(&[4.0, 5.0, 6.0]);
        let s = SparseMatrix::vstack(&[m.clone(), d]).expect("same ncols");
        assert_eq!(s.nrows(), 5);
        assert_eq!(s.nnz(), 6);
        let dense = s.to_dense();
        assert_eq!(dense.row(0), m.to_dense().row(0));
        assert_eq!(dense[(4, 2)], 6.0);
    }

    #[test]
    fn vstack_rejects_mismatched_columns() {
        let err = SparseMatrix::vstack(&[SparseMatrix::empty(3), SparseMatrix::empty(2)]);
        assert!(matches!(err, Err(DpError::ShapeMismatch { expected: 3, actual: 2 })));
    }
}
