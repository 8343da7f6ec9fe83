//! Fixtures for optimizer tests.

use ndarray::Array1;

use dp_relational_core::SparseMatrix;

/// `rows × cols` indicator matrix whose rows cover contiguous, equal column ranges.
///
/// Panics unless `cols` is a multiple of `rows`.
pub fn indicator_rows(rows: usize, cols: usize) -> SparseMatrix {
    assert!(rows > 0 && cols % rows == 0, "columns must split evenly");
    let width = cols / rows;
    let triplets = (0..cols).map(|c| (c / width, c, 1.0)).collect();
    SparseMatrix::from_triplets(rows, cols, triplets).expect("indicator fixture in bounds")
}

/// Relative L2 error `‖a − b‖ / ‖a‖`, or the absolute error when `a` is zero.
pub fn relative_l2_error(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    assert_eq!(a.len(), b.len());
    let diff = a - b;
    let num = diff.dot(&diff);
    let den = a.dot(a);
    if den == 0.0 {
        num.sqrt()
    } else {
        (num / den).sqrt()
    }
}
