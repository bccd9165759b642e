//! Feature-matrix construction.
//!
//! Matrices are `DMatrix<f64>` with one row per sample and one column per
//! feature in `FEATURE_NAMES` order. Missing values are NaN.

use nalgebra::DMatrix;

use crate::domain::{CanonicalFeatureVector, FEATURE_NAMES};

/// Stack feature vectors into a matrix.
pub fn feature_matrix<'a, I>(vectors: I) -> DMatrix<f64>
where
    I: IntoIterator<Item = &'a CanonicalFeatureVector>,
{
    let rows: Vec<[f64; 5]> = vectors.into_iter().map(CanonicalFeatureVector::values).collect();
    DMatrix::from_fn(rows.len(), FEATURE_NAMES.len(), |r, c| rows[r][c])
}

/// Copy the given rows (in the given order) into a new matrix.
pub fn take_rows(x: &DMatrix<f64>, rows: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), x.ncols(), |r, c| x[(rows[r], c)])
}

/// Column `c` as an owned vector.
pub fn column(x: &DMatrix<f64>, c: usize) -> Vec<f64> {
    x.column(c).iter().copied().collect()
}
