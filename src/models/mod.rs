//! Binary classifiers.
//!
//! The pipeline only depends on the [`Classifier`] contract; [`BoostedTrees`]
//! is the implementation shipped with the crate.

pub mod binning;
pub mod booster;
pub mod registry;
pub mod tree;

pub use booster::*;
pub use registry::*;

use nalgebra::DMatrix;

use crate::error::AppError;

/// `fit(X, y)` / `predict_proba(X)` contract. Rows of `x` are samples.
pub trait Classifier {
    fn fit(&mut self, x: &DMatrix<f64>, y: &[u8]) -> Result<(), AppError>;

    /// Probability of class 1 for each row.
    fn predict_proba(&self, x: &DMatrix<f64>) -> Result<Vec<f64>, AppError>;

    /// Hard labels: `1` when `p >= threshold`.
    fn predict(&self, x: &DMatrix<f64>, threshold: f64) -> Result<Vec<u8>, AppError> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| u8::from(p >= threshold))
            .collect())
    }
}
