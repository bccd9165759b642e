//! Mathematical utilities: quantiles, moments and feature matrices.

pub mod matrix;
pub mod stats;

pub use matrix::*;
pub use stats::*;
