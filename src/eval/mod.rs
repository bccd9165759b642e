//! Model evaluation: fold assignment, metrics and cross-validation.

pub mod cv;
pub mod folds;
pub mod metrics;

pub use cv::*;
pub use folds::*;
pub use metrics::*;
