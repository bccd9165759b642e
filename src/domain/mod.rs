//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums (`LabelCompleteness`, `ScalingMethod`)
//! - canonical feature vectors and the combined `Dataset`
//! - evaluation outputs (`FoldResult`, `CvSummary`, `MetricsArtifact`)

pub mod types;

pub use types::*;
