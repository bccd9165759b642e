//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory while building datasets and running folds
//! - exported to JSON/CSV artifacts
//! - reloaded later by the registry and the `compare` command

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Canonical feature vocabulary, in the order every matrix uses.
pub const FEATURE_NAMES: [&str; 5] = [
    "orbital_period",
    "planet_radius",
    "transit_duration",
    "flux_mean",
    "flux_std",
];

/// Owned copy of [`FEATURE_NAMES`], convenient for scaler/classifier APIs.
pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Whether a source carries negative examples.
///
/// Label policy is dispatched on this enum (see `catalog::label`); callers must
/// not assume label quality is symmetric across sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LabelCompleteness {
    /// Confirmed / candidate / false-positive dispositions are present.
    Full,
    /// Only confirmed detections; every row is a positive.
    PositiveOnly,
}

impl LabelCompleteness {
    pub fn as_str(self) -> &'static str {
        match self {
            LabelCompleteness::Full => "full",
            LabelCompleteness::PositiveOnly => "positive_only",
        }
    }
}

/// Feature scaling method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMethod {
    /// Median / interquartile range.
    Robust,
    /// Mean / population standard deviation.
    Standard,
}

impl ScalingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalingMethod::Robust => "robust",
            ScalingMethod::Standard => "standard",
        }
    }
}

/// One catalog file and how its labels should be read.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub name: String,
    pub path: PathBuf,
    pub completeness: LabelCompleteness,
    /// A missing required file aborts the run; a missing optional one is skipped.
    pub required: bool,
}

/// Fixed-shape numeric representation every source is normalized into.
///
/// `orbital_period` and `planet_radius` are plain `f64`: a row missing either
/// never becomes a vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalFeatureVector {
    pub orbital_period: f64,
    pub planet_radius: f64,
    pub transit_duration: Option<f64>,
    pub flux_mean: f64,
    pub flux_std: f64,
    pub label: Option<u8>,
}

impl CanonicalFeatureVector {
    /// Feature values in [`FEATURE_NAMES`] order; missing values become NaN.
    pub fn values(&self) -> [f64; 5] {
        [
            self.orbital_period,
            self.planet_radius,
            self.transit_duration.unwrap_or(f64::NAN),
            self.flux_mean,
            self.flux_std,
        ]
    }
}

/// A training/evaluation row: features plus a resolved binary label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    pub source: String,
    pub features: CanonicalFeatureVector,
    pub label: u8,
}

/// Per-source diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    /// Rows read from the file.
    pub raw: usize,
    /// Rows left after dropping all-null rows.
    pub cleaned: usize,
    /// Rows left after completeness filtering and null-label exclusion.
    #[serde(rename = "final")]
    pub final_count: usize,
    pub positive: usize,
    pub negative: usize,
}

/// Summary of one source as it entered the combined dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSummary {
    pub name: String,
    pub completeness: LabelCompleteness,
    pub counts: SourceCounts,
}

/// The combined, tagged training dataset.
///
/// Built once by `catalog::combine`; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub rows: Vec<LabeledRow>,
    pub sources: Vec<SourceSummary>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn labels(&self) -> Vec<u8> {
        self.rows.iter().map(|r| r.label).collect()
    }

    pub fn positives(&self) -> usize {
        self.rows.iter().filter(|r| r.label == 1).count()
    }

    pub fn negatives(&self) -> usize {
        self.len() - self.positives()
    }

    /// `{source_name: {raw, cleaned, final, positive, negative}}`.
    pub fn counts_by_source(&self) -> BTreeMap<String, SourceCounts> {
        self.sources
            .iter()
            .map(|s| (s.name.clone(), s.counts))
            .collect()
    }
}

/// Binary confusion counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl ConfusionCounts {
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Metrics for a single cross-validation fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    /// 1-based fold index.
    pub fold: usize,
    pub confusion: ConfusionCounts,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `None` when the test partition holds a single class.
    pub roc_auc: Option<f64>,
    pub pr_auc: Option<f64>,
    pub n_test: usize,
}

/// Mean and spread of one metric across folds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    pub std: f64,
}

/// Recall/precision at one decision threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPoint {
    pub threshold: f64,
    pub recall: f64,
    pub precision: f64,
}

/// A prediction made on a row while it sat in a fold's test partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutOfFoldPrediction {
    pub fold: usize,
    /// Index of the row in the combined dataset.
    pub row: usize,
    pub source: String,
    pub y_true: u8,
    pub y_pred: u8,
    pub y_proba: f64,
}

/// Everything a cross-validation run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvSummary {
    pub n_folds: usize,
    pub folds: Vec<FoldResult>,
    /// Keyed by metric name; a metric that was not applicable in any fold is absent.
    pub stats: BTreeMap<String, MetricStats>,
    pub global: ConfusionCounts,
    pub sweep: Vec<ThresholdPoint>,
    pub predictions: Vec<OutOfFoldPrediction>,
}

/// Hold-out test metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: Option<f64>,
}

/// Provenance stored next to the metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub model: String,
    pub trained_at: DateTime<Utc>,
    pub n_train: usize,
    pub n_test: usize,
    pub sources: Vec<String>,
}

/// `{test: {...}, cv: {metric: {mean, std}}}` consumed by reporting layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsArtifact {
    pub test: TestMetrics,
    pub cv: BTreeMap<String, MetricStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ArtifactMeta>,
}

/// Predicted class of one catalog row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "PLANET")]
    Planet,
    #[serde(rename = "FALSE POSITIVE")]
    FalsePositive,
}

impl Verdict {
    pub fn from_label(label: u8) -> Self {
        if label == 1 { Verdict::Planet } else { Verdict::FalsePositive }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Planet => "PLANET",
            Verdict::FalsePositive => "FALSE POSITIVE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub prediction: Verdict,
    pub probability: f64,
    pub features: CanonicalFeatureVector,
}

/// Probability above which a prediction counts as high-confidence.
pub const HIGH_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub total: usize,
    pub threshold: f64,
    pub predicted_planets: usize,
    pub false_positives: usize,
    pub mean_probability: f64,
    /// Rows with probability strictly above [`HIGH_CONFIDENCE`].
    pub high_confidence_count: usize,
}

/// Hold-out metrics restricted to the rows of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTestMetrics {
    pub source: String,
    pub n: usize,
    pub positives: usize,
    pub accuracy: f64,
    pub recall: f64,
    /// `None` for single-class sources.
    pub roc_auc: Option<f64>,
}
