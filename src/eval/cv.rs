//! Stratified cross-validation.
//!
//! Run lifecycle:
//!
//! ```text
//! Init -> Loading -> FoldRunning(1) -> ... -> FoldRunning(k) -> Aggregating -> Done
//!            |              |
//!            +--> Failed <--+
//! ```
//!
//! Folds are computed data-parallel. Each fold owns its scaler and classifier:
//! the scaler is fitted on the fold's training rows only and the same fitted
//! instance transforms both partitions. Results are accepted in fold order
//! after every fold has finished, which is when `FoldRunning(i)` is entered.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info, warn};
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::domain::{
    CvSummary, Dataset, FoldResult, MetricStats, OutOfFoldPrediction, ScalingMethod, feature_names,
};
use crate::error::{AppError, ErrorKind};
use crate::eval::folds::{Fold, stratified_folds};
use crate::eval::metrics::{confusion, fold_result, threshold_sweep};
use crate::math::{feature_matrix, mean, std_dev, take_rows};
use crate::models::Classifier;
use crate::scaling::{Scaler, ScalerState};

/// Metric names aggregated across folds, in report order.
pub const CV_METRICS: [&str; 6] = ["accuracy", "precision", "recall", "f1", "roc_auc", "pr_auc"];

#[derive(Debug, Clone, PartialEq)]
pub struct CvConfig {
    pub folds: usize,
    /// Seeds the fold shuffle; fold `i` (1-based) trains with `seed + i`.
    pub seed: u64,
    pub decision_threshold: f64,
    /// Ascending thresholds for the recall/precision sweep.
    pub thresholds: Vec<f64>,
    /// `None` disables scaling.
    pub scaling: Option<ScalingMethod>,
    pub parallel: bool,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            seed: 42,
            decision_threshold: 0.5,
            thresholds: default_thresholds(),
            scaling: Some(ScalingMethod::Robust),
            parallel: true,
        }
    }
}

/// 0.30, 0.35, ..., 0.60.
pub fn default_thresholds() -> Vec<f64> {
    (0..=6).map(|i| (30 + 5 * i) as f64 / 100.0).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvPhase {
    Init,
    Loading,
    /// 1-based fold index.
    FoldRunning(usize),
    Aggregating,
    Done,
    Failed,
}

impl CvPhase {
    pub fn can_transition_to(self, next: CvPhase) -> bool {
        use CvPhase::*;
        match (self, next) {
            (Init, Loading) => true,
            (Loading, FoldRunning(1)) => true,
            (FoldRunning(i), FoldRunning(j)) => j == i + 1,
            (FoldRunning(_), Aggregating) => true,
            (Aggregating, Done) => true,
            (Loading, Failed) | (FoldRunning(_), Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CvPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CvPhase::Init => write!(f, "init"),
            CvPhase::Loading => write!(f, "loading"),
            CvPhase::FoldRunning(i) => write!(f, "fold {i}"),
            CvPhase::Aggregating => write!(f, "aggregating"),
            CvPhase::Done => write!(f, "done"),
            CvPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Records every phase a run passes through and rejects illegal moves.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    history: Vec<CvPhase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            history: vec![CvPhase::Init],
        }
    }
}

impl PhaseTracker {
    pub fn current(&self) -> CvPhase {
        self.history.last().copied().unwrap_or(CvPhase::Init)
    }

    pub fn history(&self) -> &[CvPhase] {
        &self.history
    }

    pub fn advance(&mut self, next: CvPhase) -> Result<(), AppError> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(AppError::new(
                ErrorKind::Internal,
                format!("Illegal cross-validation transition: {current} -> {next}"),
            ));
        }
        debug!("cv phase: {current} -> {next}");
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed` and hand back `err` for propagation.
    fn fail(&mut self, err: AppError) -> AppError {
        match self.advance(CvPhase::Failed) {
            Ok(()) => err,
            Err(internal) => internal,
        }
    }
}

/// Per-fold output kept alongside the metrics.
#[derive(Debug, Clone)]
pub struct FoldOutcome {
    pub result: FoldResult,
    /// Rows of the dataset that formed this fold's test partition.
    pub test_rows: Vec<usize>,
    pub probabilities: Vec<f64>,
    /// The scaler fitted on this fold's training rows, if scaling was enabled.
    pub scaler: Option<ScalerState>,
}

#[derive(Debug, Clone)]
pub struct CvReport {
    pub summary: CvSummary,
    pub outcomes: Vec<FoldOutcome>,
    pub phases: Vec<CvPhase>,
}

/// Run stratified k-fold cross-validation.
///
/// `make_classifier` receives the fold's seed and must return a fresh, unfitted classifier.
pub fn cross_validate<C, F>(dataset: &Dataset, config: &CvConfig, make_classifier: F) -> Result<CvReport, AppError>
where
    C: Classifier + Send,
    F: Fn(u64) -> C + Sync,
{
    let mut tracker = PhaseTracker::default();
    tracker.advance(CvPhase::Loading)?;

    let (x, y, folds) = match prepare(dataset, config) {
        Ok(prepared) => prepared,
        Err(e) => return Err(tracker.fail(e)),
    };
    info!(
        "cross-validating {} rows ({} positive / {} negative) over {} folds",
        dataset.len(),
        dataset.positives(),
        dataset.negatives(),
        folds.len()
    );

    let run = |fold: &Fold| run_fold(&x, &y, fold, config, &make_classifier);
    let results: Vec<Result<FoldOutcome, AppError>> = if config.parallel {
        folds.par_iter().map(run).collect()
    } else {
        folds.iter().map(run).collect()
    };

    let mut outcomes = Vec::with_capacity(results.len());
    for (i, result) in results.into_iter().enumerate() {
        let fold = i + 1;
        tracker.advance(CvPhase::FoldRunning(fold))?;
        match result {
            Ok(outcome) => {
                let r = &outcome.result;
                info!(
                    "fold {fold}/{}: recall={:.4} precision={:.4} f1={:.4} n_test={}",
                    config.folds, r.recall, r.precision, r.f1, r.n_test
                );
                if r.roc_auc.is_none() {
                    warn!("fold {fold}: test partition holds a single class; ROC-AUC and PR-AUC not applicable");
                }
                outcomes.push(outcome);
            }
            Err(e) => {
                let e = AppError::new(e.kind(), format!("Fold {fold} failed: {e}"));
                return Err(tracker.fail(e));
            }
        }
    }

    tracker.advance(CvPhase::Aggregating)?;
    let summary = aggregate(dataset, &outcomes, config);
    tracker.advance(CvPhase::Done)?;

    Ok(CvReport {
        summary,
        outcomes,
        phases: tracker.history().to_vec(),
    })
}

fn prepare(dataset: &Dataset, config: &CvConfig) -> Result<(DMatrix<f64>, Vec<u8>, Vec<Fold>), AppError> {
    if dataset.is_empty() {
        return Err(AppError::empty("No rows available for cross-validation."));
    }
    if !(0.0..=1.0).contains(&config.decision_threshold) {
        return Err(AppError::input(format!(
            "Decision threshold must be in [0, 1], got {}",
            config.decision_threshold
        )));
    }
    let x = feature_matrix(dataset.rows.iter().map(|r| &r.features));
    let y = dataset.labels();
    let folds = stratified_folds(&y, config.folds, config.seed)?;
    Ok((x, y, folds))
}

fn run_fold<C, F>(
    x: &DMatrix<f64>,
    y: &[u8],
    fold: &Fold,
    config: &CvConfig,
    make_classifier: &F,
) -> Result<FoldOutcome, AppError>
where
    C: Classifier,
    F: Fn(u64) -> C,
{
    let fold_no = fold.index + 1;
    let names = feature_names();
    let x_train = take_rows(x, &fold.train);
    let x_test = take_rows(x, &fold.test);
    let y_train: Vec<u8> = fold.train.iter().map(|&i| y[i]).collect();
    let y_test: Vec<u8> = fold.test.iter().map(|&i| y[i]).collect();

    let (x_train, x_test, scaler) = match config.scaling {
        Some(method) => {
            let (fitted, train_scaled) = Scaler::new(method).fit_transform(&x_train, &names)?;
            let test_scaled = fitted.transform(&x_test, &names)?;
            (train_scaled, test_scaled, Some(fitted.state().clone()))
        }
        None => (x_train, x_test, None),
    };

    // Seeds near u64::MAX wrap around rather than overflow.
    let mut model = make_classifier(config.seed.wrapping_add(fold_no as u64));
    model.fit(&x_train, &y_train)?;
    let probabilities = model.predict_proba(&x_test)?;
    if let Some(bad) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(AppError::numeric(format!("Classifier returned probability {bad}")));
    }

    Ok(FoldOutcome {
        result: fold_result(fold_no, &y_test, &probabilities, config.decision_threshold),
        test_rows: fold.test.clone(),
        probabilities,
        scaler,
    })
}

/// Value of a named metric for one fold; `None` if not applicable.
pub fn metric_value(r: &FoldResult, metric: &str) -> Option<f64> {
    match metric {
        "accuracy" => Some(r.accuracy),
        "precision" => Some(r.precision),
        "recall" => Some(r.recall),
        "f1" => Some(r.f1),
        "roc_auc" => r.roc_auc,
        "pr_auc" => r.pr_auc,
        _ => None,
    }
}

/// Mean and sample standard deviation (n - 1) of each metric across folds,
/// skipping folds where the metric is not applicable.
pub fn metric_stats(folds: &[FoldResult]) -> BTreeMap<String, MetricStats> {
    CV_METRICS
        .iter()
        .filter_map(|&m| {
            let values: Vec<f64> = folds.iter().filter_map(|f| metric_value(f, m)).collect();
            let mean = mean(&values)?;
            let std = std_dev(&values, 1)?;
            Some((m.to_string(), MetricStats { mean, std }))
        })
        .collect()
}

fn aggregate(dataset: &Dataset, outcomes: &[FoldOutcome], config: &CvConfig) -> CvSummary {
    let mut predictions = Vec::with_capacity(dataset.len());
    for o in outcomes {
        for (&row, &p) in o.test_rows.iter().zip(&o.probabilities) {
            predictions.push(OutOfFoldPrediction {
                fold: o.result.fold,
                row,
                source: dataset.rows[row].source.clone(),
                y_true: dataset.rows[row].label,
                y_pred: u8::from(p >= config.decision_threshold),
                y_proba: p,
            });
        }
    }

    let y_true: Vec<u8> = predictions.iter().map(|p| p.y_true).collect();
    let y_pred: Vec<u8> = predictions.iter().map(|p| p.y_pred).collect();
    let y_proba: Vec<f64> = predictions.iter().map(|p| p.y_proba).collect();

    let folds: Vec<FoldResult> = outcomes.iter().map(|o| o.result.clone()).collect();
    CvSummary {
        n_folds: folds.len(),
        stats: metric_stats(&folds),
        global: confusion(&y_true, &y_pred),
        sweep: threshold_sweep(&y_true, &y_proba, &config.thresholds),
        folds,
        predictions,
    }
}
