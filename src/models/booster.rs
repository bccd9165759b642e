//! Gradient-boosted trees with logistic loss.

use std::path::Path;

use chrono::{DateTime, Utc};
use log::debug;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};
use crate::io::artifact::{read_json, write_json};
use crate::models::binning::BinMapper;
use crate::models::tree::{GrowContext, Tree, TreeParams, grow_tree};
use crate::models::Classifier;

/// Hyperparameters for [`BoostedTrees`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows drawn (Bernoulli) for each tree.
    pub subsample: f64,
    /// Fraction of features drawn for each tree.
    pub colsample_bytree: f64,
    pub lambda: f64,
    pub min_child_weight: f64,
    pub gamma: f64,
    pub max_bins: usize,
    /// Weight applied to positive rows; `None` means 1.
    pub scale_pos_weight: Option<f64>,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 6,
            learning_rate: 0.1,
            subsample: 0.8,
            colsample_bytree: 0.8,
            lambda: 1.0,
            min_child_weight: 1.0,
            gamma: 0.0,
            max_bins: 64,
            scale_pos_weight: None,
            seed: 42,
        }
    }
}

impl BoosterParams {
    pub fn with_seed(&self, seed: u64) -> Self {
        Self { seed, ..self.clone() }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let in_unit = |v: f64| v > 0.0 && v <= 1.0;
        if self.n_estimators == 0 {
            return Err(AppError::input("n_estimators must be at least 1."));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(AppError::input("learning_rate must be a positive number."));
        }
        if !in_unit(self.subsample) || !in_unit(self.colsample_bytree) {
            return Err(AppError::input("subsample and colsample_bytree must lie in (0, 1]."));
        }
        if self.lambda < 0.0 || self.gamma < 0.0 || self.min_child_weight < 0.0 {
            return Err(AppError::input("lambda, gamma and min_child_weight must be non-negative."));
        }
        if let Some(w) = self.scale_pos_weight {
            if !(w > 0.0 && w.is_finite()) {
                return Err(AppError::input(format!("scale_pos_weight must be positive, got {w}.")));
            }
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            lambda: self.lambda,
            gamma: self.gamma,
            min_child_weight: self.min_child_weight,
            learning_rate: self.learning_rate,
        }
    }
}

/// Boosted ensemble. Serializes to a self-contained JSON blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTrees {
    params: BoosterParams,
    base_margin: f64,
    n_features: usize,
    trees: Vec<Tree>,
    importance: Vec<f64>,
}

impl BoostedTrees {
    pub fn new(params: BoosterParams) -> Self {
        Self {
            params,
            base_margin: 0.0,
            n_features: 0,
            trees: Vec::new(),
            importance: Vec::new(),
        }
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Total split gain per feature, normalized to sum to 1 (all zeros if no split was made).
    pub fn feature_importances(&self) -> &[f64] {
        &self.importance
    }

    fn margin(&self, row: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_margin, |m, t| m + t.predict_row(row))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn matrix_rows(x: &DMatrix<f64>) -> Vec<Vec<f64>> {
    (0..x.nrows()).map(|r| x.row(r).iter().copied().collect()).collect()
}

impl Classifier for BoostedTrees {
    fn fit(&mut self, x: &DMatrix<f64>, y: &[u8]) -> Result<(), AppError> {
        self.params.validate()?;
        if x.nrows() != y.len() {
            return Err(AppError::new(
                ErrorKind::FeatureMismatch,
                format!("{} rows but {} labels", x.nrows(), y.len()),
            ));
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(AppError::empty("Cannot fit a classifier on an empty matrix."));
        }
        if let Some(bad) = y.iter().find(|&&v| v > 1) {
            return Err(AppError::input(format!("Labels must be 0 or 1, found {bad}.")));
        }

        let n = x.nrows();
        let n_features = x.ncols();
        let p = &self.params;
        let pos_weight = p.scale_pos_weight.unwrap_or(1.0);
        let weights: Vec<f64> = y.iter().map(|&v| if v == 1 { pos_weight } else { 1.0 }).collect();

        let mapper = BinMapper::fit(x, p.max_bins);
        let binned = mapper.transform(x);
        let raw_rows = matrix_rows(x);
        let n_cols = ((p.colsample_bytree * n_features as f64).round() as usize).clamp(1, n_features);

        let mut rng = StdRng::seed_from_u64(p.seed);
        let mut margin = vec![self.base_margin; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut gains = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(p.n_estimators);

        for _ in 0..p.n_estimators {
            for i in 0..n {
                let prob = sigmoid(margin[i]);
                grad[i] = (prob - f64::from(y[i])) * weights[i];
                hess[i] = (prob * (1.0 - prob)).max(1e-16) * weights[i];
            }

            let mut rows: Vec<usize> = if p.subsample < 1.0 {
                (0..n).filter(|_| rng.r#gen::<f64>() < p.subsample).collect()
            } else {
                (0..n).collect()
            };
            if rows.is_empty() {
                rows = (0..n).collect();
            }

            let mut features = index::sample(&mut rng, n_features, n_cols).into_vec();
            features.sort_unstable();

            let ctx = GrowContext {
                binned: &binned,
                mapper: &mapper,
                grad: &grad,
                hess: &hess,
                features: &features,
                params: p.tree_params(),
            };
            let (tree, tree_gains) = grow_tree(&ctx, rows, n_features);

            for (m, row) in margin.iter_mut().zip(&raw_rows) {
                *m += tree.predict_row(row);
            }
            for (g, tg) in gains.iter_mut().zip(tree_gains) {
                *g += tg;
            }
            trees.push(tree);
        }

        let total: f64 = gains.iter().sum();
        if total > 0.0 {
            gains.iter_mut().for_each(|g| *g /= total);
        }

        debug!(
            "fitted {} trees on {n} rows x {n_features} features (seed {})",
            trees.len(),
            p.seed
        );

        self.n_features = n_features;
        self.trees = trees;
        self.importance = gains;
        Ok(())
    }

    fn predict_proba(&self, x: &DMatrix<f64>) -> Result<Vec<f64>, AppError> {
        if !self.is_fitted() {
            return Err(AppError::new(
                ErrorKind::NotFitted,
                "Classifier must be fitted before predict_proba.",
            ));
        }
        if x.ncols() != self.n_features {
            return Err(AppError::new(
                ErrorKind::FeatureMismatch,
                format!(
                    "Matrix has {} columns but the model was trained on {}",
                    x.ncols(),
                    self.n_features
                ),
            ));
        }

        let probs: Vec<f64> = matrix_rows(x).iter().map(|r| sigmoid(self.margin(r))).collect();
        if let Some(i) = probs.iter().position(|p| !p.is_finite()) {
            return Err(AppError::numeric(format!("Non-finite probability for row {i}.")));
        }
        Ok(probs)
    }
}

/// Persisted model: the ensemble plus the feature order it expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub model: BoostedTrees,
}

impl ModelArtifact {
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        write_json(path, self)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let artifact: ModelArtifact = read_json(path)?;
        if !artifact.model.is_fitted() {
            return Err(AppError::new(
                ErrorKind::NotFitted,
                format!("Model in '{}' has no trees.", path.display()),
            ));
        }
        if artifact.model.n_features != artifact.feature_names.len() {
            return Err(AppError::input(format!(
                "Model in '{}' expects {} features but lists {} names.",
                path.display(),
                artifact.model.n_features,
                artifact.feature_names.len()
            )));
        }
        for (i, tree) in artifact.model.trees.iter().enumerate() {
            tree.validate(artifact.model.n_features).map_err(|e| {
                AppError::input(format!("Model in '{}' is malformed: tree {i}: {e}", path.display()))
            })?;
        }
        Ok(artifact)
    }
}
