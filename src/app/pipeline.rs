//! Shared pipeline logic behind the CLI commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load sources -> combine -> {hold-out split | folds} -> scale -> classify -> metrics -> artifacts
//!
//! The CLI layer (`app`) only converts arguments into configs and prints.

use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};

use crate::catalog::{extract_features, load_dataset};
use crate::data::{SynthConfig, generate_catalogs};
use crate::domain::{
    ArtifactMeta, Dataset, FEATURE_NAMES, HIGH_CONFIDENCE, LabelCompleteness, MetricsArtifact, Prediction,
    PredictionSummary, ScalingMethod, SourceSpec, SourceTestMetrics, TestMetrics, Verdict, feature_names,
};
use crate::error::{AppError, ErrorKind};
use crate::eval::{CvConfig, CvReport, cross_validate, stratified_split, test_metrics};
use crate::io::artifact::{ArtifactPaths, read_json, write_json};
use crate::io::export::{write_fold_metrics, write_importances, write_oof_predictions, write_raw_table};
use crate::io::ingest::{RawTable, load_csv};
use crate::math::{feature_matrix, take_rows};
use crate::models::{BoostedTrees, BoosterParams, Classifier, ModelArtifact, RegistryEntry};
use crate::report::{SourceDiagnostic, diagnose_table};
use crate::scaling::Scaler;

pub const CV_FOLD_METRICS_FILE: &str = "cv_fold_metrics.csv";
pub const CV_PREDICTIONS_FILE: &str = "cv_predictions.csv";

/// The three survey catalogs under `data_dir`, with optional per-file overrides.
pub fn default_sources(
    data_dir: &Path,
    kepler: Option<PathBuf>,
    k2: Option<PathBuf>,
    tess: Option<PathBuf>,
) -> Vec<SourceSpec> {
    vec![
        SourceSpec {
            name: "kepler".to_string(),
            path: kepler.unwrap_or_else(|| data_dir.join("kepler.csv")),
            completeness: LabelCompleteness::Full,
            required: true,
        },
        SourceSpec {
            name: "k2".to_string(),
            path: k2.unwrap_or_else(|| data_dir.join("k2.csv")),
            completeness: LabelCompleteness::PositiveOnly,
            required: false,
        },
        SourceSpec {
            name: "tess".to_string(),
            path: tess.unwrap_or_else(|| data_dir.join("tess.csv")),
            completeness: LabelCompleteness::PositiveOnly,
            required: false,
        },
    ]
}

fn booster_factory(params: &BoosterParams) -> impl Fn(u64) -> BoostedTrees + Sync + '_ {
    move |seed| BoostedTrees::new(params.with_seed(seed))
}

// ---------------------------------------------------------------------------
// cv
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CvRun {
    pub dataset: Dataset,
    pub report: CvReport,
}

pub fn run_cv(sources: &[SourceSpec], cv: &CvConfig, booster: &BoosterParams) -> Result<CvRun, AppError> {
    let dataset = load_dataset(sources)?;
    let report = cross_validate(&dataset, cv, booster_factory(booster))?;
    Ok(CvRun { dataset, report })
}

/// Write `cv_fold_metrics.csv` and `cv_predictions.csv` into `dir`.
pub fn export_cv(dir: &Path, report: &CvReport) -> Result<(PathBuf, PathBuf), AppError> {
    let folds = dir.join(CV_FOLD_METRICS_FILE);
    let preds = dir.join(CV_PREDICTIONS_FILE);
    write_fold_metrics(&folds, &report.summary.folds)?;
    write_oof_predictions(&preds, &report.summary.predictions)?;
    info!("cv results written to {}", dir.display());
    Ok((folds, preds))
}

// ---------------------------------------------------------------------------
// train
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub name: String,
    pub test_fraction: f64,
    pub seed: u64,
    pub scaling: ScalingMethod,
    /// Weight positives by `negatives / positives`.
    pub balance_classes: bool,
    pub decision_threshold: f64,
    pub booster: BoosterParams,
    /// `None` skips the cross-validation step.
    pub cv: Option<CvConfig>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            name: "xgb_multi".to_string(),
            test_fraction: 0.2,
            seed: 42,
            scaling: ScalingMethod::Robust,
            balance_classes: true,
            decision_threshold: 0.5,
            booster: BoosterParams::default(),
            cv: Some(CvConfig::default()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub dataset: Dataset,
    pub n_train: usize,
    pub n_test: usize,
    pub test: TestMetrics,
    pub per_source: Vec<SourceTestMetrics>,
    pub cv: Option<CvReport>,
    pub metrics: MetricsArtifact,
    pub importances: Vec<f64>,
    pub paths: ArtifactPaths,
    /// Hyperparameters of the hold-out model; CV folds use them with per-fold seeds.
    pub params: BoosterParams,
}

pub fn train(sources: &[SourceSpec], config: &TrainConfig, models_dir: &Path) -> Result<TrainOutput, AppError> {
    let dataset = load_dataset(sources)?;
    train_on_dataset(dataset, config, models_dir)
}

/// Hold-out training run on an already combined dataset; persists all artifacts.
pub fn train_on_dataset(dataset: Dataset, config: &TrainConfig, models_dir: &Path) -> Result<TrainOutput, AppError> {
    if config.name.trim().is_empty() || config.name.contains(['/', '\\']) {
        return Err(AppError::input(format!("Invalid model name '{}'.", config.name)));
    }
    if !(0.0..=1.0).contains(&config.decision_threshold) {
        return Err(AppError::input(format!(
            "Threshold must be in [0, 1], got {}.",
            config.decision_threshold
        )));
    }

    let names = feature_names();
    let x = feature_matrix(dataset.rows.iter().map(|r| &r.features));
    let y = dataset.labels();
    let (train_idx, test_idx) = stratified_split(&y, config.test_fraction, config.seed)?;

    let x_train = take_rows(&x, &train_idx);
    let x_test = take_rows(&x, &test_idx);
    let y_train: Vec<u8> = train_idx.iter().map(|&i| y[i]).collect();
    let y_test: Vec<u8> = test_idx.iter().map(|&i| y[i]).collect();

    let (scaler, x_train) = Scaler::new(config.scaling).fit_transform(&x_train, &names)?;
    let x_test = scaler.transform(&x_test, &names)?;

    let params = training_params(&dataset, config);
    info!(
        "training on {} rows, testing on {} (scale_pos_weight={:?})",
        train_idx.len(),
        test_idx.len(),
        params.scale_pos_weight
    );

    let mut model = BoostedTrees::new(params.clone());
    model.fit(&x_train, &y_train)?;
    let probs = model.predict_proba(&x_test)?;
    let test = test_metrics(&y_test, &probs, config.decision_threshold);
    let per_source = per_source_metrics(&dataset, &test_idx, &probs, config.decision_threshold);

    let cv = match &config.cv {
        // Same weighted estimator as the hold-out model, re-seeded per fold.
        Some(cv_config) => Some(cross_validate(&dataset, cv_config, booster_factory(&params))?),
        None => None,
    };

    let trained_at = Utc::now();
    let metrics = MetricsArtifact {
        test,
        cv: cv.as_ref().map(|r| r.summary.stats.clone()).unwrap_or_default(),
        meta: Some(ArtifactMeta {
            model: config.name.clone(),
            trained_at,
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            sources: dataset.sources.iter().map(|s| s.name.clone()).collect(),
        }),
    };

    let paths = ArtifactPaths::new(models_dir, &config.name);
    let importances = model.feature_importances().to_vec();
    ModelArtifact {
        name: config.name.clone(),
        feature_names: names.clone(),
        trained_at,
        model,
    }
    .save(&paths.model)?;
    scaler.save(&paths.scaler)?;
    write_json(&paths.metrics, &metrics)?;
    write_json(&paths.sources, &dataset.counts_by_source())?;
    write_importances(&paths.importance, &names, &importances)?;
    info!("artifacts for '{}' written to {}", config.name, models_dir.display());

    Ok(TrainOutput {
        n_train: train_idx.len(),
        n_test: test_idx.len(),
        dataset,
        test,
        per_source,
        cv,
        metrics,
        importances,
        paths,
        params,
    })
}

/// Booster settings shared by the hold-out model and every CV fold of a training run.
fn training_params(dataset: &Dataset, config: &TrainConfig) -> BoosterParams {
    let mut params = config.booster.with_seed(config.seed);
    if config.balance_classes {
        params.scale_pos_weight = class_weight(dataset);
    }
    params
}

fn class_weight(dataset: &Dataset) -> Option<f64> {
    let (pos, neg) = (dataset.positives(), dataset.negatives());
    if pos == 0 || neg == 0 {
        warn!("only one class present ({pos} positive / {neg} negative); class weighting disabled");
        return None;
    }
    Some(neg as f64 / pos as f64)
}

fn per_source_metrics(dataset: &Dataset, test_idx: &[usize], probs: &[f64], threshold: f64) -> Vec<SourceTestMetrics> {
    dataset
        .sources
        .iter()
        .filter_map(|s| {
            let (y, p): (Vec<u8>, Vec<f64>) = test_idx
                .iter()
                .zip(probs)
                .filter(|&(&row, _)| dataset.rows[row].source == s.name)
                .map(|(&row, &p)| (dataset.rows[row].label, p))
                .unzip();
            if y.is_empty() {
                return None;
            }
            let m = test_metrics(&y, &p, threshold);
            Some(SourceTestMetrics {
                source: s.name.clone(),
                n: y.len(),
                positives: y.iter().filter(|&&v| v == 1).count(),
                accuracy: m.accuracy,
                recall: m.recall,
                roc_auc: m.roc_auc,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// predict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PredictOutput {
    pub predictions: Vec<Prediction>,
    pub summary: PredictionSummary,
    /// Rows dropped for missing period/radius.
    pub dropped: usize,
}

pub fn predict_file(entry: &RegistryEntry, input: &Path, threshold: f64) -> Result<PredictOutput, AppError> {
    predict_table(entry, load_csv(input)?, threshold)
}

/// Label-free inference over one catalog table.
pub fn predict_table(entry: &RegistryEntry, table: RawTable, threshold: f64) -> Result<PredictOutput, AppError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AppError::input(format!("Threshold must be in [0, 1], got {threshold}.")));
    }
    if entry.model.feature_names != FEATURE_NAMES {
        return Err(AppError::new(
            ErrorKind::FeatureMismatch,
            format!(
                "Model '{}' expects features {:?}, this build produces {:?}",
                entry.model.name, entry.model.feature_names, FEATURE_NAMES
            ),
        ));
    }

    let frame = extract_features(&table.drop_all_null_rows());
    if frame.is_empty() {
        return Err(AppError::empty(
            "No rows with orbital period and planet radius to predict on.",
        ));
    }
    if frame.dropped > 0 {
        warn!("{} row(s) skipped for missing orbital period or planet radius", frame.dropped);
    }

    let x = feature_matrix(frame.rows.iter().map(|r| &r.features));
    let x = match &entry.scaler {
        Some(scaler) => scaler.transform(&x, &entry.model.feature_names)?,
        None => x,
    };
    let probs = entry.model.model.predict_proba(&x)?;

    let predictions: Vec<Prediction> = frame
        .rows
        .into_iter()
        .zip(&probs)
        .map(|(row, &p)| Prediction {
            id: row.id,
            prediction: Verdict::from_label(u8::from(p >= threshold)),
            probability: p,
            features: row.features,
        })
        .collect();

    let summary = summarize(&predictions, threshold);
    Ok(PredictOutput {
        predictions,
        summary,
        dropped: frame.dropped,
    })
}

pub fn summarize(predictions: &[Prediction], threshold: f64) -> PredictionSummary {
    let planets = predictions.iter().filter(|p| p.prediction == Verdict::Planet).count();
    let mean_probability = if predictions.is_empty() {
        0.0
    } else {
        predictions.iter().map(|p| p.probability).sum::<f64>() / predictions.len() as f64
    };
    PredictionSummary {
        total: predictions.len(),
        threshold,
        predicted_planets: planets,
        false_positives: predictions.len() - planets,
        mean_probability,
        high_confidence_count: predictions.iter().filter(|p| p.probability > HIGH_CONFIDENCE).count(),
    }
}

// ---------------------------------------------------------------------------
// diagnose / compare / synth
// ---------------------------------------------------------------------------

/// Diagnose every source file that exists; missing ones are reported and skipped.
pub fn diagnose(sources: &[SourceSpec]) -> Result<Vec<SourceDiagnostic>, AppError> {
    let mut out = Vec::with_capacity(sources.len());
    for spec in sources {
        if !spec.path.exists() {
            warn!("{}: no file at {}", spec.name, spec.path.display());
            continue;
        }
        let table = load_csv(&spec.path)?;
        out.push(diagnose_table(&spec.name, spec.completeness, &table));
    }
    if out.is_empty() {
        return Err(AppError::input("None of the configured source files exist."));
    }
    Ok(out)
}

/// Resolve a metrics artifact from a path or a model name in `models_dir`.
pub fn resolve_metrics(models_dir: &Path, name_or_path: &str) -> Result<(String, MetricsArtifact), AppError> {
    let as_path = PathBuf::from(name_or_path);
    let path = if as_path.is_file() {
        as_path
    } else {
        ArtifactPaths::new(models_dir, name_or_path).metrics
    };
    let label = path
        .file_name()
        .and_then(|f| f.to_str())
        .map(|f| f.trim_end_matches(".metrics.json").to_string())
        .unwrap_or_else(|| name_or_path.to_string());
    Ok((label, read_json(&path)?))
}

/// Generate synthetic catalogs and write `kepler.csv`, `k2.csv`, `tess.csv` into `dir`.
pub fn write_synthetic(dir: &Path, config: &SynthConfig) -> Result<Vec<PathBuf>, AppError> {
    let catalogs = generate_catalogs(config)?;
    let seed_note = format!("seed={}", config.seed);
    let files = [
        ("kepler.csv", &catalogs.kepler, "Synthetic KOI-style cumulative table"),
        ("k2.csv", &catalogs.k2, "Synthetic K2 planets-and-candidates table"),
        ("tess.csv", &catalogs.tess, "Synthetic TOI table"),
    ];
    let mut written = Vec::with_capacity(files.len());
    for (file, table, title) in files {
        let path = dir.join(file);
        write_raw_table(&path, table, &[title, seed_note.as_str()])?;
        info!("wrote {} rows to {}", table.len(), path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{combine, prepare_source};
    use crate::models::ModelRegistry;

    fn synthetic_dataset(seed: u64) -> Dataset {
        let catalogs = generate_catalogs(&SynthConfig {
            kepler_rows: 240,
            k2_rows: 40,
            tess_rows: 40,
            seed,
            ..SynthConfig::default()
        })
        .unwrap();
        combine(vec![
            prepare_source("kepler", LabelCompleteness::Full, catalogs.kepler),
            prepare_source("k2", LabelCompleteness::PositiveOnly, catalogs.k2),
            prepare_source("tess", LabelCompleteness::PositiveOnly, catalogs.tess),
        ])
        .unwrap()
    }

    fn fast_config() -> TrainConfig {
        let booster = BoosterParams {
            n_estimators: 25,
            max_depth: 4,
            ..BoosterParams::default()
        };
        TrainConfig {
            booster,
            cv: Some(CvConfig {
                folds: 3,
                ..CvConfig::default()
            }),
            ..TrainConfig::default()
        }
    }

    #[test]
    fn cv_on_synthetic_catalogs_beats_chance() {
        let dataset = synthetic_dataset(7);
        let booster = fast_config().booster;
        let report = cross_validate(&dataset, &CvConfig::default(), booster_factory(&booster)).unwrap();
        let auc = report.summary.stats["roc_auc"].mean;
        assert!(auc > 0.75, "mean ROC-AUC {auc}");
        assert_eq!(report.summary.predictions.len(), dataset.len());
    }

    #[test]
    fn train_writes_artifacts_and_registry_predicts() {
        let dir = tempfile::tempdir().unwrap();
        let out = train_on_dataset(synthetic_dataset(11), &fast_config(), dir.path()).unwrap();

        for p in [&out.paths.model, &out.paths.scaler, &out.paths.metrics, &out.paths.sources, &out.paths.importance] {
            assert!(p.exists(), "{} missing", p.display());
        }
        assert_eq!(out.n_train + out.n_test, out.dataset.len());
        assert!(out.metrics.cv.contains_key("recall"));
        assert!((out.importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        // Positive-only sources have no negatives, so their ROC-AUC is undefined.
        assert!(out.per_source.iter().filter(|s| s.source != "kepler").all(|s| s.roc_auc.is_none()));

        let metrics: MetricsArtifact = read_json(&out.paths.metrics).unwrap();
        assert_eq!(metrics.test, out.test);

        let registry = ModelRegistry::load(dir.path()).unwrap();
        let entry = registry.get("xgb_multi").unwrap();
        let table = generate_catalogs(&SynthConfig {
            kepler_rows: 30,
            seed: 99,
            ..SynthConfig::default()
        })
        .unwrap()
        .kepler;
        let pred = predict_table(entry, table, 0.5).unwrap();
        assert_eq!(pred.summary.total, pred.predictions.len());
        assert_eq!(pred.summary.predicted_planets + pred.summary.false_positives, pred.summary.total);
        assert!(pred.predictions.iter().all(|p| (0.0..=1.0).contains(&p.probability)));
    }

    #[test]
    fn cv_inside_train_uses_the_class_weighted_booster() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = synthetic_dataset(13);
        let expected = dataset.negatives() as f64 / dataset.positives() as f64;
        let config = fast_config();
        let out = train_on_dataset(dataset.clone(), &config, dir.path()).unwrap();

        assert_eq!(out.params.scale_pos_weight, Some(expected));
        let cv_config = config.cv.clone().unwrap();
        let weighted = cross_validate(&dataset, &cv_config, booster_factory(&out.params)).unwrap();
        let unweighted = cross_validate(&dataset, &cv_config, booster_factory(&config.booster)).unwrap();
        let reported = out.cv.unwrap();
        assert_eq!(reported.summary.predictions, weighted.summary.predictions);
        assert_ne!(reported.summary.predictions, unweighted.summary.predictions);
    }

    #[test]
    fn train_rejects_out_of_range_threshold_without_cv() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainConfig {
            cv: None,
            decision_threshold: 1.5,
            ..fast_config()
        };
        let err = train_on_dataset(synthetic_dataset(3), &config, dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(!ArtifactPaths::new(dir.path(), &config.name).model.exists());
    }

    #[test]
    fn predict_rejects_bad_threshold_and_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainConfig {
            cv: None,
            ..fast_config()
        };
        train_on_dataset(synthetic_dataset(3), &config, dir.path()).unwrap();
        let registry = ModelRegistry::load(dir.path()).unwrap();
        let entry = registry.get("xgb_multi").unwrap();

        let table = crate::io::ingest::parse_csv("koi_period,koi_prad\n1.0,2.0\n").unwrap();
        assert_eq!(predict_table(entry, table.clone(), 1.5).unwrap_err().kind(), ErrorKind::Input);

        let empty = crate::io::ingest::parse_csv("koi_period,koi_prad\n,2.0\n").unwrap();
        assert_eq!(predict_table(entry, empty, 0.5).unwrap_err().kind(), ErrorKind::EmptyDataset);

        let ok = predict_table(entry, table, 0.5).unwrap();
        assert_eq!(ok.predictions.len(), 1);
        assert_eq!(ok.predictions[0].id, "0");
    }

    #[test]
    fn summary_counts_high_confidence_strictly_above_point_seven() {
        let mk = |p: f64| Prediction {
            id: String::new(),
            prediction: Verdict::from_label(u8::from(p >= 0.5)),
            probability: p,
            features: crate::domain::CanonicalFeatureVector {
                orbital_period: 1.0,
                planet_radius: 1.0,
                transit_duration: None,
                flux_mean: 0.0,
                flux_std: 0.0,
                label: None,
            },
        };
        let s = summarize(&[mk(0.2), mk(0.5), mk(0.7), mk(0.95)], 0.5);
        assert_eq!(s.predicted_planets, 3);
        assert_eq!(s.false_positives, 1);
        assert_eq!(s.high_confidence_count, 1);
        assert!((s.mean_probability - 0.5875).abs() < 1e-12);
    }

    #[test]
    fn synthetic_files_load_as_sources() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SynthConfig {
            kepler_rows: 60,
            k2_rows: 10,
            tess_rows: 10,
            ..SynthConfig::default()
        };
        write_synthetic(dir.path(), &cfg).unwrap();
        let sources = default_sources(dir.path(), None, None, None);
        let dataset = load_dataset(&sources).unwrap();
        assert_eq!(dataset.sources.len(), 3);
        assert!(dataset.negatives() > 0);

        let diags = diagnose(&sources).unwrap();
        assert_eq!(diags.len(), 3);
    }

    #[test]
    fn compare_resolves_metrics_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainConfig {
            cv: None,
            name: "baseline".to_string(),
            ..fast_config()
        };
        train_on_dataset(synthetic_dataset(5), &config, dir.path()).unwrap();
        let (label, artifact) = resolve_metrics(dir.path(), "baseline").unwrap();
        assert_eq!(label, "baseline");
        assert!(artifact.cv.is_empty());
        assert!(resolve_metrics(dir.path(), "missing").is_err());
    }
}
