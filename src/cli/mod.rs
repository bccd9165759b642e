//! Command-line parsing for the exoplanet vetting pipeline.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! pipeline code. Arguments are converted into plain config structs in `app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::ScalingMethod;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "exo",
    version,
    about = "Exoplanet candidate vetting across Kepler, K2 and TESS catalogs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train on the combined catalogs (hold-out split + cross-validation) and persist artifacts.
    Train(TrainArgs),
    /// Run stratified k-fold cross-validation with a threshold sweep.
    Cv(CvArgs),
    /// Classify rows of a catalog file with a trained model.
    Predict(PredictArgs),
    /// Print per-source data-quality diagnostics.
    Diagnose(SourceArgs),
    /// Compare the metrics of two trained models.
    Compare(CompareArgs),
    /// Write synthetic Kepler/K2/TESS-shaped catalogs.
    Synth(SynthArgs),
}

/// Where the survey catalogs live.
#[derive(Debug, Args, Clone)]
pub struct SourceArgs {
    /// Directory holding kepler.csv, k2.csv and tess.csv.
    #[arg(long = "data-dir", env = "EXO_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Kepler KOI table (full dispositions). Required.
    #[arg(long, value_name = "CSV")]
    pub kepler: Option<PathBuf>,

    /// K2 table (confirmed planets only). Skipped if missing.
    #[arg(long, value_name = "CSV")]
    pub k2: Option<PathBuf>,

    /// TESS table (treated as confirmed planets only). Skipped if missing.
    #[arg(long, value_name = "CSV")]
    pub tess: Option<PathBuf>,
}

/// Boosted-tree hyperparameters.
#[derive(Debug, Args, Clone)]
pub struct BoosterArgs {
    #[arg(long, default_value_t = 100)]
    pub n_estimators: usize,

    #[arg(long, default_value_t = 6)]
    pub max_depth: usize,

    #[arg(long, default_value_t = 0.1)]
    pub learning_rate: f64,

    /// Row fraction sampled per tree.
    #[arg(long, default_value_t = 0.8)]
    pub subsample: f64,

    /// Feature fraction sampled per tree.
    #[arg(long, default_value_t = 0.8)]
    pub colsample_bytree: f64,

    /// L2 regularization on leaf weights.
    #[arg(long, default_value_t = 1.0)]
    pub lambda: f64,

    #[arg(long, default_value_t = 1.0)]
    pub min_child_weight: f64,

    /// Minimum gain required to split.
    #[arg(long, default_value_t = 0.0)]
    pub gamma: f64,
}

/// Options shared by `train` and `cv` for the cross-validation step.
#[derive(Debug, Args, Clone)]
pub struct EvalArgs {
    /// Number of folds.
    #[arg(short = 'k', long, default_value_t = 5)]
    pub folds: usize,

    /// Seed for fold shuffling and the hold-out split; fold i trains with seed + i.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Decision threshold: a row is predicted positive when p >= threshold.
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f64,

    /// Thresholds for the recall/precision sweep (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "T1,T2,...")]
    pub sweep: Option<Vec<f64>>,

    /// Feature scaling method.
    #[arg(long, value_enum, default_value_t = ScalingMethod::Robust)]
    pub scaling: ScalingMethod,

    /// Disable feature scaling.
    #[arg(long)]
    pub no_scaling: bool,

    /// Run folds one after another instead of in parallel.
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Debug, Args, Clone)]
pub struct CvArgs {
    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(flatten)]
    pub eval: EvalArgs,

    #[command(flatten)]
    pub booster: BoosterArgs,

    /// Directory for cv_fold_metrics.csv and cv_predictions.csv.
    #[arg(long = "models-dir", env = "EXO_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Do not write CSV exports.
    #[arg(long)]
    pub no_save: bool,
}

#[derive(Debug, Args, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(flatten)]
    pub eval: EvalArgs,

    #[command(flatten)]
    pub booster: BoosterArgs,

    /// Artifact name prefix.
    #[arg(long, default_value = "xgb_multi")]
    pub name: String,

    #[arg(long = "models-dir", env = "EXO_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Fraction of rows held out for testing.
    #[arg(long, default_value_t = 0.2)]
    pub test_fraction: f64,

    /// Do not weight positives by negatives/positives.
    #[arg(long)]
    pub no_balance: bool,

    /// Skip cross-validation (metrics artifact gets an empty `cv` block).
    #[arg(long)]
    pub no_cv: bool,
}

#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    /// Catalog CSV to classify.
    #[arg(value_name = "CSV")]
    pub input: PathBuf,

    /// Model name inside the models directory.
    #[arg(short, long, default_value = "xgb_multi")]
    pub model: String,

    #[arg(long = "models-dir", env = "EXO_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    #[arg(long, default_value_t = 0.5)]
    pub threshold: f64,

    /// Write all predictions to this CSV.
    #[arg(short, long, value_name = "CSV")]
    pub output: Option<PathBuf>,

    /// Number of predictions to print.
    #[arg(long, default_value_t = 20)]
    pub show: usize,

    /// List available models and exit.
    #[arg(long)]
    pub list: bool,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    /// First model name or metrics JSON path.
    pub a: String,

    /// Second model name or metrics JSON path.
    pub b: String,

    #[arg(long = "models-dir", env = "EXO_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Output directory.
    #[arg(long = "data-dir", env = "EXO_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    #[arg(long, default_value_t = 600)]
    pub kepler_rows: usize,

    #[arg(long, default_value_t = 150)]
    pub k2_rows: usize,

    #[arg(long, default_value_t = 200)]
    pub tess_rows: usize,

    /// Probability that an optional cell is left blank.
    #[arg(long, default_value_t = 0.05)]
    pub missing_rate: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sweep_accepts_comma_list() {
        let cli = Cli::try_parse_from(["exo", "cv", "--sweep", "0.3,0.5", "-k", "3"]).unwrap();
        match cli.command {
            Command::Cv(args) => {
                assert_eq!(args.eval.sweep, Some(vec![0.3, 0.5]));
                assert_eq!(args.eval.folds, 3);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn predict_takes_positional_input() {
        let cli = Cli::try_parse_from(["exo", "predict", "toi.csv", "--threshold", "0.4"]).unwrap();
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(args.input, PathBuf::from("toi.csv"));
        assert_eq!(args.threshold, 0.4);
        assert_eq!(args.model, "xgb_multi");
    }
}
