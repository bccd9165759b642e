//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - converts arguments into pipeline configs
//! - runs the pipeline and prints reports
//! - writes optional exports

use clap::Parser;
use log::info;

use crate::cli::{BoosterArgs, Command, CompareArgs, CvArgs, EvalArgs, PredictArgs, SourceArgs, SynthArgs, TrainArgs};
use crate::data::SynthConfig;
use crate::domain::SourceSpec;
use crate::error::AppError;
use crate::eval::{CvConfig, default_thresholds};
use crate::models::{BoosterParams, ModelRegistry};

pub mod pipeline;

/// Entry point for the `exo` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Train(args) => handle_train(args),
        Command::Cv(args) => handle_cv(args),
        Command::Predict(args) => handle_predict(args),
        Command::Diagnose(args) => handle_diagnose(args),
        Command::Compare(args) => handle_compare(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_train(args: TrainArgs) -> Result<(), AppError> {
    let sources = sources_from_args(&args.sources);
    let config = train_config_from_args(&args)?;
    let out = pipeline::train(&sources, &config, &args.models_dir)?;

    println!("{}", crate::report::format_source_counts(&out.dataset));
    println!(
        "{}",
        crate::report::format_test_metrics(&out.test, &out.per_source, out.n_train, out.n_test)
    );
    if let Some(cv) = &out.cv {
        println!("{}", crate::report::format_cv_summary(&cv.summary));
    }
    println!(
        "{}",
        crate::report::format_importances(&crate::domain::feature_names(), &out.importances)
    );
    println!("Model saved to {}", out.paths.model.display());
    Ok(())
}

fn handle_cv(args: CvArgs) -> Result<(), AppError> {
    let sources = sources_from_args(&args.sources);
    let cv = cv_config_from_args(&args.eval)?;
    let booster = booster_params_from_args(&args.booster, args.eval.seed)?;
    let run = pipeline::run_cv(&sources, &cv, &booster)?;

    println!("{}", crate::report::format_source_counts(&run.dataset));
    println!("{}", crate::report::format_cv_summary(&run.report.summary));

    if !args.no_save {
        let (folds, preds) = pipeline::export_cv(&args.models_dir, &run.report)?;
        println!("Saved {} and {}", folds.display(), preds.display());
    }
    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let registry = ModelRegistry::load(&args.models_dir)?;
    if args.list {
        for name in registry.list() {
            println!("{name}");
        }
        return Ok(());
    }

    let entry = registry.get(&args.model)?;
    let out = pipeline::predict_file(entry, &args.input, args.threshold)?;
    println!(
        "{}",
        crate::report::format_predictions(&out.predictions, &out.summary, args.show)
    );
    if out.dropped > 0 {
        println!("{} row(s) skipped for missing orbital period or planet radius", out.dropped);
    }

    if let Some(path) = &args.output {
        crate::io::export::write_predictions(path, &out.predictions)?;
        println!("Predictions written to {}", path.display());
    }
    Ok(())
}

fn handle_diagnose(args: SourceArgs) -> Result<(), AppError> {
    let sources = sources_from_args(&args);
    for d in pipeline::diagnose(&sources)? {
        println!("{}", crate::report::format_diagnostic(&d));
    }
    Ok(())
}

fn handle_compare(args: CompareArgs) -> Result<(), AppError> {
    let (a_name, a) = pipeline::resolve_metrics(&args.models_dir, &args.a)?;
    let (b_name, b) = pipeline::resolve_metrics(&args.models_dir, &args.b)?;
    println!("{}", crate::report::format_comparison(&a_name, &a, &b_name, &b));
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let config = synth_config_from_args(&args);
    let written = pipeline::write_synthetic(&args.data_dir, &config)?;
    info!("synthetic catalogs generated with seed {}", config.seed);
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

pub fn sources_from_args(args: &SourceArgs) -> Vec<SourceSpec> {
    pipeline::default_sources(&args.data_dir, args.kepler.clone(), args.k2.clone(), args.tess.clone())
}

pub fn booster_params_from_args(args: &BoosterArgs, seed: u64) -> Result<BoosterParams, AppError> {
    let params = BoosterParams {
        n_estimators: args.n_estimators,
        max_depth: args.max_depth,
        learning_rate: args.learning_rate,
        subsample: args.subsample,
        colsample_bytree: args.colsample_bytree,
        lambda: args.lambda,
        min_child_weight: args.min_child_weight,
        gamma: args.gamma,
        seed,
        ..BoosterParams::default()
    };
    params.validate()?;
    Ok(params)
}

pub fn cv_config_from_args(args: &EvalArgs) -> Result<CvConfig, AppError> {
    let thresholds = match &args.sweep {
        Some(values) => {
            if let Some(bad) = values.iter().find(|t| !(0.0..=1.0).contains(*t)) {
                return Err(AppError::input(format!("Sweep thresholds must be in [0, 1], got {bad}.")));
            }
            let mut sorted = values.clone();
            sorted.sort_by(f64::total_cmp);
            sorted.dedup();
            sorted
        }
        None => default_thresholds(),
    };
    Ok(CvConfig {
        folds: args.folds,
        seed: args.seed,
        decision_threshold: args.threshold,
        thresholds,
        scaling: (!args.no_scaling).then_some(args.scaling),
        parallel: !args.sequential,
    })
}

pub fn train_config_from_args(args: &TrainArgs) -> Result<pipeline::TrainConfig, AppError> {
    if !(args.test_fraction > 0.0 && args.test_fraction < 1.0) {
        return Err(AppError::input(format!(
            "test_fraction must lie in (0, 1), got {}.",
            args.test_fraction
        )));
    }
    let cv = cv_config_from_args(&args.eval)?;
    Ok(pipeline::TrainConfig {
        name: args.name.clone(),
        test_fraction: args.test_fraction,
        seed: args.eval.seed,
        scaling: args.eval.scaling,
        balance_classes: !args.no_balance,
        decision_threshold: args.eval.threshold,
        booster: booster_params_from_args(&args.booster, args.eval.seed)?,
        cv: (!args.no_cv).then_some(cv),
    })
}

pub fn synth_config_from_args(args: &SynthArgs) -> SynthConfig {
    SynthConfig {
        kepler_rows: args.kepler_rows,
        k2_rows: args.k2_rows,
        tess_rows: args.tess_rows,
        missing_rate: args.missing_rate,
        seed: args.seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::domain::ScalingMethod;
    use crate::error::ErrorKind;

    fn parse(argv: &[&str]) -> Command {
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn cv_args_map_onto_config() {
        let Command::Cv(args) = parse(&["exo", "cv", "--no-scaling", "--sequential", "--sweep", "0.5,0.3,0.5"]) else {
            panic!("expected cv");
        };
        let cfg = cv_config_from_args(&args.eval).unwrap();
        assert_eq!(cfg.scaling, None);
        assert!(!cfg.parallel);
        assert_eq!(cfg.thresholds, vec![0.3, 0.5]);
    }

    #[test]
    fn out_of_range_sweep_is_an_input_error() {
        let Command::Cv(args) = parse(&["exo", "cv", "--sweep", "0.3,1.2"]) else {
            panic!("expected cv");
        };
        assert_eq!(cv_config_from_args(&args.eval).unwrap_err().kind(), ErrorKind::Input);
    }

    #[test]
    fn train_args_map_onto_config() {
        let Command::Train(args) = parse(&[
            "exo",
            "train",
            "--name",
            "trial",
            "--no-cv",
            "--scaling",
            "standard",
            "--seed",
            "7",
            "--n-estimators",
            "10",
        ]) else {
            panic!("expected train");
        };
        let cfg = train_config_from_args(&args).unwrap();
        assert_eq!(cfg.name, "trial");
        assert!(cfg.cv.is_none());
        assert_eq!(cfg.scaling, ScalingMethod::Standard);
        assert_eq!(cfg.booster.n_estimators, 10);
        assert_eq!(cfg.booster.seed, 7);
        assert!(cfg.balance_classes);
    }

    #[test]
    fn invalid_booster_args_are_rejected() {
        let Command::Train(args) = parse(&["exo", "train", "--subsample", "0"]) else {
            panic!("expected train");
        };
        assert_eq!(train_config_from_args(&args).unwrap_err().kind(), ErrorKind::Input);
    }

    #[test]
    fn explicit_source_paths_override_data_dir() {
        let Command::Diagnose(args) = parse(&["exo", "diagnose", "--data-dir", "d", "--k2", "other/k2.csv"]) else {
            panic!("expected diagnose");
        };
        let sources = sources_from_args(&args);
        assert_eq!(sources[0].path, std::path::PathBuf::from("d/kepler.csv"));
        assert_eq!(sources[1].path, std::path::PathBuf::from("other/k2.csv"));
        assert!(sources[0].required && !sources[1].required);
    }
}
