//! CSV exports.
//!
//! Everything written here is meant to be easy to consume in spreadsheets or
//! downstream scripts: one flat record per row, header first.

use std::fs::create_dir_all;
use std::io::Write;
use std::path::Path;

use csv::Writer;
use serde::Serialize;

use crate::domain::{FoldResult, OutOfFoldPrediction, Prediction};
use crate::error::AppError;
use crate::io::ingest::RawTable;

fn open_writer(path: &Path) -> Result<Writer<std::fs::File>, AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)
            .map_err(|e| AppError::input(format!("Failed to create directory '{}': {e}", parent.display())))?;
    }
    Writer::from_path(path).map_err(|e| AppError::input(format!("Failed to create '{}': {e}", path.display())))
}

fn write_records<T: Serialize>(path: &Path, records: impl IntoIterator<Item = T>) -> Result<(), AppError> {
    let mut w = open_writer(path)?;
    for r in records {
        w.serialize(r)
            .map_err(|e| AppError::input(format!("Failed to write row to '{}': {e}", path.display())))?;
    }
    w.flush()
        .map_err(|e| AppError::input(format!("Failed to flush '{}': {e}", path.display())))
}

#[derive(Serialize)]
struct FoldRecord {
    fold: usize,
    accuracy: f64,
    precision: f64,
    recall: f64,
    f1: f64,
    roc_auc: Option<f64>,
    pr_auc: Option<f64>,
    tp: usize,
    fp: usize,
    tn: usize,
    #[serde(rename = "fn")]
    fn_: usize,
    n_test: usize,
}

/// `cv_fold_metrics.csv`: one row per fold.
pub fn write_fold_metrics(path: &Path, folds: &[FoldResult]) -> Result<(), AppError> {
    write_records(
        path,
        folds.iter().map(|f| FoldRecord {
            fold: f.fold,
            accuracy: f.accuracy,
            precision: f.precision,
            recall: f.recall,
            f1: f.f1,
            roc_auc: f.roc_auc,
            pr_auc: f.pr_auc,
            tp: f.confusion.tp,
            fp: f.confusion.fp,
            tn: f.confusion.tn,
            fn_: f.confusion.fn_,
            n_test: f.n_test,
        }),
    )
}

#[derive(Serialize)]
struct OofRecord<'a> {
    fold: usize,
    source: &'a str,
    y_true: u8,
    y_pred: u8,
    y_proba: f64,
}

/// `cv_predictions.csv`: every out-of-fold prediction with its fold.
pub fn write_oof_predictions(path: &Path, predictions: &[OutOfFoldPrediction]) -> Result<(), AppError> {
    write_records(
        path,
        predictions.iter().map(|p| OofRecord {
            fold: p.fold,
            source: &p.source,
            y_true: p.y_true,
            y_pred: p.y_pred,
            y_proba: p.y_proba,
        }),
    )
}

#[derive(Serialize)]
struct ImportanceRecord<'a> {
    feature: &'a str,
    importance: f64,
}

/// Feature importances, most important first.
pub fn write_importances(path: &Path, names: &[String], importances: &[f64]) -> Result<(), AppError> {
    let mut pairs: Vec<(&String, f64)> = names.iter().zip(importances.iter().copied()).collect();
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
    write_records(
        path,
        pairs.into_iter().map(|(feature, importance)| ImportanceRecord { feature, importance }),
    )
}

#[derive(Serialize)]
struct PredictionRecord<'a> {
    id: &'a str,
    prediction: &'static str,
    probability: f64,
    orbital_period: f64,
    planet_radius: f64,
    transit_duration: Option<f64>,
    flux_mean: f64,
    flux_std: f64,
}

pub fn write_predictions(path: &Path, predictions: &[Prediction]) -> Result<(), AppError> {
    write_records(
        path,
        predictions.iter().map(|p| PredictionRecord {
            id: &p.id,
            prediction: p.prediction.as_str(),
            probability: p.probability,
            orbital_period: p.features.orbital_period,
            planet_radius: p.features.planet_radius,
            transit_duration: p.features.transit_duration,
            flux_mean: p.features.flux_mean,
            flux_std: p.features.flux_std,
        }),
    )
}

/// Write a raw table as CSV, optionally preceded by `#` comment lines.
pub fn write_raw_table(path: &Path, table: &RawTable, comments: &[&str]) -> Result<(), AppError> {
    let err = |e: &dyn std::fmt::Display| AppError::input(format!("Failed to write '{}': {e}", path.display()));

    let mut buf: Vec<u8> = Vec::new();
    for line in comments {
        writeln!(buf, "# {line}").map_err(|e| err(&e))?;
    }
    {
        let mut w = csv::Writer::from_writer(&mut buf);
        w.write_record(&table.headers).map_err(|e| err(&e))?;
        for row in &table.rows {
            w.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))
                .map_err(|e| err(&e))?;
        }
        w.flush().map_err(|e| err(&e))?;
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).map_err(|e| err(&e))?;
    }
    std::fs::write(path, buf).map_err(|e| err(&e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfusionCounts;
    use crate::io::ingest::load_csv;

    #[test]
    fn fold_metrics_have_one_row_per_fold_and_blank_auc() {
        let fold = |i, auc| FoldResult {
            fold: i,
            confusion: ConfusionCounts { tp: 3, fp: 1, tn: 4, fn_: 0 },
            accuracy: 0.875,
            precision: 0.75,
            recall: 1.0,
            f1: 0.857,
            roc_auc: auc,
            pr_auc: auc,
            n_test: 8,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv_fold_metrics.csv");
        write_fold_metrics(&path, &[fold(1, Some(0.9)), fold(2, None)]).unwrap();

        let table = load_csv(&path).unwrap();
        assert_eq!(table.len(), 2);
        let auc = table.column_index("roc_auc").unwrap();
        assert_eq!(table.cell(0, auc), Some("0.9"));
        assert_eq!(table.cell(1, auc), None);
        assert!(table.column_index("fn").is_some());
    }

    #[test]
    fn importances_are_sorted_descending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.features.csv");
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        write_importances(&path, &names, &[0.2, 0.5, 0.3]).unwrap();
        let table = load_csv(&path).unwrap();
        let col = table.column_index("feature").unwrap();
        let order: Vec<&str> = (0..3).filter_map(|r| table.cell(r, col)).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn raw_table_round_trips_through_ingest() {
        let table = RawTable {
            headers: vec!["koi_period".to_string(), "koi_prad".to_string()],
            rows: vec![vec![Some("10.5".to_string()), None]],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kepler.csv");
        write_raw_table(&path, &table, &["synthetic catalog"]).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("# synthetic"));
        assert_eq!(load_csv(&path).unwrap(), table);
    }
}
