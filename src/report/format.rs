//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the pipeline code stays clean and testable
//! - output changes are localized

use crate::domain::{
    CvSummary, Dataset, MetricsArtifact, Prediction, PredictionSummary, SourceTestMetrics, TestMetrics,
};
use crate::eval::{CV_METRICS, metric_value};

/// Per-source row counts of the combined dataset.
pub fn format_source_counts(dataset: &Dataset) -> String {
    let mut out = String::new();
    out.push_str(&header_line(&[
        ("source", 12, true),
        ("labels", 14, true),
        ("raw", 8, false),
        ("cleaned", 8, false),
        ("final", 8, false),
        ("positive", 9, false),
        ("negative", 9, false),
    ]));
    for s in &dataset.sources {
        let c = &s.counts;
        out.push_str(
            format!(
                "{:<12} {:<14} {:>8} {:>8} {:>8} {:>9} {:>9}\n",
                truncate(&s.name, 12),
                s.completeness.as_str(),
                c.raw,
                c.cleaned,
                c.final_count,
                c.positive,
                c.negative
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out.push_str(&format!(
        "Total: {} rows ({} positive / {} negative)\n",
        dataset.len(),
        dataset.positives(),
        dataset.negatives()
    ));
    out
}

/// Column headers followed by a dashed rule. `(title, width, left_aligned)`.
fn header_line(cols: &[(&str, usize, bool)]) -> String {
    let titles: Vec<String> = cols
        .iter()
        .map(|&(t, w, left)| if left { format!("{t:<w$}") } else { format!("{t:>w$}") })
        .collect();
    let rules: Vec<String> = cols.iter().map(|&(_, w, _)| "-".repeat(w)).collect();
    format!("{}\n{}\n", titles.join(" ").trim_end(), rules.join(" "))
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_else(|| "n/a".to_string())
}

pub fn format_cv_summary(summary: &CvSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== {}-fold cross-validation ===\n", summary.n_folds));
    out.push_str(&header_line(&[
        ("fold", 4, false),
        ("accuracy", 9, false),
        ("precision", 9, false),
        ("recall", 9, false),
        ("f1", 9, false),
        ("roc_auc", 9, false),
        ("pr_auc", 9, false),
        ("tp", 6, false),
        ("fp", 6, false),
        ("tn", 6, false),
        ("fn", 6, false),
    ]));
    for f in &summary.folds {
        let c = &f.confusion;
        out.push_str(&format!(
            "{:>4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9} {:>9} {:>6} {:>6} {:>6} {:>6}\n",
            f.fold,
            f.accuracy,
            f.precision,
            f.recall,
            f.f1,
            fmt_opt(f.roc_auc),
            fmt_opt(f.pr_auc),
            c.tp,
            c.fp,
            c.tn,
            c.fn_
        ));
    }

    out.push_str("\nPer-metric statistics (mean ± sample std [min, max]):\n");
    for metric in CV_METRICS {
        let values: Vec<f64> = summary.folds.iter().filter_map(|f| metric_value(f, metric)).collect();
        match summary.stats.get(metric) {
            Some(s) => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                out.push_str(&format!(
                    "  {:<10} {:.4} ± {:.4}  [{min:.4}, {max:.4}]\n",
                    metric.to_uppercase(),
                    s.mean,
                    s.std
                ));
            }
            None => out.push_str(&format!("  {:<10} n/a\n", metric.to_uppercase())),
        }
    }

    let g = &summary.global;
    out.push_str("\nOverall confusion matrix (all folds combined):\n");
    out.push_str(&format!("  TN={} FP={} FN={} TP={}\n", g.tn, g.fp, g.fn_, g.tp));
    out.push_str(&format!(
        "  Overall recall={:.4} precision={:.4}\n",
        g.recall(),
        g.precision()
    ));

    if !summary.sweep.is_empty() {
        out.push_str("\nThreshold sweep (out-of-fold probabilities):\n");
        for p in &summary.sweep {
            out.push_str(&format!(
                "  threshold {:.2}: recall={:.4} precision={:.4}\n",
                p.threshold, p.recall, p.precision
            ));
        }
    }
    out
}

pub fn format_test_metrics(test: &TestMetrics, per_source: &[SourceTestMetrics], n_train: usize, n_test: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== Hold-out evaluation (train={n_train}, test={n_test}) ===\n"));
    out.push_str(&format!(
        "accuracy={:.4} precision={:.4} recall={:.4} f1={:.4} roc_auc={}\n",
        test.accuracy,
        test.precision,
        test.recall,
        test.f1,
        fmt_opt(test.roc_auc)
    ));

    if !per_source.is_empty() {
        out.push('\n');
        out.push_str(&header_line(&[
            ("source", 12, true),
            ("n", 6, false),
            ("positive", 9, false),
            ("accuracy", 9, false),
            ("recall", 9, false),
            ("roc_auc", 9, false),
        ]));
        for s in per_source {
            out.push_str(&format!(
                "{:<12} {:>6} {:>9} {:>9.4} {:>9.4} {:>9}\n",
                truncate(&s.source, 12),
                s.n,
                s.positives,
                s.accuracy,
                s.recall,
                fmt_opt(s.roc_auc)
            ));
        }
    }
    out
}

pub fn format_importances(names: &[String], importances: &[f64]) -> String {
    let mut pairs: Vec<(&String, f64)> = names.iter().zip(importances.iter().copied()).collect();
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut out = String::from("Feature importance (gain):\n");
    for (name, v) in pairs {
        let bar = "#".repeat((v * 40.0).round() as usize);
        out.push_str(format!("  {name:<18} {v:>7.4} {bar}\n").trim_end());
        out.push('\n');
    }
    out
}

/// Summary block plus the first `limit` predictions.
pub fn format_predictions(predictions: &[Prediction], summary: &PredictionSummary, limit: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== Predictions (threshold {:.2}) ===\n",
        summary.threshold
    ));
    out.push_str(&format!(
        "rows={} planets={} false_positives={} mean_probability={:.4} high_confidence={}\n",
        summary.total,
        summary.predicted_planets,
        summary.false_positives,
        summary.mean_probability,
        summary.high_confidence_count
    ));

    if limit == 0 || predictions.is_empty() {
        return out;
    }
    out.push('\n');
    out.push_str(&header_line(&[
        ("id", 20, true),
        ("prediction", 15, true),
        ("probability", 11, false),
        ("period", 10, false),
        ("radius", 8, false),
    ]));
    for p in predictions.iter().take(limit) {
        out.push_str(&format!(
            "{:<20} {:<15} {:>11.4} {:>10.3} {:>8.3}\n",
            truncate(&p.id, 20),
            p.prediction.as_str(),
            p.probability,
            p.features.orbital_period,
            p.features.planet_radius
        ));
    }
    if predictions.len() > limit {
        out.push_str(&format!("... {} more\n", predictions.len() - limit));
    }
    out
}

const COMPARISON_COLUMNS: &[(&str, usize, bool)] =
    &[("metric", 12, true), ("a", 9, false), ("b", 9, false), ("delta", 9, false)];

/// Side-by-side test and CV metrics of two artifacts with `b - a` deltas.
pub fn format_comparison(a_name: &str, a: &MetricsArtifact, b_name: &str, b: &MetricsArtifact) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {a_name} vs {b_name} ===\n"));

    let test_rows = [
        ("accuracy", Some(a.test.accuracy), Some(b.test.accuracy)),
        ("precision", Some(a.test.precision), Some(b.test.precision)),
        ("recall", Some(a.test.recall), Some(b.test.recall)),
        ("f1", Some(a.test.f1), Some(b.test.f1)),
        ("roc_auc", a.test.roc_auc, b.test.roc_auc),
    ];
    out.push_str("\nTest metrics:\n");
    out.push_str(&header_line(COMPARISON_COLUMNS));
    for (metric, x, y) in test_rows {
        out.push_str(&comparison_row(metric, x, y));
    }

    out.push_str("\nCross-validation means:\n");
    out.push_str(&header_line(COMPARISON_COLUMNS));
    for metric in CV_METRICS {
        let x = a.cv.get(metric).map(|s| s.mean);
        let y = b.cv.get(metric).map(|s| s.mean);
        if x.is_none() && y.is_none() {
            continue;
        }
        out.push_str(&comparison_row(metric, x, y));
    }
    out
}

fn comparison_row(metric: &str, a: Option<f64>, b: Option<f64>) -> String {
    let delta = match (a, b) {
        (Some(x), Some(y)) => format!("{:+.4}", y - x),
        _ => "n/a".to_string(),
    };
    format!("{metric:<12} {:>9} {:>9} {delta:>9}\n", fmt_opt(a), fmt_opt(b))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConfusionCounts, FoldResult, MetricStats, ThresholdPoint};
    use std::collections::BTreeMap;

    fn artifact(recall: f64) -> MetricsArtifact {
        let mut cv = BTreeMap::new();
        cv.insert("recall".to_string(), MetricStats { mean: recall, std: 0.01 });
        MetricsArtifact {
            test: TestMetrics {
                accuracy: 0.9,
                precision: 0.8,
                recall,
                f1: 0.85,
                roc_auc: None,
            },
            cv,
            meta: None,
        }
    }

    #[test]
    fn comparison_shows_signed_deltas() {
        let text = format_comparison("old", &artifact(0.80), "new", &artifact(0.90));
        assert!(text.contains("+0.1000"));
        assert!(text.contains("n/a"));
    }

    #[test]
    fn cv_summary_marks_not_applicable_metrics() {
        let fold = FoldResult {
            fold: 1,
            confusion: ConfusionCounts { tp: 2, fp: 0, tn: 0, fn_: 0 },
            accuracy: 1.0,
            precision: 1.0,
            recall: 1.0,
            f1: 1.0,
            roc_auc: None,
            pr_auc: None,
            n_test: 2,
        };
        let mut stats = BTreeMap::new();
        stats.insert("recall".to_string(), MetricStats { mean: 1.0, std: 0.0 });
        let summary = CvSummary {
            n_folds: 1,
            folds: vec![fold],
            stats,
            global: ConfusionCounts { tp: 2, fp: 0, tn: 0, fn_: 0 },
            sweep: vec![ThresholdPoint { threshold: 0.3, recall: 1.0, precision: 1.0 }],
            predictions: Vec::new(),
        };
        let text = format_cv_summary(&summary);
        assert!(text.contains("ROC_AUC    n/a"));
        assert!(text.contains("threshold 0.30"));
    }

    #[test]
    fn truncate_marks_cut_strings() {
        assert_eq!(truncate("Kepler-1649 c", 8), "Kepler-.");
        assert_eq!(truncate("K2-18 b", 8), "K2-18 b");
    }
}
