//! Binary classification metrics.
//!
//! Ranking metrics return `None` when only one class is present, since neither
//! curve is defined then.

use crate::domain::{ConfusionCounts, FoldResult, TestMetrics, ThresholdPoint};

pub fn confusion(y_true: &[u8], y_pred: &[u8]) -> ConfusionCounts {
    let mut c = ConfusionCounts::default();
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t, p) {
            (1, 1) => c.tp += 1,
            (0, 1) => c.fp += 1,
            (1, _) => c.fn_ += 1,
            _ => c.tn += 1,
        }
    }
    c
}

/// Labels from probabilities: `1` when `p >= threshold`.
pub fn threshold_labels(probs: &[f64], threshold: f64) -> Vec<u8> {
    probs.iter().map(|&p| u8::from(p >= threshold)).collect()
}

fn class_counts(y_true: &[u8]) -> (usize, usize) {
    let pos = y_true.iter().filter(|&&y| y == 1).count();
    (pos, y_true.len() - pos)
}

/// Area under the ROC curve via the Mann-Whitney U statistic (ties get average ranks).
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    let (pos, neg) = class_counts(y_true);
    if pos == 0 || neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied block i..=j shares the average rank.
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if y_true[idx] == 1 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let pos_f = pos as f64;
    let u = rank_sum_pos - pos_f * (pos_f + 1.0) / 2.0;
    Some(u / (pos_f * neg as f64))
}

/// Points of the precision-recall curve as `(recall, precision)`, recall ascending.
///
/// Starts at the `(0, 1)` anchor, then one point per distinct score (descending)
/// until full recall is reached.
pub fn precision_recall_curve(y_true: &[u8], scores: &[f64]) -> Vec<(f64, f64)> {
    let (pos, _) = class_counts(y_true);
    if pos == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = vec![(0.0, 1.0)];
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < order.len() {
        let s = scores[order[i]];
        while i < order.len() && scores[order[i]] == s {
            if y_true[order[i]] == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push((tp as f64 / pos as f64, tp as f64 / (tp + fp) as f64));
        if tp == pos {
            break;
        }
    }
    points
}

/// Trapezoidal area under the precision-recall curve.
pub fn pr_auc(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    let (pos, neg) = class_counts(y_true);
    if pos == 0 || neg == 0 {
        return None;
    }
    let curve = precision_recall_curve(y_true, scores);
    Some(
        curve
            .windows(2)
            .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0)
            .sum(),
    )
}

/// Recall and precision at each threshold.
pub fn threshold_sweep(y_true: &[u8], probs: &[f64], thresholds: &[f64]) -> Vec<ThresholdPoint> {
    thresholds
        .iter()
        .map(|&t| {
            let c = confusion(y_true, &threshold_labels(probs, t));
            ThresholdPoint {
                threshold: t,
                recall: c.recall(),
                precision: c.precision(),
            }
        })
        .collect()
}

pub fn fold_result(fold: usize, y_true: &[u8], probs: &[f64], threshold: f64) -> FoldResult {
    let c = confusion(y_true, &threshold_labels(probs, threshold));
    FoldResult {
        fold,
        confusion: c,
        accuracy: c.accuracy(),
        precision: c.precision(),
        recall: c.recall(),
        f1: c.f1(),
        roc_auc: roc_auc(y_true, probs),
        pr_auc: pr_auc(y_true, probs),
        n_test: y_true.len(),
    }
}

pub fn test_metrics(y_true: &[u8], probs: &[f64], threshold: f64) -> TestMetrics {
    let c = confusion(y_true, &threshold_labels(probs, threshold));
    TestMetrics {
        accuracy: c.accuracy(),
        precision: c.precision(),
        recall: c.recall(),
        f1: c.f1(),
        roc_auc: roc_auc(y_true, probs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn confusion_counts_each_cell() {
        let c = confusion(&[1, 1, 0, 0, 1], &[1, 0, 1, 0, 1]);
        assert_eq!((c.tp, c.fn_, c.fp, c.tn), (2, 1, 1, 1));
        assert!(close(c.recall(), 2.0 / 3.0));
    }

    #[test]
    fn zero_denominators_give_zero() {
        let c = confusion(&[0, 0], &[0, 0]);
        assert_eq!(c.precision(), 0.0);
        assert_eq!(c.recall(), 0.0);
        assert_eq!(c.f1(), 0.0);
    }

    #[test]
    fn roc_auc_known_values() {
        // Classic example: 0.75.
        assert!(close(roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]).unwrap(), 0.75));
        assert!(close(roc_auc(&[0, 1], &[0.2, 0.9]).unwrap(), 1.0));
        // All scores tied: 0.5.
        assert!(close(roc_auc(&[0, 1, 0, 1], &[0.5; 4]).unwrap(), 0.5));
    }

    #[test]
    fn roc_auc_single_class_is_not_applicable() {
        assert!(roc_auc(&[1, 1, 1], &[0.2, 0.5, 0.9]).is_none());
        assert!(pr_auc(&[0, 0], &[0.2, 0.5]).is_none());
    }

    #[test]
    fn pr_auc_perfect_and_known() {
        assert!(close(pr_auc(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0));
        // Curve (0,1) -> (0.5,1) -> (0.5,0.5) -> (1,2/3).
        let auc = pr_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]).unwrap();
        let expected = 0.5 * 1.0 + 0.5 * (0.5 + 2.0 / 3.0) / 2.0;
        assert!(close(auc, expected), "{auc} vs {expected}");
    }

    #[test]
    fn sweep_recall_is_non_increasing_in_threshold() {
        let y: Vec<u8> = (0..50).map(|i| (i % 3 != 0) as u8).collect();
        let p: Vec<f64> = (0..50).map(|i| ((i * 29) % 50) as f64 / 50.0).collect();
        let thresholds = [0.3, 0.35, 0.4, 0.45, 0.5, 0.55, 0.6];
        let sweep = threshold_sweep(&y, &p, &thresholds);
        assert_eq!(sweep.len(), thresholds.len());
        for w in sweep.windows(2) {
            assert!(w[1].recall <= w[0].recall);
        }
    }

    #[test]
    fn sweep_trades_recall_for_precision_on_separated_scores() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use rand_distr::{Beta, Distribution};

        let mut rng = StdRng::seed_from_u64(42);
        let high = Beta::new(5.0, 2.0).unwrap();
        let low = Beta::new(2.0, 5.0).unwrap();
        let mut y = Vec::new();
        let mut p = Vec::new();
        for _ in 0..2000 {
            y.push(1);
            p.push(high.sample(&mut rng));
            y.push(0);
            p.push(low.sample(&mut rng));
        }

        let sweep = threshold_sweep(&y, &p, &crate::eval::default_thresholds());
        assert_eq!(sweep.len(), 7);
        for w in sweep.windows(2) {
            assert!(w[1].recall <= w[0].recall, "recall rose at {}", w[1].threshold);
            assert!(w[1].precision >= w[0].precision, "precision fell at {}", w[1].threshold);
        }
        assert!(sweep[0].recall > sweep[6].recall);
        assert!(sweep[6].precision > sweep[0].precision);
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(threshold_labels(&[0.5, 0.49], 0.5), vec![1, 0]);
    }
}
