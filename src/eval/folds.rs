//! Stratified k-fold assignment.
//!
//! Each class's indices are shuffled with one seeded RNG (class 0 first, then
//! class 1) and dealt round-robin over the folds. The deal continues where the
//! previous class stopped, so fold sizes stay balanced overall and each
//! class's count per fold differs by at most one between folds.

use log::warn;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::AppError;

/// One train/test partition. Indices refer to the input label slice and are ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    /// 0-based fold index.
    pub index: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

pub fn stratified_folds(labels: &[u8], k: usize, seed: u64) -> Result<Vec<Fold>, AppError> {
    let n = labels.len();
    if k < 2 {
        return Err(AppError::numeric(format!("Number of folds must be at least 2, got {k}.")));
    }
    if k > n {
        return Err(AppError::numeric(format!(
            "Cannot split {n} rows into {k} folds."
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0usize; n];
    let mut next = 0usize;

    for class in [0u8, 1u8] {
        let mut members: Vec<usize> = (0..n).filter(|&i| labels[i] == class).collect();
        if !members.is_empty() && members.len() < k {
            warn!(
                "class {class} has only {} member(s) for {k} folds; some folds will not contain it",
                members.len()
            );
        }
        members.shuffle(&mut rng);
        for i in members {
            assignment[i] = next % k;
            next += 1;
        }
    }

    Ok((0..k)
        .map(|f| {
            let (test, train): (Vec<usize>, Vec<usize>) = (0..n).partition(|&i| assignment[i] == f);
            Fold { index: f, train, test }
        })
        .collect())
}

/// Stratified hold-out split. Returns `(train, test)` row indices, both ascending.
///
/// Each class contributes `round(n_class * test_fraction)` shuffled members to
/// the test partition.
pub fn stratified_split(labels: &[u8], test_fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>), AppError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(AppError::input(format!(
            "Test fraction must be in (0, 1), got {test_fraction}."
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut in_test = vec![false; labels.len()];
    for class in [0u8, 1u8] {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        members.shuffle(&mut rng);
        let take = (members.len() as f64 * test_fraction).round() as usize;
        for &i in members.iter().take(take) {
            in_test[i] = true;
        }
    }

    let (test, train): (Vec<usize>, Vec<usize>) = (0..labels.len()).partition(|&i| in_test[i]);
    if train.is_empty() || test.is_empty() {
        return Err(AppError::empty(format!(
            "Hold-out split of {} rows left an empty partition.",
            labels.len()
        )));
    }
    Ok((train, test))
}
