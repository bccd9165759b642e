//! Small descriptive-statistics helpers.
//!
//! All functions ignore NaN inputs and return `None` when nothing finite is left,
//! so callers decide how to treat an all-missing column.

/// Linear-interpolated quantile, `q ∈ [0, 1]`.
///
/// Uses the `(n - 1) * q` position rule, so `quantile(v, 0.5)` is the usual median.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    if v.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    Some(quantile_sorted(&v, q))
}

/// Quantile over an already sorted, NaN-free slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Median and interquartile range in one sort.
pub fn median_iqr(values: &[f64]) -> Option<(f64, f64)> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    let iqr = quantile_sorted(&v, 0.75) - quantile_sorted(&v, 0.25);
    Some((quantile_sorted(&v, 0.5), iqr))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|x| !x.is_nan())
        .fold((0.0, 0usize), |(s, n), &x| (s + x, n + 1));
    if n == 0 { None } else { Some(sum / n as f64) }
}

/// Standard deviation with `ddof` delta degrees of freedom (0 = population, 1 = sample).
///
/// Returns `Some(0.0)` when there are not more than `ddof` values.
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    let m = mean(values)?;
    let finite: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    if finite.len() <= ddof {
        return Some(0.0);
    }
    let ss: f64 = finite.iter().map(|x| (x - m) * (x - m)).sum();
    Some((ss / (finite.len() - ddof) as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantiles_interpolate_linearly() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&v, 0.25).unwrap() - 1.75).abs() < 1e-12);
        assert!((median(&v).unwrap() - 2.5).abs() < 1e-12);
        assert!((quantile(&v, 0.75).unwrap() - 3.25).abs() < 1e-12);
    }

    #[test]
    fn nan_is_ignored() {
        let v = [f64::NAN, 5.0, 1.0, 3.0];
        let (med, iqr) = median_iqr(&v).unwrap();
        assert!((med - 3.0).abs() < 1e-12);
        assert!((iqr - 2.0).abs() < 1e-12);
        assert!(median(&[f64::NAN]).is_none());
    }

    #[test]
    fn sample_and_population_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&v, 0).unwrap() - 2.0).abs() < 1e-12);
        assert!((std_dev(&v, 1).unwrap() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(std_dev(&[3.0], 1), Some(0.0));
    }
}
