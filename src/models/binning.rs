//! Quantile binning for histogram split search.
//!
//! Each feature gets a sorted list of cut values `t[0] < t[1] < ...`. A value
//! `v` falls in bin `b = #{i : t[i] < v}`, so `bin(v) <= b` exactly when
//! `v <= t[b]`. Trees store the raw cut value, which keeps trained models
//! independent of the binning used during training.

use nalgebra::DMatrix;

/// Marker for a missing (NaN) value.
pub const MISSING_BIN: u16 = u16::MAX;

#[derive(Debug, Clone)]
pub struct BinMapper {
    cuts: Vec<Vec<f64>>,
}

impl BinMapper {
    /// Compute at most `max_bins - 1` cut values per feature of `x`.
    pub fn fit(x: &DMatrix<f64>, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, MISSING_BIN as usize - 1);
        let cuts = (0..x.ncols())
            .map(|j| {
                let mut values: Vec<f64> = x.column(j).iter().copied().filter(|v| !v.is_nan()).collect();
                values.sort_by(|a, b| a.total_cmp(b));
                feature_cuts(&values, max_bins)
            })
            .collect();
        Self { cuts }
    }

    pub fn cuts(&self, feature: usize) -> &[f64] {
        &self.cuts[feature]
    }

    /// Number of regular bins for `feature` (missing excluded).
    pub fn n_bins(&self, feature: usize) -> usize {
        self.cuts[feature].len() + 1
    }

    pub fn bin(&self, feature: usize, value: f64) -> u16 {
        if value.is_nan() {
            return MISSING_BIN;
        }
        self.cuts[feature].partition_point(|t| *t < value) as u16
    }

    /// Bin every value of `x`, column-major (`out[feature][row]`).
    pub fn transform(&self, x: &DMatrix<f64>) -> Vec<Vec<u16>> {
        (0..x.ncols())
            .map(|j| x.column(j).iter().map(|&v| self.bin(j, v)).collect())
            .collect()
    }
}

fn feature_cuts(sorted: &[f64], max_bins: usize) -> Vec<f64> {
    let mut unique: Vec<f64> = sorted.to_vec();
    unique.dedup();
    if unique.len() <= 1 {
        return Vec::new();
    }

    if unique.len() <= max_bins {
        // Midpoints between consecutive distinct values.
        return unique.windows(2).map(|w| w[0] + (w[1] - w[0]) / 2.0).collect();
    }

    let mut cuts: Vec<f64> = (1..max_bins)
        .map(|i| {
            let pos = (sorted.len() - 1) * i / max_bins;
            sorted[pos]
        })
        .collect();
    cuts.dedup();
    // A cut at the maximum would leave the right bin empty.
    if cuts.last().copied() == sorted.last().copied() {
        cuts.pop();
    }
    cuts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_feature_uses_midpoints() {
        let x = DMatrix::from_column_slice(4, 1, &[1.0, 3.0, 3.0, 5.0]);
        let m = BinMapper::fit(&x, 64);
        assert_eq!(m.cuts(0), &[2.0, 4.0]);
        assert_eq!(m.bin(0, 1.0), 0);
        assert_eq!(m.bin(0, 2.0), 0);
        assert_eq!(m.bin(0, 3.0), 1);
        assert_eq!(m.bin(0, 9.0), 2);
        assert_eq!(m.bin(0, f64::NAN), MISSING_BIN);
    }

    #[test]
    fn large_feature_is_capped() {
        let values: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let x = DMatrix::from_column_slice(1000, 1, &values);
        let m = BinMapper::fit(&x, 16);
        assert!(m.n_bins(0) <= 16);
        assert!(m.cuts(0).windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn constant_feature_has_single_bin() {
        let x = DMatrix::from_column_slice(3, 1, &[0.0, 0.0, 0.0]);
        let m = BinMapper::fit(&x, 64);
        assert_eq!(m.n_bins(0), 1);
    }
}
