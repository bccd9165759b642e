//! Robust feature scaling with persisted state.
//!
//! A `Scaler` starts unfitted. `fit` never mutates: it returns a new, fitted
//! scaler whose state is frozen from then on. `transform` refuses to run on an
//! unfitted scaler and refuses a feature list that differs from the fit-time
//! list, so the caller cannot silently scale with the wrong parameters.
//!
//! Scaling per feature `j`: `x' = (x - center[j]) / scale[j]`.
//!
//! - `robust`: center = median, scale = IQR (75th - 25th percentile)
//! - `standard`: center = mean, scale = population standard deviation
//!
//! A zero or non-finite scale becomes `1.0` (constant columns are only centered).
//! NaN inputs are ignored when fitting and pass through `transform` as NaN.

use std::path::Path;

use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::domain::ScalingMethod;
use crate::error::{AppError, ErrorKind};
use crate::io::artifact::{read_json, write_json};
use crate::math::{column, mean, median_iqr, std_dev};

/// Serializable scaler parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub method: ScalingMethod,
    pub feature_names: Vec<String>,
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
    pub is_fitted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    state: ScalerState,
}

impl Scaler {
    /// An empty, unfitted scaler.
    pub fn new(method: ScalingMethod) -> Self {
        Self {
            state: ScalerState {
                method,
                feature_names: Vec::new(),
                center: Vec::new(),
                scale: Vec::new(),
                is_fitted: false,
            },
        }
    }

    /// Rebuild a scaler from persisted state, validating its shape.
    pub fn from_state(state: ScalerState) -> Result<Self, AppError> {
        let n = state.feature_names.len();
        if state.is_fitted && (state.center.len() != n || state.scale.len() != n) {
            return Err(AppError::input(format!(
                "Scaler state is inconsistent: {n} features, {} centers, {} scales",
                state.center.len(),
                state.scale.len()
            )));
        }
        Ok(Self { state })
    }

    pub fn state(&self) -> &ScalerState {
        &self.state
    }

    pub fn method(&self) -> ScalingMethod {
        self.state.method
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_fitted
    }

    pub fn feature_names(&self) -> &[String] {
        &self.state.feature_names
    }

    /// Fit on `x` (rows = samples) and return a new fitted scaler.
    pub fn fit(&self, x: &DMatrix<f64>, feature_names: &[String]) -> Result<Scaler, AppError> {
        if feature_names.len() != x.ncols() {
            return Err(AppError::new(
                ErrorKind::FeatureMismatch,
                format!("{} feature names for a {}-column matrix", feature_names.len(), x.ncols()),
            ));
        }
        if x.nrows() == 0 {
            return Err(AppError::empty("Cannot fit a scaler on zero rows."));
        }

        let mut center = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());
        for j in 0..x.ncols() {
            let values = column(x, j);
            let (c, s) = match self.state.method {
                ScalingMethod::Robust => median_iqr(&values).unwrap_or((0.0, 1.0)),
                ScalingMethod::Standard => (
                    mean(&values).unwrap_or(0.0),
                    std_dev(&values, 0).unwrap_or(1.0),
                ),
            };
            center.push(c);
            scale.push(if s.is_finite() && s != 0.0 { s } else { 1.0 });
        }

        debug!(
            "fitted {} scaler on {} rows: center={center:?} scale={scale:?}",
            self.state.method.as_str(),
            x.nrows()
        );

        Ok(Scaler {
            state: ScalerState {
                method: self.state.method,
                feature_names: feature_names.to_vec(),
                center,
                scale,
                is_fitted: true,
            },
        })
    }

    /// Apply the fitted transform. Returns a new matrix.
    pub fn transform(&self, x: &DMatrix<f64>, feature_names: &[String]) -> Result<DMatrix<f64>, AppError> {
        self.check_ready(x, feature_names)?;
        let st = &self.state;
        Ok(DMatrix::from_fn(x.nrows(), x.ncols(), |r, c| {
            (x[(r, c)] - st.center[c]) / st.scale[c]
        }))
    }

    /// `fit` followed by `transform` on the same data.
    pub fn fit_transform(
        &self,
        x: &DMatrix<f64>,
        feature_names: &[String],
    ) -> Result<(Scaler, DMatrix<f64>), AppError> {
        let fitted = self.fit(x, feature_names)?;
        let scaled = fitted.transform(x, feature_names)?;
        Ok((fitted, scaled))
    }

    /// Undo the transform (for display/diagnostics only).
    pub fn inverse_transform(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, AppError> {
        self.check_ready(x, &self.state.feature_names)?;
        let st = &self.state;
        Ok(DMatrix::from_fn(x.nrows(), x.ncols(), |r, c| {
            x[(r, c)] * st.scale[c] + st.center[c]
        }))
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        write_json(path, &self.state)
    }

    pub fn load(path: &Path) -> Result<Scaler, AppError> {
        Scaler::from_state(read_json(path)?)
    }

    fn check_ready(&self, x: &DMatrix<f64>, feature_names: &[String]) -> Result<(), AppError> {
        if !self.state.is_fitted {
            return Err(AppError::new(
                ErrorKind::NotFitted,
                "Scaler must be fitted before transform.",
            ));
        }
        if feature_names != self.state.feature_names.as_slice() {
            return Err(AppError::new(
                ErrorKind::FeatureMismatch,
                format!(
                    "Feature order mismatch: fitted on {:?}, got {:?}",
                    self.state.feature_names, feature_names
                ),
            ));
        }
        if x.ncols() != self.state.feature_names.len() {
            return Err(AppError::new(
                ErrorKind::FeatureMismatch,
                format!(
                    "Matrix has {} columns but the scaler was fitted on {} features",
                    x.ncols(),
                    self.state.feature_names.len()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feature_names;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            5,
            2,
            &[
                1.0, 10.0, //
                2.0, 10.0, //
                3.0, 10.0, //
                4.0, 10.0, //
                100.0, 10.0,
            ],
        )
    }

    #[test]
    fn robust_fit_uses_median_and_iqr() {
        let x = sample();
        let fitted = Scaler::new(ScalingMethod::Robust).fit(&x, &names(&["a", "b"])).unwrap();
        let st = fitted.state();
        assert!(st.is_fitted);
        assert_eq!(st.center, vec![3.0, 10.0]);
        // IQR of [1,2,3,4,100] is 4 - 2; constant column falls back to 1.
        assert_eq!(st.scale, vec![2.0, 1.0]);
    }

    #[test]
    fn fit_returns_new_instance_and_leaves_original_unfitted() {
        let empty = Scaler::new(ScalingMethod::Robust);
        let fitted = empty.fit(&sample(), &names(&["a", "b"])).unwrap();
        assert!(!empty.is_fitted());
        assert!(fitted.is_fitted());
    }

    #[test]
    fn transform_before_fit_fails_fast() {
        let err = Scaler::new(ScalingMethod::Robust)
            .transform(&sample(), &names(&["a", "b"]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFitted);
    }

    #[test]
    fn feature_order_mismatch_fails_fast() {
        let fitted = Scaler::new(ScalingMethod::Robust).fit(&sample(), &names(&["a", "b"])).unwrap();
        let err = fitted.transform(&sample(), &names(&["b", "a"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureMismatch);
    }

    #[test]
    fn transform_and_inverse_round_trip() {
        let x = sample();
        let n = names(&["a", "b"]);
        let (fitted, scaled) = Scaler::new(ScalingMethod::Robust).fit_transform(&x, &n).unwrap();
        assert_eq!(scaled[(0, 0)], (1.0 - 3.0) / 2.0);
        let back = fitted.inverse_transform(&scaled).unwrap();
        for (a, b) in back.iter().zip(x.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn standard_method_uses_mean_and_population_std() {
        let x = DMatrix::from_row_slice(4, 1, &[2.0, 4.0, 4.0, 6.0]);
        let fitted = Scaler::new(ScalingMethod::Standard).fit(&x, &names(&["a"])).unwrap();
        assert_eq!(fitted.state().center, vec![4.0]);
        assert!((fitted.state().scale[0] - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn nan_passes_through_and_is_ignored_when_fitting() {
        let x = DMatrix::from_row_slice(4, 1, &[1.0, f64::NAN, 3.0, 5.0]);
        let (fitted, scaled) = Scaler::new(ScalingMethod::Robust).fit_transform(&x, &names(&["a"])).unwrap();
        assert_eq!(fitted.state().center, vec![3.0]);
        assert!(scaled[(1, 0)].is_nan());
    }

    #[test]
    fn save_load_reproduces_identical_transform() {
        let x = DMatrix::from_fn(40, 5, |r, c| ((r * 7 + c * 13) % 17) as f64 * 0.37 + 1e-3 * r as f64);
        let n = feature_names();
        let fitted = Scaler::new(ScalingMethod::Robust).fit(&x, &n).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        fitted.save(&path).unwrap();
        let loaded = Scaler::load(&path).unwrap();

        assert_eq!(loaded, fitted);
        let a = fitted.transform(&x, &n).unwrap();
        let b = loaded.transform(&x, &n).unwrap();
        for (u, v) in a.iter().zip(b.iter()) {
            assert_eq!(u.to_bits(), v.to_bits());
        }
    }

    #[test]
    fn inconsistent_persisted_state_is_rejected() {
        let state = ScalerState {
            method: ScalingMethod::Robust,
            feature_names: names(&["a", "b"]),
            center: vec![0.0],
            scale: vec![1.0, 1.0],
            is_fitted: true,
        };
        assert!(Scaler::from_state(state).is_err());
    }
}
