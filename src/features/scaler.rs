//! Per-column standardization, fitted once on the training corpus and reused as-is at inference.

use crate::error::{Result, SentinelError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Columns whose spread falls below this are divided by 1 instead.
pub const STD_FLOOR: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub mean: Vec<f64>,
    /// Never below [`STD_FLOOR`]; near-constant columns carry 1.0
    pub std: Vec<f64>,
}

impl ScalerState {
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Both vectors agree in length and every divisor is usable.
    pub fn is_consistent(&self) -> bool {
        self.mean.len() == self.std.len()
            && self.std.iter().all(|s| s.is_finite() && *s >= STD_FLOOR)
            && self.mean.iter().all(|m| m.is_finite())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    state: Option<ScalerState>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: ScalerState) -> Self {
        Self { state: Some(state) }
    }

    pub fn state(&self) -> Option<&ScalerState> {
        self.state.as_ref()
    }

    pub fn into_state(self) -> Option<ScalerState> {
        self.state
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Compute column mean and population std. Fitting twice is rejected.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if self.state.is_some() {
            return Err(SentinelError::AlreadyFitted("scaler"));
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(SentinelError::InsufficientData(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| SentinelError::InsufficientData("empty matrix".to_string()))?;
        let std = x.std_axis(Axis(0), 0.0).mapv(|s| if s < STD_FLOOR { 1.0 } else { s });
        self.state = Some(ScalerState {
            mean: mean.to_vec(),
            std: std.to_vec(),
        });
        Ok(())
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// `(x - mean) / std` row-wise.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let state = self.fitted()?;
        if x.ncols() != state.dim() {
            return Err(SentinelError::DimensionMismatch {
                expected: state.dim(),
                actual: x.ncols(),
            });
        }
        let mean = ArrayView1::from(&state.mean[..]);
        let std = ArrayView1::from(&state.std[..]);
        let mut out = x.to_owned();
        out -= &mean;
        out /= &std;
        Ok(out)
    }

    pub fn transform_vector(&self, v: &[f64]) -> Result<Array1<f64>> {
        let state = self.fitted()?;
        if v.len() != state.dim() {
            return Err(SentinelError::DimensionMismatch {
                expected: state.dim(),
                actual: v.len(),
            });
        }
        Ok(v
            .iter()
            .zip(state.mean.iter().zip(&state.std))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    fn fitted(&self) -> Result<&ScalerState> {
        self.state.as_ref().ok_or(SentinelError::NotFitted("scaler"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn transform_before_fit_fails() {
        let s = StandardScaler::new();
        assert!(matches!(
            s.transform(&array![[1.0, 2.0]]),
            Err(SentinelError::NotFitted(_))
        ));
        assert!(matches!(
            s.transform_vector(&[1.0]),
            Err(SentinelError::NotFitted(_))
        ));
    }

    #[test]
    fn fit_standardizes_columns() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [6.0, 0.0]];
        let mut s = StandardScaler::new();
        let t = s.fit_transform(&x).unwrap();
        for col in t.columns() {
            let m = col.mean().unwrap();
            let v = col.mapv(|c| (c - m).powi(2)).mean().unwrap();
            assert!(m.abs() < 1e-12);
            assert!((v - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_column_is_not_a_zero_divisor() {
        let x = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let mut s = StandardScaler::new();
        s.fit(&x).unwrap();
        assert_eq!(s.state().unwrap().std[0], 1.0);
        let v = s.transform_vector(&[7.0, 2.0]).unwrap();
        assert_eq!(v[0], 2.0);
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn refit_is_rejected() {
        let x = array![[1.0], [2.0]];
        let mut s = StandardScaler::new();
        s.fit(&x).unwrap();
        assert!(matches!(s.fit(&x), Err(SentinelError::AlreadyFitted(_))));
    }

    #[test]
    fn wrong_width_is_rejected() {
        let mut s = StandardScaler::new();
        s.fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert!(matches!(
            s.transform_vector(&[1.0, 2.0, 3.0]),
            Err(SentinelError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }
}
