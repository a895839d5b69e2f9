//! Anomaly threshold from the reconstruction errors of normal-only data:
//! `percentile(errors, p) + margin · std(errors)`.

use crate::config::ThresholdConfig;
use crate::error::{Result, SentinelError};

#[derive(Debug, Clone)]
pub struct ThresholdCalibrator {
    percentile: f64,
    std_margin: f64,
}

impl ThresholdCalibrator {
    pub fn new(config: &ThresholdConfig) -> Self {
        Self {
            percentile: config.percentile.clamp(0.0, 100.0),
            std_margin: config.std_margin,
        }
    }

    pub fn calibrate(&self, errors: &[f64]) -> Result<f64> {
        if errors.is_empty() {
            return Err(SentinelError::InsufficientData(
                "no reconstruction errors to calibrate on".to_string(),
            ));
        }
        if errors.iter().any(|e| !e.is_finite()) {
            return Err(SentinelError::NumericInstability(
                "non-finite reconstruction error during calibration".to_string(),
            ));
        }
        let mut sorted = errors.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let std = (sorted.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n).sqrt();
        Ok(percentile(&sorted, self.percentile) + self.std_margin * std)
    }
}

/// Linear interpolation between closest ranks; `sorted` must be ascending and non-empty.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (len - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibrator(p: f64, margin: f64) -> ThresholdCalibrator {
        ThresholdCalibrator::new(&ThresholdConfig {
            percentile: p,
            std_margin: margin,
        })
    }

    #[test]
    fn percentile_interpolates() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&s, 0.0), 1.0);
        assert_eq!(percentile(&s, 50.0), 3.0);
        assert_eq!(percentile(&s, 100.0), 5.0);
        assert!((percentile(&s, 90.0) - 4.6).abs() < 1e-12);
    }

    #[test]
    fn threshold_adds_std_margin() {
        let errors = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let t = calibrator(100.0, 0.5).calibrate(&errors).unwrap();
        // max 9 + 0.5 · population std 2
        assert!((t - 10.0).abs() < 1e-12);
    }

    #[test]
    fn raising_percentile_never_lowers_threshold() {
        let errors: Vec<f64> = (0..200).map(|i| ((i * 37) % 101) as f64 / 7.0).collect();
        let mut last = f64::NEG_INFINITY;
        for p in [50.0, 75.0, 90.0, 95.0, 99.0, 99.5, 99.9, 100.0] {
            let t = calibrator(p, 0.5).calibrate(&errors).unwrap();
            assert!(t >= last);
            last = t;
        }
    }

    #[test]
    fn empty_errors_rejected() {
        assert!(matches!(
            calibrator(99.5, 0.5).calibrate(&[]),
            Err(SentinelError::InsufficientData(_))
        ));
    }
}
