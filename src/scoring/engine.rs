//! Compares reconstruction error of one payload with the bundle's calibrated threshold.

use crate::config::ScoringConfig;
use crate::error::Result;
use crate::features::{EventLogPayload, FeatureExtractor, FeatureVector, StandardScaler};
use crate::model::{reconstruction_errors, Sampling};
use crate::storage::ModelBundle;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Confidence reported when the threshold is zero and distance cannot be normalized.
const NEUTRAL_CONFIDENCE: f64 = 0.5;

/// Outcome for a single payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub is_malicious: bool,
    /// Relative distance from the decision boundary, in [0, 1]
    pub confidence: f64,
    pub reconstruction_error: f64,
    pub threshold: f64,
    /// Set when no real score could be produced; the decision then follows the fail policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScoreResult {
    /// `threshold` is the active bundle's, or 0 when none is loaded.
    pub fn failed(is_malicious: bool, threshold: f64, error: impl Into<String>) -> Self {
        Self {
            is_malicious,
            confidence: 0.0,
            reconstruction_error: 0.0,
            threshold,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// `min(|error - threshold| / threshold, 1)`, or 0.5 when the threshold is not positive.
pub fn confidence(error: f64, threshold: f64) -> f64 {
    if threshold > 0.0 {
        ((error - threshold).abs() / threshold).min(1.0)
    } else {
        NEUTRAL_CONFIDENCE
    }
}

/// Read-only scorer over a validated bundle; safe to share across threads.
pub struct AnomalyScorer {
    bundle: ModelBundle,
    scaler: StandardScaler,
    extractor: FeatureExtractor,
    sampling: Sampling,
}

impl AnomalyScorer {
    pub fn new(bundle: ModelBundle, config: &ScoringConfig) -> Result<Self> {
        bundle.validate()?;
        let scaler = StandardScaler::from_state(bundle.scaler.clone());
        let sampling = if config.deterministic {
            Sampling::Deterministic
        } else {
            Sampling::Stochastic
        };
        Ok(Self {
            bundle,
            scaler,
            extractor: FeatureExtractor::new(),
            sampling,
        })
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn threshold(&self) -> f64 {
        self.bundle.threshold
    }

    pub fn score_payload(&self, payload: &EventLogPayload) -> Result<ScoreResult> {
        let features = self.extractor.extract(payload)?;
        self.score_features(&features)
    }

    pub fn score_features(&self, features: &FeatureVector) -> Result<ScoreResult> {
        let error = self.reconstruction_error(features)?;
        let threshold = self.bundle.threshold;
        let result = ScoreResult {
            is_malicious: error > threshold,
            confidence: confidence(error, threshold),
            reconstruction_error: error,
            threshold,
            error: None,
        };
        tracing::debug!(
            reconstruction_error = error,
            threshold,
            is_malicious = result.is_malicious,
            "payload scored"
        );
        Ok(result)
    }

    /// Mean squared error over feature dimensions in standardized space.
    pub fn reconstruction_error(&self, features: &FeatureVector) -> Result<f64> {
        let scaled = self.scaler.transform_vector(features.as_slice())?;
        let x = scaled.insert_axis(ndarray::Axis(0));
        let out = self.bundle.vae.forward_with(&x, self.sampling);
        Ok(reconstruction_errors(&x, &out.reconstruction)[0])
    }

    /// Many feature vectors at once (e.g. evaluation sets).
    pub fn score_batch(&self, features: &Array2<f64>) -> Result<Vec<ScoreResult>> {
        let x = self.scaler.transform(features)?;
        let out = self.bundle.vae.forward_with(&x, self.sampling);
        let threshold = self.bundle.threshold;
        Ok(reconstruction_errors(&x, &out.reconstruction)
            .iter()
            .map(|&error| ScoreResult {
                is_malicious: error > threshold,
                confidence: confidence(error, threshold),
                reconstruction_error: error,
                threshold,
                error: None,
            })
            .collect())
    }
}
