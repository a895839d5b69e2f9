//! Extraction pipeline: payload → behavioral stats → fixed-order vector.

use super::{BehavioralStats, EventLogPayload, FeatureVector, FEATURE_DIM};
use crate::error::{Result, SentinelError};
use ndarray::Array2;

/// Stateless; kept as a type so callers can hold one next to the scaler and model.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, payload: &EventLogPayload) -> Result<FeatureVector> {
        let stats = BehavioralStats::from_payload(payload)?;
        Ok(FeatureVector {
            values: stats.to_vector(),
        })
    }

    /// Raw request body, wrapped under `metadata` or flat.
    pub fn extract_value(&self, value: serde_json::Value) -> Result<FeatureVector> {
        self.extract(&EventLogPayload::from_value(value)?)
    }
}

/// Stack many payloads into a `[n, FEATURE_DIM]` matrix for training.
pub fn feature_matrix<'a, I>(payloads: I) -> Result<Array2<f64>>
where
    I: IntoIterator<Item = &'a EventLogPayload>,
{
    let extractor = FeatureExtractor::new();
    let mut flat = Vec::new();
    let mut rows = 0;
    for p in payloads {
        flat.extend(extractor.extract(p)?.values);
        rows += 1;
    }
    let actual = flat.len();
    Array2::from_shape_vec((rows, FEATURE_DIM), flat).map_err(|_| SentinelError::DimensionMismatch {
        expected: rows * FEATURE_DIM,
        actual,
    })
}
