//! Serving handle: holds at most one scorer, swaps it atomically on reload and never
//! lets a scoring failure escape as an error.
//!
//! Fail policy: whatever `ScoringConfig::fail_policy` says applies to every
//! non-scorable call on this detector (no bundle loaded, malformed payload, scaler
//! mismatch). The default is `Open`: benign, confidence 0, with `error` set.

use super::engine::{AnomalyScorer, ScoreResult};
use crate::config::{FailPolicy, ScoringConfig};
use crate::error::{Result, SentinelError};
use crate::features::EventLogPayload;
use crate::storage::ModelBundle;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Readiness report for the serving layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_dim: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

pub struct Detector {
    scorer: RwLock<Option<Arc<AnomalyScorer>>>,
    config: ScoringConfig,
}

impl Detector {
    /// Not ready until a bundle is installed; every score follows the fail policy.
    pub fn unloaded(config: ScoringConfig) -> Self {
        Self {
            scorer: RwLock::new(None),
            config,
        }
    }

    pub fn from_bundle(bundle: ModelBundle, config: ScoringConfig) -> Result<Self> {
        let scorer = AnomalyScorer::new(bundle, &config)?;
        Ok(Self {
            scorer: RwLock::new(Some(Arc::new(scorer))),
            config,
        })
    }

    /// Explicit initialization from a persisted bundle.
    pub fn load(path: &Path, config: ScoringConfig) -> Result<Self> {
        Self::from_bundle(ModelBundle::load(path)?, config)
    }

    /// Replace the active bundle. In-flight calls finish on the scorer they started with.
    pub fn install(&self, bundle: ModelBundle) -> Result<()> {
        let scorer = Arc::new(AnomalyScorer::new(bundle, &self.config)?);
        *self.scorer.write() = Some(scorer);
        Ok(())
    }

    /// Load and install; on failure the previous bundle stays active.
    pub fn reload(&self, path: &Path) -> Result<()> {
        self.install(ModelBundle::load(path)?)
    }

    pub fn is_ready(&self) -> bool {
        self.scorer.read().is_some()
    }

    pub fn fail_policy(&self) -> FailPolicy {
        self.config.fail_policy
    }

    pub fn scorer(&self) -> Option<Arc<AnomalyScorer>> {
        self.scorer.read().clone()
    }

    pub fn health(&self) -> HealthStatus {
        match self.scorer() {
            Some(s) => HealthStatus {
                status: "healthy".to_string(),
                model_loaded: true,
                input_dim: Some(s.bundle().input_dim),
                threshold: Some(s.threshold()),
            },
            None => HealthStatus {
                status: "not_ready".to_string(),
                model_loaded: false,
                input_dim: None,
                threshold: None,
            },
        }
    }

    /// Raw request body, `{metadata: {...}}` or flat.
    pub fn score(&self, payload: &serde_json::Value) -> ScoreResult {
        match EventLogPayload::from_value(payload.clone()) {
            Ok(p) => self.score_payload(&p),
            Err(e) => self.fail(e),
        }
    }

    pub fn score_payload(&self, payload: &EventLogPayload) -> ScoreResult {
        self.try_score_payload(payload)
            .unwrap_or_else(|e| self.fail(e))
    }

    /// Same as [`Detector::score_payload`] but surfaces the error to the caller.
    pub fn try_score_payload(&self, payload: &EventLogPayload) -> Result<ScoreResult> {
        let scorer = self.scorer().ok_or(SentinelError::ModelNotLoaded)?;
        scorer.score_payload(payload)
    }

    /// Result for a call that could not be scored, decided by the fail policy.
    pub fn fail(&self, err: SentinelError) -> ScoreResult {
        let policy = self.config.fail_policy;
        let threshold = self.scorer().map_or(0.0, |s| s.threshold());
        warn!(error = %err, policy = ?policy, "scoring failed; applying fail policy");
        ScoreResult::failed(policy.is_malicious(), threshold, err.to_string())
    }
}
