//! Detector configuration: model shape, training schedule, calibration and scoring policy.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Where the trained model bundle is written and read
    pub model_path: PathBuf,
    /// VAE architecture
    pub model: ModelConfig,
    /// Optimizer, scheduler and early stopping
    pub training: TrainingConfig,
    /// Anomaly threshold calibration
    pub threshold: ThresholdConfig,
    /// Inference behavior
    pub scoring: ScoringConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Widths of the encoder blocks; the decoder mirrors them
    pub hidden_dims: Vec<usize>,
    pub latent_dim: usize,
    /// Weight of the KL term against reconstruction
    pub beta: f64,
    pub batch_norm_momentum: f64,
    pub batch_norm_eps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Multiplier applied to the learning rate on a loss plateau
    pub lr_decay_factor: f64,
    /// Epochs without improvement before the learning rate is reduced
    pub lr_patience: usize,
    pub min_learning_rate: f64,
    /// Epochs without improvement before training stops
    pub early_stopping_patience: usize,
    /// Minimum loss decrease that counts as an improvement
    pub min_delta: f64,
    /// Fixed seed for weight init, shuffling and sampling noise; entropy when unset
    pub seed: Option<u64>,
    /// Wall-clock guard, checked between epochs
    pub max_duration_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Percentile of normal reconstruction errors (0–100)
    pub percentile: f64,
    /// Standard deviations of the error distribution added on top of the percentile
    pub std_margin: f64,
}

/// What a detector reports when it cannot produce a real score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailPolicy {
    /// Treat as benign
    Open,
    /// Treat as malicious
    Closed,
}

impl FailPolicy {
    pub fn is_malicious(self) -> bool {
        matches!(self, FailPolicy::Closed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Decode from the latent mean instead of a sampled latent
    pub deterministic: bool,
    pub fail_policy: FailPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model/bundle.json"),
            model: ModelConfig::default(),
            training: TrainingConfig::default(),
            threshold: ThresholdConfig::default(),
            scoring: ScoringConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hidden_dims: vec![64, 32],
            latent_dim: 8,
            beta: 0.3,
            batch_norm_momentum: 0.1,
            batch_norm_eps: 1e-5,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 150,
            batch_size: 64,
            learning_rate: 1e-3,
            lr_decay_factor: 0.5,
            lr_patience: 10,
            min_learning_rate: 1e-6,
            early_stopping_patience: 20,
            min_delta: 1e-4,
            seed: None,
            max_duration_secs: None,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            percentile: 99.5,
            std_margin: 0.5,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            deterministic: true,
            fail_policy: FailPolicy::Open,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl DetectorConfig {
    /// Read from a JSON file. Missing file yields defaults; unreadable or invalid JSON is an error.
    pub fn try_load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Load from JSON file if present and valid; otherwise return default
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid config; using defaults");
                Self::default()
            }
        }
    }
}
