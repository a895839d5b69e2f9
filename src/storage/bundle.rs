//! Checksummed JSON bundle. On disk:
//!
//! ```json
//! { "checksum": "<sha256 of the bundle text>", "bundle": { "format_version": 1, ... } }
//! ```
//!
//! The bundle is written to a sibling temp file and renamed into place, so readers
//! see either the previous bundle or the new one.

use crate::error::{Result, SentinelError};
use crate::features::{ScalerState, FEATURE_DIM, FEATURE_SCHEMA_VERSION};
use crate::model::Vae;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use std::path::Path;

pub const BUNDLE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub feature_schema: u32,
    pub input_dim: usize,
    pub vae: Vae,
    pub scaler: ScalerState,
    pub threshold: f64,
    pub trained_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    checksum: String,
    bundle: &'a RawValue,
}

#[derive(Deserialize)]
struct EnvelopeIn<'a> {
    checksum: String,
    #[serde(borrow)]
    bundle: &'a RawValue,
}

fn checksum(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

impl ModelBundle {
    pub fn new(vae: Vae, scaler: ScalerState, threshold: f64) -> Result<Self> {
        let bundle = Self {
            format_version: BUNDLE_FORMAT_VERSION,
            feature_schema: FEATURE_SCHEMA_VERSION,
            input_dim: vae.input_dim(),
            vae,
            scaler,
            threshold,
            trained_at: Utc::now(),
        };
        bundle.validate()?;
        Ok(bundle)
    }

    /// All four parts must describe the same `FEATURE_DIM`-wide schema.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(SentinelError::BundleMismatch(format!(
                "format version {} (expected {BUNDLE_FORMAT_VERSION})",
                self.format_version
            )));
        }
        if self.feature_schema != FEATURE_SCHEMA_VERSION {
            return Err(SentinelError::BundleMismatch(format!(
                "feature schema {} (expected {FEATURE_SCHEMA_VERSION})",
                self.feature_schema
            )));
        }
        if self.input_dim != FEATURE_DIM {
            return Err(SentinelError::BundleMismatch(format!(
                "input_dim {} (expected {FEATURE_DIM})",
                self.input_dim
            )));
        }
        if self.vae.input_dim() != self.input_dim || !self.vae.is_consistent() {
            return Err(SentinelError::BundleMismatch(format!(
                "vae layers do not match input_dim {}",
                self.input_dim
            )));
        }
        if self.scaler.dim() != self.input_dim || !self.scaler.is_consistent() {
            return Err(SentinelError::BundleMismatch(format!(
                "scaler has {} columns, expected {}",
                self.scaler.dim(),
                self.input_dim
            )));
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(SentinelError::BundleMismatch(format!(
                "threshold {} is not a non-negative number",
                self.threshold
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        self.validate()?;
        let body = serde_json::to_string(self)?;
        let raw = RawValue::from_string(body)?;
        let envelope = EnvelopeOut {
            checksum: checksum(raw.get()),
            bundle: &raw,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let envelope: EnvelopeIn<'_> = serde_json::from_str(text)?;
        let actual = checksum(envelope.bundle.get());
        if actual != envelope.checksum {
            return Err(SentinelError::ChecksumMismatch {
                expected: envelope.checksum,
                actual,
            });
        }
        let bundle: ModelBundle = serde_json::from_str(envelope.bundle.get())?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = self.to_json()?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, path)?;
        tracing::info!(path = %path.display(), threshold = self.threshold, "model bundle saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let bundle = Self::from_json(&text)?;
        tracing::info!(
            path = %path.display(),
            threshold = bundle.threshold,
            trained_at = %bundle.trained_at,
            "model bundle loaded"
        );
        Ok(bundle)
    }
}
