//! UBA Sentinel — behavioral anomaly scoring for user-interaction event logs.
//!
//! Modular structure:
//! - [`features`] — Payload schema, fixed-slot feature extraction, standard scaler
//! - [`model`] — Variational autoencoder with explicit backprop and Adam
//! - [`training`] — Normal-only training loop, LR plateau decay, early stopping, threshold calibration
//! - [`storage`] — Checksummed model bundle persistence
//! - [`scoring`] — Reconstruction-error scoring, the serving-side detector handle, labeled evaluation
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod scoring;
pub mod storage;
pub mod training;

pub use config::{DetectorConfig, FailPolicy};
pub use error::{Result, SentinelError};
pub use features::{EventLogPayload, FeatureExtractor, FeatureVector, StandardScaler, FEATURE_DIM};
pub use logging::StructuredLogger;
pub use model::Vae;
pub use scoring::{AnomalyScorer, Detector, EvaluationReport, HealthStatus, ScoreResult};
pub use storage::ModelBundle;
pub use training::{Trainer, TrainingReport};
