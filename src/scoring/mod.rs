//! Inference path: payload → features → scaler → VAE → reconstruction error → decision.

mod detector;
mod engine;
mod evaluate;

pub use detector::{Detector, HealthStatus};
pub use engine::{confidence, AnomalyScorer, ScoreResult};
pub use evaluate::{evaluate, ClassReport, ConfusionMatrix, ErrorSummary, EvaluationReport};
