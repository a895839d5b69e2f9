//! Unsupervised training on normal-only data and threshold calibration.

mod schedule;
mod threshold;
mod trainer;

pub use schedule::{EarlyStopping, EpochVerdict, ReduceLrOnPlateau};
pub use threshold::{percentile, ThresholdCalibrator};
pub use trainer::{EpochStats, StopReason, TrainedModel, Trainer, TrainingReport};
