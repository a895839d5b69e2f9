//! Training loop: fit scaler, optimize the VAE on normal-only data, calibrate the threshold.

use super::schedule::{EarlyStopping, EpochVerdict, ReduceLrOnPlateau};
use super::threshold::ThresholdCalibrator;
use crate::config::{DetectorConfig, ModelConfig, ThresholdConfig, TrainingConfig};
use crate::error::{Result, SentinelError};
use crate::features::{feature_matrix, EventLogPayload, StandardScaler, FEATURE_DIM};
use crate::model::{reconstruction_errors, vae_loss, vae_loss_grads, Adam, Vae};
use crate::storage::ModelBundle;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    /// Per-sample averages over the epoch
    pub loss: f64,
    pub reconstruction: f64,
    pub kl: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    EarlyStopped,
    Interrupted,
    TimeLimit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub epochs_run: usize,
    /// None when no epoch completed
    pub best_epoch: Option<usize>,
    pub best_loss: Option<f64>,
    pub final_learning_rate: f64,
    pub stop_reason: StopReason,
    pub threshold: f64,
    pub history: Vec<EpochStats>,
}

#[derive(Debug)]
pub struct TrainedModel {
    pub bundle: ModelBundle,
    pub report: TrainingReport,
}

pub struct Trainer {
    model: ModelConfig,
    training: TrainingConfig,
    threshold: ThresholdConfig,
    stop: Option<Arc<AtomicBool>>,
}

impl Trainer {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            model: config.model.clone(),
            training: config.training.clone(),
            threshold: config.threshold.clone(),
            stop: None,
        }
    }

    /// Cooperative cancellation, checked between epochs. Training that stops this
    /// way still restores the best weights and calibrates.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn train_payloads(&self, payloads: &[EventLogPayload]) -> Result<TrainedModel> {
        self.train(&feature_matrix(payloads)?)
    }

    /// `normal` must hold benign samples only; rows are samples in feature-slot order.
    pub fn train(&self, normal: &Array2<f64>) -> Result<TrainedModel> {
        if normal.ncols() != FEATURE_DIM {
            return Err(SentinelError::DimensionMismatch {
                expected: FEATURE_DIM,
                actual: normal.ncols(),
            });
        }
        if normal.nrows() < 2 {
            return Err(SentinelError::InsufficientData(format!(
                "need at least 2 normal samples, got {}",
                normal.nrows()
            )));
        }
        if normal.iter().any(|v| !v.is_finite()) {
            return Err(SentinelError::MalformedInput(
                "training matrix contains non-finite values".to_string(),
            ));
        }

        let cfg = &self.training;
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut scaler = StandardScaler::new();
        let x = scaler.fit_transform(normal)?;
        let mut model = Vae::new(FEATURE_DIM, &self.model, &mut rng);
        let mut optimizer = Adam::new(cfg.learning_rate);
        let mut plateau = ReduceLrOnPlateau::new(
            cfg.lr_decay_factor,
            cfg.lr_patience,
            cfg.min_learning_rate,
            cfg.min_delta,
        );
        let mut early = EarlyStopping::new(cfg.early_stopping_patience, cfg.min_delta);
        let batch_size = cfg.batch_size.max(2);
        let deadline = cfg.max_duration_secs.map(Duration::from_secs);
        let started = Instant::now();

        info!(
            samples = x.nrows(),
            dims = x.ncols(),
            epochs = cfg.epochs,
            batch_size,
            params = model.parameter_count(),
            "training started"
        );

        let mut indices: Vec<usize> = (0..x.nrows()).collect();
        let mut history = Vec::with_capacity(cfg.epochs);
        let mut best_model: Option<Vae> = None;
        let mut stop_reason = StopReason::Completed;

        for epoch in 0..cfg.epochs {
            if self.stop.as_ref().is_some_and(|f| f.load(Ordering::Relaxed)) {
                stop_reason = StopReason::Interrupted;
                break;
            }
            if deadline.is_some_and(|d| started.elapsed() >= d) {
                stop_reason = StopReason::TimeLimit;
                break;
            }

            indices.shuffle(&mut rng);
            let lr = optimizer.learning_rate();
            let (mut total, mut recon, mut kl, mut seen) = (0.0, 0.0, 0.0, 0usize);
            for chunk in indices.chunks(batch_size) {
                // batch norm needs at least two rows
                if chunk.len() < 2 {
                    continue;
                }
                let batch = x.select(Axis(0), chunk);
                model.zero_grad();
                let (out, cache) = model.forward_train(&batch, &mut rng);
                let loss = vae_loss(&batch, &out, self.model.beta);
                if !loss.total.is_finite() {
                    return Err(SentinelError::NumericInstability(format!(
                        "non-finite loss at epoch {epoch}"
                    )));
                }
                let scale = 1.0 / chunk.len() as f64;
                let (d_recon, d_mu, d_logvar) = vae_loss_grads(&batch, &out, self.model.beta, scale);
                model.backward(&cache, &d_recon, &d_mu, &d_logvar);
                optimizer.step(&mut model);

                total += loss.total;
                recon += loss.reconstruction;
                kl += loss.kl;
                seen += chunk.len();
            }

            let n = seen.max(1) as f64;
            let stats = EpochStats {
                epoch,
                loss: total / n,
                reconstruction: recon / n,
                kl: kl / n,
                learning_rate: lr,
            };
            debug!(
                epoch,
                loss = stats.loss,
                reconstruction = stats.reconstruction,
                kl = stats.kl,
                lr,
                "epoch complete"
            );

            let next_lr = plateau.step(stats.loss, lr);
            if next_lr < lr {
                info!(epoch, from = lr, to = next_lr, "learning rate reduced");
                optimizer.set_learning_rate(next_lr);
            }

            let verdict = early.step(epoch, stats.loss);
            history.push(stats);
            match verdict {
                EpochVerdict::Improved => best_model = Some(model.clone()),
                EpochVerdict::NoImprovement => {}
                EpochVerdict::Stop => {
                    info!(
                        epoch,
                        best_epoch = early.best_epoch(),
                        best_loss = early.best_loss(),
                        "early stopping"
                    );
                    stop_reason = StopReason::EarlyStopped;
                    break;
                }
            }
        }

        let model = best_model.unwrap_or(model);
        let reconstruction = model.forward_mean(&x).reconstruction;
        let errors = reconstruction_errors(&x, &reconstruction).to_vec();
        let threshold = ThresholdCalibrator::new(&self.threshold).calibrate(&errors)?;

        let scaler_state = scaler
            .into_state()
            .ok_or(SentinelError::NotFitted("scaler"))?;
        let bundle = ModelBundle::new(model, scaler_state, threshold)?;

        let ran = !history.is_empty();
        let report = TrainingReport {
            samples: x.nrows(),
            epochs_run: history.len(),
            best_epoch: ran.then(|| early.best_epoch()),
            best_loss: ran.then(|| early.best_loss()),
            final_learning_rate: optimizer.learning_rate(),
            stop_reason,
            threshold,
            history,
        };
        info!(
            epochs_run = report.epochs_run,
            best_loss = ?report.best_loss,
            threshold,
            stop_reason = ?report.stop_reason,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "training finished"
        );
        Ok(TrainedModel { bundle, report })
    }
}
