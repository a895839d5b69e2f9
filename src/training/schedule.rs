//! Plateau-driven learning-rate decay and early stopping, both fed one average loss per epoch.

/// Multiplies the learning rate by `factor` once the loss has not improved for
/// more than `patience` epochs, never going below `min_lr`.
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    factor: f64,
    patience: usize,
    min_lr: f64,
    min_delta: f64,
    best: f64,
    bad_epochs: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(factor: f64, patience: usize, min_lr: f64, min_delta: f64) -> Self {
        Self {
            factor,
            patience,
            min_lr,
            min_delta,
            best: f64::INFINITY,
            bad_epochs: 0,
        }
    }

    /// Returns the learning rate to use for the next epoch.
    pub fn step(&mut self, loss: f64, lr: f64) -> f64 {
        if loss < self.best - self.min_delta {
            self.best = loss;
            self.bad_epochs = 0;
            return lr;
        }
        self.bad_epochs += 1;
        if self.bad_epochs > self.patience {
            self.bad_epochs = 0;
            return (lr * self.factor).max(self.min_lr);
        }
        lr
    }
}

/// Tracks the best loss and signals a stop after `patience` epochs without improvement.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    best: f64,
    best_epoch: usize,
    bad_epochs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochVerdict {
    Improved,
    NoImprovement,
    Stop,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        Self {
            patience,
            min_delta,
            best: f64::INFINITY,
            best_epoch: 0,
            bad_epochs: 0,
        }
    }

    pub fn best_loss(&self) -> f64 {
        self.best
    }

    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }

    pub fn step(&mut self, epoch: usize, loss: f64) -> EpochVerdict {
        if loss < self.best - self.min_delta {
            self.best = loss;
            self.best_epoch = epoch;
            self.bad_epochs = 0;
            return EpochVerdict::Improved;
        }
        self.bad_epochs += 1;
        if self.bad_epochs >= self.patience {
            EpochVerdict::Stop
        } else {
            EpochVerdict::NoImprovement
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lr_drops_after_patience_exceeded() {
        let mut s = ReduceLrOnPlateau::new(0.5, 2, 1e-4, 0.0);
        let mut lr = 1e-2;
        lr = s.step(1.0, lr);
        assert_eq!(lr, 1e-2);
        for _ in 0..2 {
            lr = s.step(1.0, lr);
            assert_eq!(lr, 1e-2);
        }
        lr = s.step(1.0, lr);
        assert_eq!(lr, 5e-3);
        // improvement resets the counter
        lr = s.step(0.5, lr);
        assert_eq!(lr, 5e-3);
    }

    #[test]
    fn lr_never_below_floor() {
        let mut s = ReduceLrOnPlateau::new(0.1, 0, 1e-3, 0.0);
        let mut lr = 2e-3;
        s.step(1.0, lr);
        for _ in 0..5 {
            lr = s.step(1.0, lr);
        }
        assert_eq!(lr, 1e-3);
    }

    #[test]
    fn early_stop_after_patience() {
        let mut e = EarlyStopping::new(3, 1e-3);
        assert_eq!(e.step(0, 1.0), EpochVerdict::Improved);
        assert_eq!(e.step(1, 0.5), EpochVerdict::Improved);
        assert_eq!(e.step(2, 0.4995), EpochVerdict::NoImprovement);
        assert_eq!(e.step(3, 0.6), EpochVerdict::NoImprovement);
        assert_eq!(e.step(4, 0.7), EpochVerdict::Stop);
        assert_eq!(e.best_loss(), 0.5);
        assert_eq!(e.best_epoch(), 1);
    }
}
