//! VAE objective and reconstruction error.

use super::vae::VaeOutput;
use ndarray::{Array1, Array2, Axis, Zip};

/// Batch-summed loss terms: `total = reconstruction + beta · kl`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossBreakdown {
    pub total: f64,
    pub reconstruction: f64,
    pub kl: f64,
}

impl LossBreakdown {
    pub fn per_sample(&self, batch: usize) -> LossBreakdown {
        let n = batch.max(1) as f64;
        LossBreakdown {
            total: self.total / n,
            reconstruction: self.reconstruction / n,
            kl: self.kl / n,
        }
    }
}

/// Closed-form `KL(N(mu, σ²) ‖ N(0, I))`: `-0.5 · Σ(1 + logvar - mu² - exp(logvar))`.
pub fn kl_divergence(mu: &Array2<f64>, logvar: &Array2<f64>) -> f64 {
    let mut acc = 0.0;
    Zip::from(mu)
        .and(logvar)
        .for_each(|&m, &lv| acc += 1.0 + lv - m * m - lv.exp());
    -0.5 * acc
}

pub fn vae_loss(x: &Array2<f64>, out: &VaeOutput, beta: f64) -> LossBreakdown {
    let reconstruction = (&out.reconstruction - x).mapv(|d| d * d).sum();
    let kl = kl_divergence(&out.mu, &out.logvar);
    LossBreakdown {
        total: reconstruction + beta * kl,
        reconstruction,
        kl,
    }
}

/// Gradients of `vae_loss(...).total · scale` w.r.t. `(reconstruction, mu, logvar)`.
pub fn vae_loss_grads(
    x: &Array2<f64>,
    out: &VaeOutput,
    beta: f64,
    scale: f64,
) -> (Array2<f64>, Array2<f64>, Array2<f64>) {
    let d_reconstruction = (&out.reconstruction - x) * (2.0 * scale);
    let d_mu = &out.mu * (beta * scale);
    let d_logvar = out.logvar.mapv(|lv| 0.5 * (lv.exp() - 1.0) * beta * scale);
    (d_reconstruction, d_mu, d_logvar)
}

/// Per-row mean squared difference between input and reconstruction.
pub fn reconstruction_errors(x: &Array2<f64>, reconstruction: &Array2<f64>) -> Array1<f64> {
    (reconstruction - x)
        .mapv(|d| d * d)
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(x.nrows()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn kl_is_zero_at_prior() {
        let mu = Array2::zeros((3, 4));
        let lv = Array2::zeros((3, 4));
        assert_eq!(kl_divergence(&mu, &lv), 0.0);
    }

    #[test]
    fn kl_is_positive_away_from_prior() {
        let mu = array![[1.0, -0.5]];
        let lv = array![[0.3, -1.0]];
        assert!(kl_divergence(&mu, &lv) > 0.0);
    }

    #[test]
    fn identical_reconstruction_has_zero_error() {
        let x = array![[1.0, -2.0, 3.5], [0.0, 0.0, 0.0]];
        let e = reconstruction_errors(&x, &x);
        assert!(e.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn reconstruction_error_is_mean_over_dims() {
        let x = array![[0.0, 0.0]];
        let r = array![[1.0, 3.0]];
        assert_eq!(reconstruction_errors(&x, &r)[0], 5.0);
    }

    #[test]
    fn loss_combines_terms_with_beta() {
        let x = array![[1.0, 1.0]];
        let out = VaeOutput {
            reconstruction: array![[0.0, 1.0]],
            mu: array![[1.0]],
            logvar: array![[0.0]],
        };
        let l = vae_loss(&x, &out, 0.3);
        assert_eq!(l.reconstruction, 1.0);
        assert!((l.kl - 0.5).abs() < 1e-12);
        assert!((l.total - 1.15).abs() < 1e-12);
    }
}
