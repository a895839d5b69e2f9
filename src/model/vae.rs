//! Variational autoencoder over standardized feature vectors.
//!
//! ```text
//! x ─ encoder blocks ─┬─ mu head ─────┐
//!                     └─ logvar head ─┴─ z = mu + exp(logvar/2)·ε ─ decoder blocks ─ output ─ x̂
//! ```
//!
//! Evaluation always uses batch-norm running statistics. Training goes through
//! [`Vae::forward_train`] / [`Vae::backward`], which keep the activations needed
//! for the gradient in a [`ForwardCache`].

use super::layers::{DenseBlock, DenseBlockCache, Linear, Parameter};
use crate::config::ModelConfig;
use ndarray::{Array2, Zip};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

/// Whether the latent is sampled or taken at its mean during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// z = mu
    Deterministic,
    /// z = mu + σ·ε with fresh ε per call
    Stochastic,
}

#[derive(Debug, Clone)]
pub struct VaeOutput {
    pub reconstruction: Array2<f64>,
    pub mu: Array2<f64>,
    pub logvar: Array2<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vae {
    input_dim: usize,
    latent_dim: usize,
    encoder: Vec<DenseBlock>,
    mu_head: Linear,
    logvar_head: Linear,
    decoder: Vec<DenseBlock>,
    output: Linear,
}

pub struct ForwardCache {
    encoder: Vec<DenseBlockCache>,
    hidden: Array2<f64>,
    noise: Array2<f64>,
    logvar: Array2<f64>,
    z: Array2<f64>,
    decoder: Vec<DenseBlockCache>,
    decoded: Array2<f64>,
}

impl Vae {
    pub fn new<R: Rng + ?Sized>(input_dim: usize, config: &ModelConfig, rng: &mut R) -> Self {
        let (momentum, eps) = (config.batch_norm_momentum, config.batch_norm_eps);

        let mut encoder = Vec::with_capacity(config.hidden_dims.len());
        let mut width = input_dim;
        for &h in &config.hidden_dims {
            encoder.push(DenseBlock::new(width, h, momentum, eps, rng));
            width = h;
        }
        let mu_head = Linear::new(width, config.latent_dim, rng);
        let logvar_head = Linear::new(width, config.latent_dim, rng);

        let mut decoder = Vec::with_capacity(config.hidden_dims.len());
        let mut width = config.latent_dim;
        for &h in config.hidden_dims.iter().rev() {
            decoder.push(DenseBlock::new(width, h, momentum, eps, rng));
            width = h;
        }
        let output = Linear::new(width, input_dim, rng);

        Self {
            input_dim,
            latent_dim: config.latent_dim,
            encoder,
            mu_head,
            logvar_head,
            decoder,
            output,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    /// Layer widths chain from `input_dim` back to `input_dim` through `latent_dim`.
    pub fn is_consistent(&self) -> bool {
        let mut width = self.input_dim;
        for b in &self.encoder {
            if b.in_dim() != width || b.norm.dim() != b.out_dim() {
                return false;
            }
            width = b.out_dim();
        }
        let heads_ok = self.mu_head.in_dim() == width
            && self.logvar_head.in_dim() == width
            && self.mu_head.out_dim() == self.latent_dim
            && self.logvar_head.out_dim() == self.latent_dim;
        if !heads_ok {
            return false;
        }
        let mut width = self.latent_dim;
        for b in &self.decoder {
            if b.in_dim() != width || b.norm.dim() != b.out_dim() {
                return false;
            }
            width = b.out_dim();
        }
        self.output.in_dim() == width && self.output.out_dim() == self.input_dim
    }

    /// Posterior parameters `(mu, logvar)`.
    pub fn encode(&self, x: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let h = self
            .encoder
            .iter()
            .fold(x.to_owned(), |h, block| block.forward_eval(&h));
        (self.mu_head.forward(&h), self.logvar_head.forward(&h))
    }

    pub fn decode(&self, z: &Array2<f64>) -> Array2<f64> {
        let h = self
            .decoder
            .iter()
            .fold(z.to_owned(), |h, block| block.forward_eval(&h));
        self.output.forward(&h)
    }

    /// `z = mu + exp(0.5·logvar)·ε`, ε ~ N(0, I). Returns `(z, ε)`.
    pub fn reparameterize<R: Rng + ?Sized>(
        mu: &Array2<f64>,
        logvar: &Array2<f64>,
        rng: &mut R,
    ) -> (Array2<f64>, Array2<f64>) {
        let noise = Array2::from_shape_fn(mu.raw_dim(), |_| -> f64 { StandardNormal.sample(rng) });
        let mut z = mu.to_owned();
        Zip::from(&mut z)
            .and(logvar)
            .and(&noise)
            .for_each(|z, &lv, &e| *z += (0.5 * lv).exp() * e);
        (z, noise)
    }

    /// Evaluation-mode pass with latent sampling.
    pub fn forward<R: Rng + ?Sized>(&self, x: &Array2<f64>, rng: &mut R) -> VaeOutput {
        let (mu, logvar) = self.encode(x);
        let (z, _) = Self::reparameterize(&mu, &logvar, rng);
        VaeOutput {
            reconstruction: self.decode(&z),
            mu,
            logvar,
        }
    }

    /// Evaluation-mode pass decoding the latent mean; same input, same output.
    pub fn forward_mean(&self, x: &Array2<f64>) -> VaeOutput {
        let (mu, logvar) = self.encode(x);
        VaeOutput {
            reconstruction: self.decode(&mu),
            mu,
            logvar,
        }
    }

    pub fn forward_with(&self, x: &Array2<f64>, sampling: Sampling) -> VaeOutput {
        match sampling {
            Sampling::Deterministic => self.forward_mean(x),
            Sampling::Stochastic => self.forward(x, &mut rand::thread_rng()),
        }
    }

    /// Training-mode pass: batch statistics, sampled latent, cached activations.
    pub fn forward_train<R: Rng + ?Sized>(
        &mut self,
        x: &Array2<f64>,
        rng: &mut R,
    ) -> (VaeOutput, ForwardCache) {
        let mut encoder_caches = Vec::with_capacity(self.encoder.len());
        let mut h = x.to_owned();
        for block in &mut self.encoder {
            let (out, cache) = block.forward_train(&h);
            encoder_caches.push(cache);
            h = out;
        }
        let mu = self.mu_head.forward(&h);
        let logvar = self.logvar_head.forward(&h);
        let (z, noise) = Self::reparameterize(&mu, &logvar, rng);

        let mut decoder_caches = Vec::with_capacity(self.decoder.len());
        let mut d = z.clone();
        for block in &mut self.decoder {
            let (out, cache) = block.forward_train(&d);
            decoder_caches.push(cache);
            d = out;
        }
        let reconstruction = self.output.forward(&d);

        let cache = ForwardCache {
            encoder: encoder_caches,
            hidden: h,
            noise,
            logvar: logvar.clone(),
            z,
            decoder: decoder_caches,
            decoded: d,
        };
        (
            VaeOutput {
                reconstruction,
                mu,
                logvar,
            },
            cache,
        )
    }

    /// Backpropagate loss gradients w.r.t. the reconstruction and the posterior
    /// parameters, accumulating into every parameter's `grad`.
    pub fn backward(
        &mut self,
        cache: &ForwardCache,
        d_reconstruction: &Array2<f64>,
        d_mu: &Array2<f64>,
        d_logvar: &Array2<f64>,
    ) {
        let mut d = self.output.backward(&cache.decoded, d_reconstruction);
        for (block, block_cache) in self.decoder.iter_mut().zip(&cache.decoder).rev() {
            d = block.backward(block_cache, &d);
        }
        debug_assert_eq!(d.raw_dim(), cache.z.raw_dim());
        let d_z = d;

        // dz/dmu = 1, dz/dlogvar = 0.5·exp(0.5·logvar)·ε
        let d_mu_total = &d_z + d_mu;
        let mut d_logvar_total = d_logvar.to_owned();
        Zip::from(&mut d_logvar_total)
            .and(&d_z)
            .and(&cache.logvar)
            .and(&cache.noise)
            .for_each(|g, &dz, &lv, &e| *g += dz * 0.5 * (0.5 * lv).exp() * e);

        let mut d_h = self.mu_head.backward(&cache.hidden, &d_mu_total);
        d_h += &self.logvar_head.backward(&cache.hidden, &d_logvar_total);
        for (block, block_cache) in self.encoder.iter_mut().zip(&cache.encoder).rev() {
            d_h = block.backward(block_cache, &d_h);
        }
    }

    pub fn visit_parameters(&mut self, f: &mut dyn FnMut(&mut Parameter)) {
        for b in &mut self.encoder {
            b.visit_parameters(f);
        }
        self.mu_head.visit_parameters(f);
        self.logvar_head.visit_parameters(f);
        for b in &mut self.decoder {
            b.visit_parameters(f);
        }
        self.output.visit_parameters(f);
    }

    pub fn zero_grad(&mut self) {
        self.visit_parameters(&mut |p| p.zero_grad());
    }

    pub fn parameter_count(&mut self) -> usize {
        let mut n = 0;
        self.visit_parameters(&mut |p| n += p.value.len());
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::loss::{vae_loss, vae_loss_grads};
    use rand::distributions::Uniform;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_model(seed: u64) -> Vae {
        let config = ModelConfig {
            hidden_dims: vec![6, 5],
            latent_dim: 3,
            beta: 0.3,
            ..Default::default()
        };
        Vae::new(4, &config, &mut StdRng::seed_from_u64(seed))
    }

    fn batch(seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let d = Uniform::new(-2.0, 2.0);
        Array2::from_shape_fn((8, 4), |_| rng.sample(d))
    }

    /// Same noise seed each call, so the sampled latent is a fixed function of the weights.
    fn loss_at(model: &Vae, x: &Array2<f64>) -> f64 {
        let (out, _) = model.clone().forward_train(x, &mut StdRng::seed_from_u64(99));
        vae_loss(x, &out, 0.3).total
    }

    fn flat_params(model: &mut Vae) -> Vec<f64> {
        let mut v = Vec::new();
        model.visit_parameters(&mut |p| v.extend(p.value.iter().copied()));
        v
    }

    fn flat_grads(model: &mut Vae) -> Vec<f64> {
        let mut v = Vec::new();
        model.visit_parameters(&mut |p| v.extend(p.grad.iter().copied()));
        v
    }

    fn nudge(model: &Vae, index: usize, delta: f64) -> Vae {
        let mut m = model.clone();
        let mut i = 0;
        m.visit_parameters(&mut |p| {
            for w in p.value.iter_mut() {
                if i == index {
                    *w += delta;
                }
                i += 1;
            }
        });
        m
    }

    #[test]
    fn backward_matches_finite_differences() {
        let mut model = small_model(11);
        let x = batch(12);

        model.zero_grad();
        let mut work = model.clone();
        let (out, cache) = work.forward_train(&x, &mut StdRng::seed_from_u64(99));
        let (dr, dm, dl) = vae_loss_grads(&x, &out, 0.3, 1.0);
        work.backward(&cache, &dr, &dm, &dl);
        let grads = flat_grads(&mut work);
        let count = flat_params(&mut model).len();
        assert_eq!(grads.len(), count);

        let h = 1e-6;
        let step = (count / 40).max(1);
        for idx in (0..count).step_by(step) {
            let num = (loss_at(&nudge(&model, idx, h), &x) - loss_at(&nudge(&model, idx, -h), &x))
                / (2.0 * h);
            let tol = 1e-4 * (1.0 + num.abs().max(grads[idx].abs()));
            assert!(
                (num - grads[idx]).abs() < tol,
                "param {idx}: numeric {num} analytic {}",
                grads[idx]
            );
        }
    }

    #[test]
    fn shapes_round_trip_through_latent() {
        let model = small_model(1);
        let x = batch(2);
        let out = model.forward_mean(&x);
        assert_eq!(out.reconstruction.dim(), (8, 4));
        assert_eq!(out.mu.dim(), (8, 3));
        assert_eq!(out.logvar.dim(), (8, 3));
        assert!(model.is_consistent());
    }

    #[test]
    fn mean_decoding_is_deterministic() {
        let model = small_model(5);
        let x = batch(6);
        let a = model.forward_with(&x, Sampling::Deterministic);
        let b = model.forward_with(&x, Sampling::Deterministic);
        assert_eq!(a.reconstruction, b.reconstruction);
    }

    #[test]
    fn sampling_draws_fresh_noise() {
        let mu = Array2::zeros((2, 3));
        let lv = Array2::zeros((2, 3));
        let mut rng = StdRng::seed_from_u64(8);
        let (z1, e1) = Vae::reparameterize(&mu, &lv, &mut rng);
        let (z2, _) = Vae::reparameterize(&mu, &lv, &mut rng);
        assert_eq!(z1, e1);
        assert_ne!(z1, z2);
    }

    #[test]
    fn serde_keeps_weights_and_running_stats() {
        let mut model = small_model(21);
        let x = batch(22);
        model.forward_train(&x, &mut StdRng::seed_from_u64(1));
        let json = serde_json::to_string(&model).unwrap();
        let restored: Vae = serde_json::from_str(&json).unwrap();
        assert_eq!(
            model.forward_mean(&x).reconstruction,
            restored.forward_mean(&x).reconstruction
        );
    }
}
