//! Variational autoencoder: layers with explicit gradients, the model, its loss and optimizer.

mod layers;
mod loss;
mod optim;
mod vae;

pub use layers::{BatchNorm1d, DenseBlock, Linear, Parameter};
pub use loss::{kl_divergence, reconstruction_errors, vae_loss, vae_loss_grads, LossBreakdown};
pub use optim::Adam;
pub use vae::{ForwardCache, Sampling, Vae, VaeOutput};
