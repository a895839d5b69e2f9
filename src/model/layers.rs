//! Dense building blocks with explicit backward passes. Activations are row-major
//! batches: `[batch, features]`.

use ndarray::{Array1, Array2, Axis, Zip};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Trainable tensor with its gradient and Adam moments. Only `value` is persisted;
/// the rest is rebuilt on the first `zero_grad`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub value: Array2<f64>,
    #[serde(skip)]
    pub grad: Array2<f64>,
    #[serde(skip)]
    pub(crate) first_moment: Array2<f64>,
    #[serde(skip)]
    pub(crate) second_moment: Array2<f64>,
}

impl Parameter {
    pub fn new(value: Array2<f64>) -> Self {
        let zeros = Array2::zeros(value.raw_dim());
        Self {
            grad: zeros.clone(),
            first_moment: zeros.clone(),
            second_moment: zeros,
            value,
        }
    }

    pub fn zero_grad(&mut self) {
        if self.grad.raw_dim() == self.value.raw_dim() {
            self.grad.fill(0.0);
        } else {
            self.grad = Array2::zeros(self.value.raw_dim());
        }
    }

    pub(crate) fn ensure_moments(&mut self) {
        if self.first_moment.raw_dim() != self.value.raw_dim() {
            self.first_moment = Array2::zeros(self.value.raw_dim());
            self.second_moment = Array2::zeros(self.value.raw_dim());
        }
    }
}

/// `y = x·W + b`, `W` is `[in, out]`, `b` is `[1, out]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linear {
    pub weight: Parameter,
    pub bias: Parameter,
}

impl Linear {
    /// Uniform(-1/√in, 1/√in) for weights and bias.
    pub fn new<R: Rng + ?Sized>(in_dim: usize, out_dim: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (in_dim.max(1) as f64).sqrt();
        let dist = Uniform::new_inclusive(-bound, bound);
        let weight = Array2::from_shape_fn((in_dim, out_dim), |_| dist.sample(rng));
        let bias = Array2::from_shape_fn((1, out_dim), |_| dist.sample(rng));
        Self {
            weight: Parameter::new(weight),
            bias: Parameter::new(bias),
        }
    }

    pub fn in_dim(&self) -> usize {
        self.weight.value.nrows()
    }

    pub fn out_dim(&self) -> usize {
        self.weight.value.ncols()
    }

    pub fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut y = x.dot(&self.weight.value);
        y += &self.bias.value;
        y
    }

    /// Accumulates parameter gradients and returns dL/dx.
    pub fn backward(&mut self, x: &Array2<f64>, dy: &Array2<f64>) -> Array2<f64> {
        self.weight.grad += &x.t().dot(dy);
        self.bias.grad += &dy.sum_axis(Axis(0)).insert_axis(Axis(0));
        dy.dot(&self.weight.value.t())
    }

    pub fn visit_parameters(&mut self, f: &mut dyn FnMut(&mut Parameter)) {
        f(&mut self.weight);
        f(&mut self.bias);
    }
}

/// Batch normalization over the feature axis with running statistics for evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchNorm1d {
    pub gamma: Parameter,
    pub beta: Parameter,
    pub running_mean: Array1<f64>,
    pub running_var: Array1<f64>,
    momentum: f64,
    eps: f64,
}

#[derive(Debug, Clone)]
pub struct BatchNormCache {
    x_hat: Array2<f64>,
    inv_std: Array1<f64>,
}

impl BatchNorm1d {
    pub fn new(dim: usize, momentum: f64, eps: f64) -> Self {
        Self {
            gamma: Parameter::new(Array2::ones((1, dim))),
            beta: Parameter::new(Array2::zeros((1, dim))),
            running_mean: Array1::zeros(dim),
            running_var: Array1::ones(dim),
            momentum,
            eps,
        }
    }

    pub fn dim(&self) -> usize {
        self.running_mean.len()
    }

    /// Normalizes with batch statistics and folds them into the running estimates.
    /// The batch must have at least two rows.
    pub fn forward_train(&mut self, x: &Array2<f64>) -> (Array2<f64>, BatchNormCache) {
        let n = x.nrows() as f64;
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        let mut centered = x.to_owned();
        centered -= &mean;
        let var = centered.mapv(|v| v * v).sum_axis(Axis(0)) / n;
        let inv_std = var.mapv(|v| 1.0 / (v + self.eps).sqrt());

        let unbiased = if n > 1.0 { &var * (n / (n - 1.0)) } else { var.clone() };
        let m = self.momentum;
        self.running_mean = &self.running_mean * (1.0 - m) + &mean * m;
        self.running_var = &self.running_var * (1.0 - m) + &unbiased * m;

        let mut x_hat = centered;
        x_hat *= &inv_std;
        let mut y = x_hat.clone();
        y *= &self.gamma.value;
        y += &self.beta.value;
        (y, BatchNormCache { x_hat, inv_std })
    }

    pub fn forward_eval(&self, x: &Array2<f64>) -> Array2<f64> {
        let inv_std = self.running_var.mapv(|v| 1.0 / (v + self.eps).sqrt());
        let mut y = x.to_owned();
        y -= &self.running_mean;
        y *= &inv_std;
        y *= &self.gamma.value;
        y += &self.beta.value;
        y
    }

    pub fn backward(&mut self, cache: &BatchNormCache, dy: &Array2<f64>) -> Array2<f64> {
        let n = dy.nrows() as f64;
        self.gamma.grad += &(dy * &cache.x_hat).sum_axis(Axis(0)).insert_axis(Axis(0));
        self.beta.grad += &dy.sum_axis(Axis(0)).insert_axis(Axis(0));

        let mut dx_hat = dy.to_owned();
        dx_hat *= &self.gamma.value;
        let sum_dx_hat = dx_hat.sum_axis(Axis(0));
        let sum_dx_hat_x_hat = (&dx_hat * &cache.x_hat).sum_axis(Axis(0));

        let mut correction = cache.x_hat.clone();
        correction *= &sum_dx_hat_x_hat;
        let mut dx = dx_hat * n;
        dx -= &sum_dx_hat;
        dx -= &correction;
        dx *= &cache.inv_std;
        dx / n
    }

    pub fn visit_parameters(&mut self, f: &mut dyn FnMut(&mut Parameter)) {
        f(&mut self.gamma);
        f(&mut self.beta);
    }
}

/// Linear → BatchNorm → ReLU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseBlock {
    pub linear: Linear,
    pub norm: BatchNorm1d,
}

#[derive(Debug, Clone)]
pub struct DenseBlockCache {
    input: Array2<f64>,
    norm: BatchNormCache,
    normalized: Array2<f64>,
}

impl DenseBlock {
    pub fn new<R: Rng + ?Sized>(
        in_dim: usize,
        out_dim: usize,
        momentum: f64,
        eps: f64,
        rng: &mut R,
    ) -> Self {
        Self {
            linear: Linear::new(in_dim, out_dim, rng),
            norm: BatchNorm1d::new(out_dim, momentum, eps),
        }
    }

    pub fn in_dim(&self) -> usize {
        self.linear.in_dim()
    }

    pub fn out_dim(&self) -> usize {
        self.linear.out_dim()
    }

    pub fn forward_train(&mut self, x: &Array2<f64>) -> (Array2<f64>, DenseBlockCache) {
        let h = self.linear.forward(x);
        let (normalized, norm) = self.norm.forward_train(&h);
        let out = relu(&normalized);
        (
            out,
            DenseBlockCache {
                input: x.clone(),
                norm,
                normalized,
            },
        )
    }

    pub fn forward_eval(&self, x: &Array2<f64>) -> Array2<f64> {
        relu(&self.norm.forward_eval(&self.linear.forward(x)))
    }

    pub fn backward(&mut self, cache: &DenseBlockCache, dy: &Array2<f64>) -> Array2<f64> {
        let d_norm = relu_backward(&cache.normalized, dy);
        let d_linear = self.norm.backward(&cache.norm, &d_norm);
        self.linear.backward(&cache.input, &d_linear)
    }

    pub fn visit_parameters(&mut self, f: &mut dyn FnMut(&mut Parameter)) {
        self.linear.visit_parameters(f);
        self.norm.visit_parameters(f);
    }
}

fn relu(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| v.max(0.0))
}

fn relu_backward(pre: &Array2<f64>, dy: &Array2<f64>) -> Array2<f64> {
    let mut dx = dy.to_owned();
    Zip::from(&mut dx).and(pre).for_each(|d, &p| {
        if p <= 0.0 {
            *d = 0.0;
        }
    });
    dx
}
