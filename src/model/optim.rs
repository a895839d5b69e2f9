//! Adam optimizer over every [`Parameter`] a model exposes.

use super::layers::Parameter;
use super::vae::Vae;
use ndarray::Zip;

#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    steps: i32,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            steps: 0,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }

    pub fn step(&mut self, model: &mut Vae) {
        self.steps = self.steps.saturating_add(1);
        let (b1, b2, eps, lr) = (self.beta1, self.beta2, self.eps, self.learning_rate);
        let bias1 = 1.0 - b1.powi(self.steps);
        let bias2 = 1.0 - b2.powi(self.steps);
        model.visit_parameters(&mut |p: &mut Parameter| {
            p.ensure_moments();
            Zip::from(&mut p.value)
                .and(&mut p.first_moment)
                .and(&mut p.second_moment)
                .and(&p.grad)
                .for_each(|w, m, v, &g| {
                    *m = b1 * *m + (1.0 - b1) * g;
                    *v = b2 * *v + (1.0 - b2) * g * g;
                    let m_hat = *m / bias1;
                    let v_hat = *v / bias2;
                    *w -= lr * m_hat / (v_hat.sqrt() + eps);
                });
        });
    }
}
