//! Parameter update rules
//!
//! The trainer attaches one optimizer instance per module and calls
//! `update_weights` then `update_biases` once per batch. Adam's timestep is
//! advanced by the weight update, so that order is part of the contract.

use ndarray::{Array, Array1, Array2, Dimension, Zip};

/// Update rule applied to a module's accumulated gradients
pub trait Optimizer {
    /// Update a weight matrix given its accumulated gradients
    fn update_weights(&mut self, weights: &mut Array2<f64>, gradients: &Array2<f64>);

    /// Update a bias vector given its accumulated gradients
    fn update_biases(&mut self, biases: &mut Array1<f64>, gradients: &Array1<f64>);
}

/// Plain stochastic gradient descent
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for Sgd {
    fn update_weights(&mut self, weights: &mut Array2<f64>, gradients: &Array2<f64>) {
        weights.scaled_add(-self.learning_rate, gradients);
    }

    fn update_biases(&mut self, biases: &mut Array1<f64>, gradients: &Array1<f64>) {
        biases.scaled_add(-self.learning_rate, gradients);
    }
}

/// Adam (adaptive moment estimation)
///
/// Moment buffers are allocated lazily on the first update, shaped like the
/// parameters they track.
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: usize,
    moments_w: Option<(Array2<f64>, Array2<f64>)>,
    moments_b: Option<(Array1<f64>, Array1<f64>)>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            moments_w: None,
            moments_b: None,
        }
    }

    fn step<D: Dimension>(
        &self,
        params: &mut Array<f64, D>,
        gradients: &Array<f64, D>,
        moments: &mut (Array<f64, D>, Array<f64, D>),
    ) {
        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);

        Zip::from(params)
            .and(gradients)
            .and(&mut moments.0)
            .and(&mut moments.1)
            .for_each(|p, &g, m, v| {
                *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            });
    }
}

impl Optimizer for Adam {
    fn update_weights(&mut self, weights: &mut Array2<f64>, gradients: &Array2<f64>) {
        self.t += 1;
        let mut moments = self
            .moments_w
            .take()
            .unwrap_or_else(|| (Array2::zeros(weights.dim()), Array2::zeros(weights.dim())));
        self.step(weights, gradients, &mut moments);
        self.moments_w = Some(moments);
    }

    fn update_biases(&mut self, biases: &mut Array1<f64>, gradients: &Array1<f64>) {
        let mut moments = self
            .moments_b
            .take()
            .unwrap_or_else(|| (Array1::zeros(biases.len()), Array1::zeros(biases.len())));
        self.step(biases, gradients, &mut moments);
        self.moments_b = Some(moments);
    }
}
