//! Dense (fully connected) layer
//!
//! Performs `output = activation(input @ weights + biases)` over a batch,
//! caching the input and pre-activation for backpropagation. Parameter
//! gradients accumulate across backward calls until `apply_gradients`, which
//! lets several task flows share one layer within a training step.

use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use super::activation::ActivationType;
use super::module::Module;
use super::optimizer::Optimizer;
use crate::utils;

/// Dense layer with weights, biases, and an activation function
pub struct Linear {
    weights: Array2<f64>,
    biases: Array1<f64>,
    activation: ActivationType,
    input_size: usize,
    output_size: usize,

    // Forward cache for backpropagation
    last_input: Option<Array2<f64>>,
    last_z: Option<Array2<f64>>,

    // Gradient accumulators
    grad_weights: Array2<f64>,
    grad_biases: Array1<f64>,
}

impl Linear {
    /// Create a new layer with Xavier initialization drawn from the
    /// crate-global seeded generator
    pub fn new(input_size: usize, output_size: usize, activation: ActivationType) -> Self {
        let limit = (6.0 / (input_size + output_size) as f64).sqrt();
        let weights = utils::with_rng(|rng| {
            Array2::random_using((input_size, output_size), Uniform::new(-limit, limit), rng)
        });

        Self {
            weights,
            biases: Array1::zeros(output_size),
            activation,
            input_size,
            output_size,
            last_input: None,
            last_z: None,
            grad_weights: Array2::zeros((input_size, output_size)),
            grad_biases: Array1::zeros(output_size),
        }
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn biases(&self) -> &Array1<f64> {
        &self.biases
    }

    pub fn activation(&self) -> ActivationType {
        self.activation
    }
}

impl Module for Linear {
    fn arity(&self) -> usize {
        1
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn forward(&mut self, inputs: &[Array2<f64>], _training: bool) -> Array2<f64> {
        let input = &inputs[0];
        self.last_input = Some(input.clone());

        let mut z = input.dot(&self.weights);
        for mut row in z.rows_mut() {
            row += &self.biases;
        }
        self.last_z = Some(z.clone());

        self.activation.forward(&z)
    }

    fn backward(&mut self, grad_output: &Array2<f64>) -> Vec<Array2<f64>> {
        let z = self.last_z.as_ref().expect("forward must precede backward");
        let input = self
            .last_input
            .as_ref()
            .expect("forward must precede backward");

        let delta = grad_output * &self.activation.derivative(z);

        self.grad_weights = &self.grad_weights + &input.t().dot(&delta);
        self.grad_biases = &self.grad_biases + &delta.sum_axis(Axis(0));

        vec![delta.dot(&self.weights.t())]
    }

    fn apply_gradients(&mut self, optimizer: &mut dyn Optimizer) {
        optimizer.update_weights(&mut self.weights, &self.grad_weights);
        optimizer.update_biases(&mut self.biases, &self.grad_biases);
    }

    fn zero_grad(&mut self) {
        self.grad_weights.fill(0.0);
        self.grad_biases.fill(0.0);
    }

    fn num_parameters(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::Sgd;

    #[test]
    fn test_layer_creation() {
        let layer = Linear::new(10, 5, ActivationType::ReLU);
        assert_eq!(layer.weights().dim(), (10, 5));
        assert_eq!(layer.biases().len(), 5);
        assert_eq!(layer.num_parameters(), 10 * 5 + 5);
    }

    #[test]
    fn test_forward_shape() {
        let mut layer = Linear::new(4, 3, ActivationType::ReLU);
        let input = Array2::ones((2, 4));
        let output = layer.forward(&[input], false);
        assert_eq!(output.dim(), (2, 3));
    }

    #[test]
    fn test_backward_shapes_and_accumulation() {
        let mut layer = Linear::new(4, 3, ActivationType::Identity);
        let input = Array2::ones((2, 4));
        let _ = layer.forward(&[input.clone()], true);
        let grad = Array2::ones((2, 3));

        let input_grads = layer.backward(&grad);
        assert_eq!(input_grads.len(), 1);
        assert_eq!(input_grads[0].dim(), (2, 4));

        let first = layer.grad_weights.clone();
        let _ = layer.forward(&[input], true);
        let _ = layer.backward(&grad);
        // Second backward adds on top of the first
        assert_eq!(&layer.grad_weights, &(&first * 2.0));

        layer.zero_grad();
        assert_eq!(layer.grad_weights.sum(), 0.0);
    }

    #[test]
    fn test_gradient_step_reduces_linear_loss() {
        // Fit y = x on a single scalar with plain SGD
        let mut layer = Linear::new(1, 1, ActivationType::Identity);
        let mut optimizer = Sgd::new(0.1);
        let x = Array2::from_shape_vec((4, 1), vec![-1.0, 0.0, 1.0, 2.0]).unwrap();
        let y = x.clone();

        let loss = |layer: &mut Linear, x: &Array2<f64>, y: &Array2<f64>| {
            let out = layer.forward(&[x.clone()], false);
            let diff = &out - y;
            (&diff * &diff).sum() / x.nrows() as f64
        };

        let before = loss(&mut layer, &x, &y);
        for _ in 0..50 {
            let out = layer.forward(&[x.clone()], true);
            let grad = (&out - &y) * (2.0 / x.nrows() as f64);
            let _ = layer.backward(&grad);
            layer.apply_gradients(&mut optimizer);
            layer.zero_grad();
        }
        let after = loss(&mut layer, &x, &y);

        assert!(after < before);
        assert!(after < 1e-3);
    }
}
