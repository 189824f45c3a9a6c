//! Activation functions and their derivatives for backpropagation

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Types of activation functions available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationType {
    /// Rectified Linear Unit: max(0, x)
    ReLU,
    /// Sigmoid: 1 / (1 + exp(-x))
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
    /// Identity: x (raw logits)
    Identity,
}

impl ActivationType {
    /// Apply the activation to a batch of pre-activations
    pub fn forward(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            ActivationType::ReLU => z.mapv(|v| v.max(0.0)),
            ActivationType::Sigmoid => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            ActivationType::Tanh => z.mapv(f64::tanh),
            ActivationType::Identity => z.clone(),
        }
    }

    /// Elementwise derivative with respect to the pre-activation
    pub fn derivative(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            ActivationType::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            ActivationType::Sigmoid => {
                let s = self.forward(z);
                &s * &(1.0 - &s)
            }
            ActivationType::Tanh => {
                let t = self.forward(z);
                1.0 - &t * &t
            }
            ActivationType::Identity => Array2::ones(z.dim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_relu() {
        let z = array![[-1.0, 0.0, 2.0]];
        assert_eq!(ActivationType::ReLU.forward(&z), array![[0.0, 0.0, 2.0]]);
        assert_eq!(ActivationType::ReLU.derivative(&z), array![[0.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_sigmoid_midpoint() {
        let z = array![[0.0]];
        let s = ActivationType::Sigmoid.forward(&z);
        assert_relative_eq!(s[[0, 0]], 0.5, epsilon = 1e-12);
        let d = ActivationType::Sigmoid.derivative(&z);
        assert_relative_eq!(d[[0, 0]], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_identity() {
        let z = array![[1.5, -2.5]];
        assert_eq!(ActivationType::Identity.forward(&z), z);
        assert_eq!(ActivationType::Identity.derivative(&z), array![[1.0, 1.0]]);
    }
}
