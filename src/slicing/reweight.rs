//! Indicator-weighted recombination of slice prediction heads
//!
//! The combiner is a parameter-free module sitting at the end of the
//! re-weighting task flow. Its inputs are the indicator logits followed by
//! the prediction logits for every slice (synthetic base slice last); its
//! output is a per-example mixture of the prediction logits, weighted by the
//! chosen aggregation strategy. The mixture weights are treated as constants
//! during backward: indicator heads learn from their own labels, prediction
//! heads receive the weighted gradient.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::nn::{softmax_rows, Module, Optimizer};

/// Named strategy for deriving per-slice mixture weights from the indicator
/// heads' outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationStrategy {
    /// Weight each slice by its indicator's predicted class-1 probability,
    /// normalized to sum to 1 per example; if the total indicator mass is
    /// ~0, fall back to the base prediction head with weight 1
    IndicatorWeighted,
    /// Softmax over the class-1 indicator logits
    SoftmaxAttention,
}

impl Default for AggregationStrategy {
    fn default() -> Self {
        Self::IndicatorWeighted
    }
}

/// Parameter-free module mixing slice prediction logits
pub struct SliceCombiner {
    num_slices: usize,
    num_classes: usize,
    strategy: AggregationStrategy,
    eps: f64,

    // Backward cache
    last_weights: Option<Array2<f64>>,
    last_input_dims: Vec<(usize, usize)>,
}

impl SliceCombiner {
    /// `num_slices` counts the synthetic base slice, which must be the last
    /// indicator/prediction pair in the input order
    pub fn new(num_slices: usize, num_classes: usize, strategy: AggregationStrategy) -> Self {
        Self {
            num_slices,
            num_classes,
            strategy,
            eps: 1e-12,
            last_weights: None,
            last_input_dims: Vec::new(),
        }
    }

    pub fn strategy(&self) -> AggregationStrategy {
        self.strategy
    }

    /// Mixture weights, one row per example, one column per slice
    fn compute_weights(&self, indicator_logits: &[Array2<f64>]) -> Array2<f64> {
        let batch = indicator_logits[0].nrows();
        let n = self.num_slices;
        let mut weights = Array2::<f64>::zeros((batch, n));

        match self.strategy {
            AggregationStrategy::IndicatorWeighted => {
                for (s, logits) in indicator_logits.iter().enumerate() {
                    let probs = softmax_rows(logits);
                    for b in 0..batch {
                        weights[[b, s]] = probs[[b, 1]];
                    }
                }
                for b in 0..batch {
                    let total: f64 = (0..n).map(|s| weights[[b, s]]).sum();
                    if total < self.eps {
                        // No slice claims this example; defer to the base head
                        for s in 0..n {
                            weights[[b, s]] = 0.0;
                        }
                        weights[[b, n - 1]] = 1.0;
                    } else {
                        for s in 0..n {
                            weights[[b, s]] /= total;
                        }
                    }
                }
            }
            AggregationStrategy::SoftmaxAttention => {
                let mut scores = Array2::<f64>::zeros((batch, n));
                for (s, logits) in indicator_logits.iter().enumerate() {
                    for b in 0..batch {
                        scores[[b, s]] = logits[[b, 1]];
                    }
                }
                weights = softmax_rows(&scores);
            }
        }

        weights
    }
}

impl Module for SliceCombiner {
    fn arity(&self) -> usize {
        2 * self.num_slices
    }

    fn input_size(&self) -> usize {
        self.num_classes
    }

    fn output_size(&self) -> usize {
        self.num_classes
    }

    fn forward(&mut self, inputs: &[Array2<f64>], _training: bool) -> Array2<f64> {
        let n = self.num_slices;
        let (indicators, predictions) = inputs.split_at(n);

        let weights = self.compute_weights(indicators);
        let batch = weights.nrows();

        let mut output = Array2::<f64>::zeros((batch, self.num_classes));
        for (s, pred) in predictions.iter().enumerate() {
            for b in 0..batch {
                let w = weights[[b, s]];
                for c in 0..self.num_classes {
                    output[[b, c]] += w * pred[[b, c]];
                }
            }
        }

        self.last_input_dims = inputs.iter().map(|x| x.dim()).collect();
        self.last_weights = Some(weights);
        output
    }

    fn backward(&mut self, grad_output: &Array2<f64>) -> Vec<Array2<f64>> {
        let weights = self
            .last_weights
            .as_ref()
            .expect("forward must precede backward");
        let n = self.num_slices;

        let mut grads = Vec::with_capacity(2 * n);
        // Stop-gradient through the weights: indicator inputs get zeros
        for dims in &self.last_input_dims[..n] {
            grads.push(Array2::zeros(*dims));
        }
        for s in 0..n {
            let mut g = grad_output.clone();
            for (b, mut row) in g.rows_mut().into_iter().enumerate() {
                row *= weights[[b, s]];
            }
            grads.push(g);
        }
        grads
    }

    fn apply_gradients(&mut self, _optimizer: &mut dyn Optimizer) {}

    fn zero_grad(&mut self) {}
}
