//! The module trait and shared module handles
//!
//! A module is a differentiable computation unit owned by one or more task
//! flows. Backbone modules are shared between tasks by handle, not copied,
//! so every head that reads the backbone contributes to the same gradient
//! accumulators and one optimizer step updates the common parameters.

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::Array2;

use super::optimizer::Optimizer;

/// A differentiable computation unit
///
/// `forward` caches whatever `backward` needs; within a single task flow a
/// module is driven by at most one operation (enforced at task construction),
/// and the trainer runs `forward` and `backward` back to back per flow, so a
/// single cache slot is sufficient even for shared modules.
pub trait Module {
    /// Number of input tensors the module consumes
    fn arity(&self) -> usize;

    /// Expected per-example input width
    fn input_size(&self) -> usize;

    /// Per-example output width
    fn output_size(&self) -> usize;

    /// Forward pass over a batch
    ///
    /// `inputs` must hold exactly `arity()` arrays; the model validates this
    /// at construction time.
    fn forward(&mut self, inputs: &[Array2<f64>], training: bool) -> Array2<f64>;

    /// Backward pass: accumulate parameter gradients internally and return
    /// the gradient with respect to each input, in input order
    fn backward(&mut self, grad_output: &Array2<f64>) -> Vec<Array2<f64>>;

    /// Apply accumulated gradients through the optimizer
    fn apply_gradients(&mut self, optimizer: &mut dyn Optimizer);

    /// Clear accumulated gradients
    fn zero_grad(&mut self);

    /// Number of trainable parameters
    fn num_parameters(&self) -> usize {
        0
    }
}

/// Shared handle to a module; cloned handles alias the same parameters
pub type SharedModule = Rc<RefCell<dyn Module>>;

/// Wrap a module into a shared handle
pub fn shared<M: Module + 'static>(module: M) -> SharedModule {
    Rc::new(RefCell::new(module))
}
