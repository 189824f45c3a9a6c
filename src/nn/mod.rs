//! Differentiable computation units
//!
//! Small dense building blocks with explicit forward caches and manual
//! backpropagation. Modules are held behind shared handles so several task
//! flows can drive one backbone and have its gradients aggregate.

mod activation;
mod linear;
mod loss;
mod module;
mod optimizer;

pub use activation::ActivationType;
pub use linear::Linear;
pub use loss::{masked_cross_entropy, softmax_rows, IGNORE_INDEX};
pub use module::{shared, Module, SharedModule};
pub use optimizer::{Adam, Optimizer, Sgd};
