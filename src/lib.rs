//! # slice_multitask
//!
//! Slice-based weak supervision over a multi-task neural classifier.
//!
//! Heuristic membership predicates ("slicing functions") are evaluated over
//! an example table into a binary membership matrix. The matrix is turned
//! into auxiliary labels on a dictionary dataset, a base classification task
//! is expanded into per-slice indicator and prediction tasks sharing its
//! backbone, and an indicator-weighted combination of the per-slice heads is
//! trained under the base task's name. The result is a model whose
//! representation is pulled toward the application-critical data subsets the
//! slicing functions mark out.
//!
//! ## Pipeline
//!
//! 1. [`slicing::SfApplier`] evaluates slicing functions into a
//!    [`slicing::MembershipMatrix`].
//! 2. [`slicing::add_slice_labels`] writes indicator and masked prediction
//!    labels into a [`data::DictDataLoader`]'s label store.
//! 3. [`slicing::convert_to_slice_tasks`] expands the base [`task::Task`]
//!    into the slice task set.
//! 4. [`model::MultitaskClassifier`] merges the task pools;
//!    [`model::Trainer`] fits them jointly and
//!    [`model::MultitaskClassifier::score`] reports per-task metrics.
//!
//! ## Modules
//!
//! - [`data`]: example tables, dictionary datasets, dataloaders
//! - [`slicing`]: slicing functions, applier, label attacher, task builder
//! - [`task`]: task graphs (operations over a shared module pool) and scoring
//! - [`nn`]: dense layers, masked cross-entropy, optimizers
//! - [`model`]: multi-task classifier and trainer
//! - [`error`]: the crate-wide [`Error`] type
//! - [`utils`]: seeded randomness

pub mod data;
pub mod error;
pub mod model;
pub mod nn;
pub mod slicing;
pub mod task;
pub mod utils;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports for building a slicing pipeline
pub mod prelude {
    pub use crate::data::{DataTable, DictDataLoader, DictDataset, Record};
    pub use crate::error::{Error, Result};
    pub use crate::model::{MultitaskClassifier, Trainer, TrainerConfig};
    pub use crate::nn::{shared, ActivationType, Linear, IGNORE_INDEX};
    pub use crate::slicing::{
        add_slice_labels, convert_to_slice_tasks, MembershipMatrix, SfApplier, SlicingFunction,
    };
    pub use crate::task::{Metric, ModulePool, OpInput, Operation, Scorer, Task};
    pub use crate::utils::set_seed;
}
