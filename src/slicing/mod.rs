//! Weak-supervision slicing
//!
//! Turns named heuristic membership predicates ("slicing functions") into
//! auxiliary supervision: a membership matrix over an example table, slice
//! indicator/prediction labels in a dataset's label store, and an expanded
//! task set with per-slice heads plus an indicator-weighted re-combination
//! of their outputs.

mod applier;
mod convert;
mod labels;
mod reweight;
mod sf;

pub use applier::{MembershipMatrix, SfApplier};
pub use convert::{convert_to_slice_tasks, convert_to_slice_tasks_with, slice_task_name};
pub use labels::{add_slice_labels, slice_label_keys, BASE_SLICE};
pub use reweight::{AggregationStrategy, SliceCombiner};
pub use sf::SlicingFunction;
