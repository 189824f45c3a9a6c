//! Error types for the slice_multitask library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
///
/// Every variant is a construction-time failure: nothing in this layer is
/// retryable, and no partially built value is ever returned alongside one.
#[derive(Error, Debug)]
pub enum Error {
    /// Tensor or table shapes disagree between collaborating inputs
    #[error("shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    /// Two slicing functions, slices, tasks or modules share a name
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// A slicing function failed on a row it was expected to be total over
    #[error("slicing function '{name}' failed on row {row}: {message}")]
    SlicingFunction {
        name: String,
        row: usize,
        message: String,
    },

    /// A record does not carry the requested field
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// A task flow is not a valid operation graph
    #[error("invalid task flow in task '{task}': {reason}")]
    InvalidTaskFlow { task: String, reason: String },

    /// A required label key is absent from the label store
    #[error("missing label '{0}'")]
    MissingLabel(String),

    /// A required input field is absent from the feature store
    #[error("missing input '{0}'")]
    MissingInput(String),

    /// A label value is outside the configured class range
    #[error("label {value} out of range for {num_classes} classes")]
    InvalidLabel { value: i64, num_classes: usize },

    /// The name is reserved for internal use (the synthetic base slice)
    #[error("'{0}' is a reserved slice name")]
    ReservedName(String),

    /// The model does not carry a task with the requested name
    #[error("unknown task '{0}'")]
    UnknownTask(String),

    /// No dataloader with a `train` split was supplied to the trainer
    #[error("no dataloader with a 'train' split was provided")]
    NoTrainingData,
}

impl Error {
    /// Shorthand for a [`Error::ShapeMismatch`]
    pub fn shape_mismatch(
        context: impl Into<String>,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        Error::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
