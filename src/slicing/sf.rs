//! Slicing functions
//!
//! A slicing function is a named, pure membership predicate over one example
//! row. It must be total over the declared schema: any error it returns is a
//! configuration fault surfaced immediately by the applier, not skipped.

use crate::data::Record;
use crate::error::Result;

/// Named heuristic predicate flagging subpopulation membership
pub struct SlicingFunction {
    name: String,
    predicate: Box<dyn Fn(&Record) -> Result<bool>>,
}

impl SlicingFunction {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Record) -> Result<bool> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate membership for one row
    pub fn apply(&self, record: &Record) -> Result<bool> {
        (self.predicate)(record)
    }
}

impl std::fmt::Debug for SlicingFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlicingFunction")
            .field("name", &self.name)
            .finish()
    }
}
