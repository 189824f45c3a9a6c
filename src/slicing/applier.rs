//! Slicing function evaluator
//!
//! Applies a set of slicing functions to every row of a table, producing the
//! membership matrix. Evaluation is independent per (row, function) pair and
//! free of shared mutable state, so an external parallel map would be sound;
//! at the handful-of-functions scale this layer targets, a sequential pass
//! stays well under a second for thousands of rows.

use ndarray::{Array2, ArrayView1, ArrayView2};
use std::collections::HashSet;
use tracing::debug;

use super::sf::SlicingFunction;
use crate::data::DataTable;
use crate::error::{Error, Result};

/// Per-example slice membership: rows = examples in table order, columns =
/// slicing functions in applier order, values in {0, 1}
#[derive(Debug, Clone)]
pub struct MembershipMatrix {
    values: Array2<u8>,
    function_names: Vec<String>,
}

impl MembershipMatrix {
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn num_examples(&self) -> usize {
        self.values.nrows()
    }

    pub fn num_functions(&self) -> usize {
        self.values.ncols()
    }

    pub fn function_names(&self) -> &[String] {
        &self.function_names
    }

    pub fn values(&self) -> ArrayView2<'_, u8> {
        self.values.view()
    }

    /// Membership column for function index `i`
    pub fn column(&self, i: usize) -> ArrayView1<'_, u8> {
        self.values.column(i)
    }

    /// Fraction of examples the function at index `i` covers
    pub fn coverage(&self, i: usize) -> f64 {
        if self.num_examples() == 0 {
            return 0.0;
        }
        let positives: usize = self.column(i).iter().map(|&v| v as usize).sum();
        positives as f64 / self.num_examples() as f64
    }
}

/// Evaluates a fixed, uniquely named set of slicing functions
pub struct SfApplier {
    functions: Vec<SlicingFunction>,
}

impl SfApplier {
    /// Duplicate function names are a construction-time error
    pub fn new(functions: Vec<SlicingFunction>) -> Result<Self> {
        let mut seen = HashSet::new();
        for sf in &functions {
            if !seen.insert(sf.name().to_string()) {
                return Err(Error::DuplicateName(sf.name().to_string()));
            }
        }
        Ok(Self { functions })
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.iter().map(|sf| sf.name()).collect()
    }

    /// Evaluate every function on every row
    pub fn apply(&self, table: &DataTable) -> Result<MembershipMatrix> {
        let mut values = Array2::<u8>::zeros((table.len(), self.functions.len()));

        for (row, record) in table.iter().enumerate() {
            for (col, sf) in self.functions.iter().enumerate() {
                let member = sf.apply(record).map_err(|e| Error::SlicingFunction {
                    name: sf.name().to_string(),
                    row,
                    message: e.to_string(),
                })?;
                values[[row, col]] = member as u8;
            }
        }

        let matrix = MembershipMatrix {
            values,
            function_names: self.functions.iter().map(|sf| sf.name().to_string()).collect(),
        };
        for i in 0..matrix.num_functions() {
            debug!(
                function = matrix.function_names[i].as_str(),
                coverage = matrix.coverage(i),
                "evaluated slicing function"
            );
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Record;

    fn table() -> DataTable {
        DataTable::new(
            (0..4)
                .map(|i| Record::new().with("x1", i as f64 - 1.5))
                .collect(),
        )
    }

    fn positive() -> SlicingFunction {
        SlicingFunction::new("positive", |r| Ok(r.field("x1")? > 0.0))
    }

    fn negative() -> SlicingFunction {
        SlicingFunction::new("negative", |r| Ok(r.field("x1")? < 0.0))
    }

    #[test]
    fn test_shape_and_column_order() {
        let applier = SfApplier::new(vec![positive(), negative()]).unwrap();
        let matrix = applier.apply(&table()).unwrap();

        assert_eq!(matrix.shape(), (4, 2));
        assert_eq!(matrix.function_names(), &["positive", "negative"]);
        assert_eq!(matrix.column(0).to_vec(), vec![0, 0, 1, 1]);
        assert_eq!(matrix.column(1).to_vec(), vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        assert!(SfApplier::new(vec![positive(), positive()]).is_err());
    }

    #[test]
    fn test_failing_function_is_fatal() {
        let broken = SlicingFunction::new("broken", |r| Ok(r.field("missing")? > 0.0));
        let applier = SfApplier::new(vec![broken]).unwrap();
        let err = applier.apply(&table()).unwrap_err();
        assert!(matches!(err, Error::SlicingFunction { row: 0, .. }));
    }

    #[test]
    fn test_zero_coverage_function_is_fine() {
        let never = SlicingFunction::new("never", |_| Ok(false));
        let applier = SfApplier::new(vec![never]).unwrap();
        let matrix = applier.apply(&table()).unwrap();
        assert_eq!(matrix.coverage(0), 0.0);
    }

    #[test]
    fn test_overlapping_slices_allowed() {
        let any = SlicingFunction::new("any", |_| Ok(true));
        let applier = SfApplier::new(vec![positive(), any]).unwrap();
        let matrix = applier.apply(&table()).unwrap();
        assert_eq!(matrix.column(1).to_vec(), vec![1, 1, 1, 1]);
    }
}
