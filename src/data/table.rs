//! Row-oriented example tables
//!
//! A [`Record`] is one example with named scalar fields; a [`DataTable`] is
//! an ordered sequence of records. Row order is the canonical example order:
//! the membership matrix, feature tensors and label vectors derived from a
//! table all share it.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

/// One example with named scalar fields, immutable once built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, f64>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Field access for slicing functions; a missing field is a fatal
    /// configuration error at the call site
    pub fn field(&self, name: &str) -> Result<f64> {
        self.fields
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }
}

/// Ordered sequence of records
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    records: Vec<Record>,
}

impl DataTable {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Extract a dense feature matrix over the named fields, one row per
    /// record in table order
    pub fn feature_matrix(&self, fields: &[&str]) -> Result<Array2<f64>> {
        let mut values = Vec::with_capacity(self.len() * fields.len());
        for record in &self.records {
            for &field in fields {
                values.push(record.field(field)?);
            }
        }
        Array2::from_shape_vec((self.len(), fields.len()), values).map_err(|_| {
            Error::shape_mismatch(
                "feature matrix",
                format!("({}, {})", self.len(), fields.len()),
                "flattened field values",
            )
        })
    }

    /// Extract an integral label vector from the named field
    pub fn label_vector(&self, field: &str) -> Result<Array1<i64>> {
        let mut values = Vec::with_capacity(self.len());
        for record in &self.records {
            values.push(record.field(field)?.round() as i64);
        }
        Ok(Array1::from_vec(values))
    }
}

impl<'a> IntoIterator for &'a DataTable {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
