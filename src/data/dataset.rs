//! Dictionary datasets and dataloaders
//!
//! A [`DictDataset`] pairs named feature tensors with an example-keyed label
//! store, all aligned 1:1 with one row order. The label store is the mutable
//! surface the slice label attacher writes into.

use std::collections::HashMap;

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

/// Split name the trainer consumes batches from
pub const TRAIN_SPLIT: &str = "train";

/// Named feature/label dictionaries for one split of one dataset
#[derive(Debug, Clone)]
pub struct DictDataset {
    name: String,
    split: String,
    x_dict: HashMap<String, Array2<f64>>,
    y_dict: HashMap<String, Array1<i64>>,
    num_examples: usize,
}

impl DictDataset {
    /// Build a dataset, failing fast if any tensor disagrees on row count
    pub fn new(
        name: impl Into<String>,
        split: impl Into<String>,
        x_dict: HashMap<String, Array2<f64>>,
        y_dict: HashMap<String, Array1<i64>>,
    ) -> Result<Self> {
        let name = name.into();
        let split = split.into();

        let num_examples = x_dict
            .values()
            .map(|x| x.nrows())
            .chain(y_dict.values().map(|y| y.len()))
            .next()
            .unwrap_or(0);

        for (key, x) in &x_dict {
            if x.nrows() != num_examples {
                return Err(Error::shape_mismatch(
                    format!("feature '{key}' rows"),
                    num_examples,
                    x.nrows(),
                ));
            }
        }
        for (key, y) in &y_dict {
            if y.len() != num_examples {
                return Err(Error::shape_mismatch(
                    format!("label '{key}' rows"),
                    num_examples,
                    y.len(),
                ));
            }
        }

        Ok(Self {
            name,
            split,
            x_dict,
            y_dict,
            num_examples,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn split(&self) -> &str {
        &self.split
    }

    pub fn len(&self) -> usize {
        self.num_examples
    }

    pub fn is_empty(&self) -> bool {
        self.num_examples == 0
    }

    pub fn x_dict(&self) -> &HashMap<String, Array2<f64>> {
        &self.x_dict
    }

    pub fn y_dict(&self) -> &HashMap<String, Array1<i64>> {
        &self.y_dict
    }

    /// Insert (or overwrite) a label vector, enforcing row alignment
    pub fn insert_label(&mut self, key: impl Into<String>, labels: Array1<i64>) -> Result<()> {
        if labels.len() != self.num_examples {
            return Err(Error::shape_mismatch(
                "label rows",
                self.num_examples,
                labels.len(),
            ));
        }
        self.y_dict.insert(key.into(), labels);
        Ok(())
    }
}

/// Batching wrapper around a dataset
#[derive(Debug, Clone)]
pub struct DictDataLoader {
    pub dataset: DictDataset,
    pub batch_size: usize,
    pub shuffle: bool,
}

impl DictDataLoader {
    /// Shuffling defaults on for the train split, off elsewhere
    pub fn new(dataset: DictDataset, batch_size: usize) -> Self {
        let shuffle = dataset.split() == TRAIN_SPLIT;
        Self {
            dataset,
            batch_size,
            shuffle,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn is_train(&self) -> bool {
        self.dataset.split() == TRAIN_SPLIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn x_dict(rows: usize) -> HashMap<String, Array2<f64>> {
        let mut x = HashMap::new();
        x.insert("coordinates".to_string(), Array2::zeros((rows, 2)));
        x
    }

    #[test]
    fn test_row_alignment_enforced() {
        let mut y = HashMap::new();
        y.insert("task".to_string(), array![0i64, 1, 0]);
        assert!(DictDataset::new("d", "train", x_dict(3), y.clone()).is_ok());
        assert!(DictDataset::new("d", "train", x_dict(4), y).is_err());
    }

    #[test]
    fn test_insert_label_overwrites() {
        let mut y = HashMap::new();
        y.insert("task".to_string(), array![0i64, 1]);
        let mut dataset = DictDataset::new("d", "valid", x_dict(2), y).unwrap();

        dataset.insert_label("task", array![1i64, 1]).unwrap();
        assert_eq!(dataset.y_dict()["task"], array![1i64, 1]);
        assert_eq!(dataset.y_dict().len(), 1);

        assert!(dataset.insert_label("task", array![1i64]).is_err());
    }

    #[test]
    fn test_loader_shuffle_default() {
        let train = DictDataset::new("d", "train", x_dict(2), HashMap::new()).unwrap();
        let valid = DictDataset::new("d", "valid", x_dict(2), HashMap::new()).unwrap();
        assert!(DictDataLoader::new(train, 4).shuffle);
        assert!(!DictDataLoader::new(valid, 4).shuffle);
    }
}
