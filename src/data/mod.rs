//! Example tables and dictionary datasets

mod dataset;
mod table;

pub use dataset::{DictDataLoader, DictDataset, TRAIN_SPLIT};
pub use table::{DataTable, Record};
