//! Slice label attacher
//!
//! Synthesizes two auxiliary label vectors per slice, an indicator
//! (in-slice or not) and a masked prediction copy of the base labels, and
//! writes them into a dataloader's label store. The caller guarantees that
//! the membership matrix was built from the same row order as the dataset;
//! only the row *count* can be checked here.

use ndarray::Array1;
use tracing::warn;

use super::applier::MembershipMatrix;
use crate::data::DictDataLoader;
use crate::error::{Error, Result};
use crate::nn::IGNORE_INDEX;
use crate::task::Task;

/// Name of the synthetic slice covering the full population
pub const BASE_SLICE: &str = "base";

/// Label-store keys for one slice of one base task
pub fn slice_label_keys(base_task: &str, slice: &str) -> (String, String) {
    (
        format!("{base_task}_slice:{slice}_ind"),
        format!("{base_task}_slice:{slice}_pred"),
    )
}

/// Attach indicator and prediction labels for every slice, plus the
/// synthetic `base` slice, to the loader's dataset.
///
/// Idempotent: re-running with identical inputs overwrites the same keys.
/// Fails fast on shape disagreements, duplicate or reserved slice names, and
/// a missing base label key; a slice with zero positive or zero negative
/// members is permitted with a warning.
pub fn add_slice_labels(
    loader: &mut DictDataLoader,
    base_task: &Task,
    matrix: &MembershipMatrix,
    slice_names: &[&str],
) -> Result<()> {
    if slice_names.len() != matrix.num_functions() {
        return Err(Error::shape_mismatch(
            "slice names vs matrix columns",
            matrix.num_functions(),
            slice_names.len(),
        ));
    }
    for (i, name) in slice_names.iter().enumerate() {
        if *name == BASE_SLICE {
            return Err(Error::ReservedName(BASE_SLICE.to_string()));
        }
        if slice_names[..i].contains(name) {
            return Err(Error::DuplicateName((*name).to_string()));
        }
    }

    let dataset = &mut loader.dataset;
    if matrix.num_examples() != dataset.len() {
        return Err(Error::shape_mismatch(
            "membership matrix rows vs dataset examples",
            dataset.len(),
            matrix.num_examples(),
        ));
    }

    let base_labels = dataset
        .y_dict()
        .get(base_task.name())
        .cloned()
        .ok_or_else(|| Error::MissingLabel(base_task.name().to_string()))?;

    for (i, slice) in slice_names.iter().enumerate() {
        let indicator: Array1<i64> = matrix.column(i).mapv(|v| v as i64);
        attach_one(dataset, base_task.name(), slice, &indicator, &base_labels)?;
    }

    // Synthetic base slice: everything is in-slice, prediction labels are the
    // base labels untouched
    let all_ones = Array1::<i64>::ones(dataset.len());
    attach_one(dataset, base_task.name(), BASE_SLICE, &all_ones, &base_labels)?;

    Ok(())
}

fn attach_one(
    dataset: &mut crate::data::DictDataset,
    base_task: &str,
    slice: &str,
    indicator: &Array1<i64>,
    base_labels: &Array1<i64>,
) -> Result<()> {
    let positives = indicator.iter().filter(|&&v| v == 1).count();
    if positives == 0 || positives == indicator.len() {
        // Degenerate slices still get labels; downstream metrics may be
        // undefined for them, which the scorer reports as absent
        if slice != BASE_SLICE {
            warn!(
                slice,
                split = dataset.split(),
                positives,
                examples = indicator.len(),
                "degenerate slice membership"
            );
        }
    }

    let prediction: Array1<i64> = indicator
        .iter()
        .zip(base_labels.iter())
        .map(|(&ind, &label)| if ind == 1 { label } else { IGNORE_INDEX })
        .collect();

    let (ind_key, pred_key) = slice_label_keys(base_task, slice);
    dataset.insert_label(ind_key, indicator.clone())?;
    dataset.insert_label(pred_key, prediction)?;
    Ok(())
}
