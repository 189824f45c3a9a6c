//! Slice task builder
//!
//! Expands a base task into the full slice task set: per slice (synthetic
//! base included) an indicator task and a prediction task whose flows reuse
//! the base task's body modules by shared handle, plus one re-weighting task
//! that carries the base task's name and scorer and mixes every prediction
//! head through a [`SliceCombiner`].

use std::rc::Rc;

use super::labels::BASE_SLICE;
use super::reweight::{AggregationStrategy, SliceCombiner};
use crate::error::{Error, Result};
use crate::nn::{shared, ActivationType, Linear, SharedModule};
use crate::task::{ModulePool, OpInput, Operation, Task};

/// Canonical name for a slice sub-task: `"{base}_slice:{slice}_{kind}"`
pub fn slice_task_name(base_task: &str, slice: &str, kind: &str) -> String {
    format!("{base_task}_slice:{slice}_{kind}")
}

/// Expand `base_task` into the slice task set with the default
/// indicator-weighted aggregation
pub fn convert_to_slice_tasks(base_task: &Task, slice_names: &[&str]) -> Result<Vec<Task>> {
    convert_to_slice_tasks_with(base_task, slice_names, AggregationStrategy::default())
}

/// Expand `base_task` into the slice task set.
///
/// Emits, in order: (indicator, prediction) task pairs for every slice in
/// input order, the synthetic base slice last among them, then the
/// re-weighting task under the base task's own name, for a total of
/// exactly `2 * (slice_names.len() + 1) + 1` tasks.
pub fn convert_to_slice_tasks_with(
    base_task: &Task,
    slice_names: &[&str],
    strategy: AggregationStrategy,
) -> Result<Vec<Task>> {
    for (i, name) in slice_names.iter().enumerate() {
        if *name == BASE_SLICE {
            return Err(Error::ReservedName(BASE_SLICE.to_string()));
        }
        if slice_names[..i].contains(name) {
            return Err(Error::DuplicateName((*name).to_string()));
        }
    }

    let head_op = base_task.head_op();
    let body_ops: Vec<Operation> = base_task.task_flow()[..base_task.task_flow().len() - 1].to_vec();

    // Shared body modules, aliased by handle so backbone gradients aggregate
    let mut body_pool = ModulePool::new();
    for op in &body_ops {
        let module = base_task
            .module(&op.module_name)
            .ok_or_else(|| Error::InvalidTaskFlow {
                task: base_task.name().to_string(),
                reason: format!("module '{}' missing from pool", op.module_name),
            })?;
        body_pool.insert(op.module_name.clone(), module);
    }

    let base_head = base_task
        .module(&head_op.module_name)
        .ok_or_else(|| Error::InvalidTaskFlow {
            task: base_task.name().to_string(),
            reason: format!("module '{}' missing from pool", head_op.module_name),
        })?;
    let head_in = base_head.borrow().input_size();
    let num_classes = base_head.borrow().output_size();

    let mut all_slices: Vec<&str> = slice_names.to_vec();
    all_slices.push(BASE_SLICE);
    let num_slices = all_slices.len();

    let mut tasks = Vec::with_capacity(2 * num_slices + 1);
    let mut ind_refs: Vec<(String, SharedModule)> = Vec::with_capacity(num_slices);
    let mut pred_refs: Vec<(String, SharedModule)> = Vec::with_capacity(num_slices);

    for slice in &all_slices {
        // Indicator head: binary in-slice / out-of-slice logits
        let ind_name = slice_task_name(base_task.name(), slice, "ind");
        let ind_head = shared(Linear::new(head_in, 2, ActivationType::Identity));
        tasks.push(head_task(
            &ind_name,
            &body_pool,
            &body_ops,
            head_op,
            Rc::clone(&ind_head),
            base_task,
        )?);
        ind_refs.push((ind_name, ind_head));

        // Prediction head: same output space as the base head, distinct
        // parameters
        let pred_name = slice_task_name(base_task.name(), slice, "pred");
        let pred_head = shared(Linear::new(head_in, num_classes, ActivationType::Identity));
        tasks.push(head_task(
            &pred_name,
            &body_pool,
            &body_ops,
            head_op,
            Rc::clone(&pred_head),
            base_task,
        )?);
        pred_refs.push((pred_name, pred_head));
    }

    // Re-weighting task: body, every head, then the combiner, reported under
    // the base task's own name and scorer
    let combiner_name = format!("{}_slice_combiner", base_task.name());
    let mut master_pool = body_pool.clone();
    let mut master_flow = body_ops.clone();
    let mut combiner_inputs = Vec::with_capacity(2 * num_slices);

    for (name, module) in ind_refs.iter().chain(pred_refs.iter()) {
        master_pool.insert(head_module_name(name), Rc::clone(module));
        master_flow.push(Operation::new(
            name.clone(),
            head_module_name(name),
            head_op.inputs.clone(),
        ));
    }
    for (name, _) in ind_refs.iter().chain(pred_refs.iter()) {
        combiner_inputs.push(OpInput::op(name.clone()));
    }
    master_pool.insert(
        combiner_name.clone(),
        shared(SliceCombiner::new(num_slices, num_classes, strategy)),
    );
    master_flow.push(Operation::new(
        combiner_name.clone(),
        combiner_name,
        combiner_inputs,
    ));

    tasks.push(Task::new(
        base_task.name(),
        master_pool,
        master_flow,
        base_task.scorer().clone(),
    )?);

    Ok(tasks)
}

fn head_module_name(task_name: &str) -> String {
    format!("{task_name}_head")
}

/// Build one indicator or prediction task: shared body, fresh head
fn head_task(
    task_name: &str,
    body_pool: &ModulePool,
    body_ops: &[Operation],
    base_head_op: &Operation,
    head: SharedModule,
    base_task: &Task,
) -> Result<Task> {
    let mut pool = body_pool.clone();
    let module_name = head_module_name(task_name);
    pool.insert(module_name.clone(), head);

    let mut flow = body_ops.to_vec();
    flow.push(Operation::new(
        task_name,
        module_name,
        base_head_op.inputs.clone(),
    ));

    Task::new(task_name, pool, flow, base_task.scorer().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Scorer;

    fn base_task() -> Task {
        let mut pool = ModulePool::new();
        pool.insert(
            "body".into(),
            shared(Linear::new(2, 8, ActivationType::ReLU)),
        );
        pool.insert(
            "head".into(),
            shared(Linear::new(8, 2, ActivationType::Identity)),
        );
        Task::new(
            "task",
            pool,
            vec![
                Operation::new("body", "body", vec![OpInput::data("coordinates")]),
                Operation::new("head", "head", vec![OpInput::op("body")]),
            ],
            Scorer::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_task_count() {
        let tasks = convert_to_slice_tasks(&base_task(), &["a", "b"]).unwrap();
        assert_eq!(tasks.len(), 2 * (2 + 1) + 1);

        let tasks = convert_to_slice_tasks(&base_task(), &["a"]).unwrap();
        assert_eq!(tasks.len(), 5);

        // Even an empty slice list yields the synthetic base pair + master
        let tasks = convert_to_slice_tasks(&base_task(), &[]).unwrap();
        assert_eq!(tasks.len(), 3);
    }

    #[test]
    fn test_task_names_and_order() {
        let tasks = convert_to_slice_tasks(&base_task(), &["a"]).unwrap();
        let names: Vec<&str> = tasks.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "task_slice:a_ind",
                "task_slice:a_pred",
                "task_slice:base_ind",
                "task_slice:base_pred",
                "task",
            ]
        );
    }

    #[test]
    fn test_body_shared_by_handle() {
        let base = base_task();
        let tasks = convert_to_slice_tasks(&base, &["a"]).unwrap();

        let original = base.module("body").unwrap();
        for task in &tasks {
            let body = task.module("body").unwrap();
            assert!(Rc::ptr_eq(&original, &body));
        }
    }

    #[test]
    fn test_heads_shared_with_master() {
        let tasks = convert_to_slice_tasks(&base_task(), &["a"]).unwrap();
        let master = tasks.last().unwrap();

        let ind_task = &tasks[0];
        let head = ind_task.module("task_slice:a_ind_head").unwrap();
        let in_master = master.module("task_slice:a_ind_head").unwrap();
        assert!(Rc::ptr_eq(&head, &in_master));
    }

    #[test]
    fn test_head_dimensions() {
        let tasks = convert_to_slice_tasks(&base_task(), &["a"]).unwrap();
        let ind_head = tasks[0].module("task_slice:a_ind_head").unwrap();
        assert_eq!(ind_head.borrow().input_size(), 8);
        assert_eq!(ind_head.borrow().output_size(), 2);
    }

    #[test]
    fn test_master_combiner_arity() {
        let tasks = convert_to_slice_tasks(&base_task(), &["a", "b"]).unwrap();
        let master = tasks.last().unwrap();
        let combiner_op = master.head_op();
        assert_eq!(combiner_op.inputs.len(), 2 * 3);
        let combiner = master.module(&combiner_op.module_name).unwrap();
        assert_eq!(combiner.borrow().arity(), 6);
    }

    #[test]
    fn test_reserved_and_duplicate_slice_names() {
        assert!(matches!(
            convert_to_slice_tasks(&base_task(), &["base"]).unwrap_err(),
            Error::ReservedName(_)
        ));
        assert!(matches!(
            convert_to_slice_tasks(&base_task(), &["a", "a"]).unwrap_err(),
            Error::DuplicateName(_)
        ));
    }
}
