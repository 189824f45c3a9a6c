//! Named computation-graph tasks
//!
//! A task is a module pool plus an ordered flow of operations over it. The
//! flow is a DAG validated at construction: operations may read the raw input
//! sentinel or the output of an earlier operation, never a later one. The
//! final operation's output is the task's logits, scored by the task's
//! [`Scorer`] against the label key matching the task name.

mod scorer;

use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::nn::SharedModule;

pub use scorer::{Metric, Scorer};

/// Reference to one input of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpInput {
    /// A named field of the raw input (the `_input_` sentinel of the flow)
    Data(String),
    /// Output `index` of a prior operation
    Op { op: String, index: usize },
}

impl OpInput {
    /// Convenience constructor for the common single-output case
    pub fn op(name: impl Into<String>) -> Self {
        OpInput::Op {
            op: name.into(),
            index: 0,
        }
    }

    pub fn data(field: impl Into<String>) -> Self {
        OpInput::Data(field.into())
    }
}

/// One step of a task flow: apply `module_name` to the resolved inputs and
/// publish the result under `name`
#[derive(Debug, Clone)]
pub struct Operation {
    pub name: String,
    pub module_name: String,
    pub inputs: Vec<OpInput>,
}

impl Operation {
    pub fn new(
        name: impl Into<String>,
        module_name: impl Into<String>,
        inputs: Vec<OpInput>,
    ) -> Self {
        Self {
            name: name.into(),
            module_name: module_name.into(),
            inputs,
        }
    }
}

/// Shared pool of named modules; same name in two tasks must alias the same
/// module instance
pub type ModulePool = BTreeMap<String, SharedModule>;

/// A named computation graph with its scoring configuration
#[derive(Clone)]
pub struct Task {
    name: String,
    module_pool: ModulePool,
    task_flow: Vec<Operation>,
    scorer: Scorer,
}

impl Task {
    /// Build a task, validating the flow graph
    pub fn new(
        name: impl Into<String>,
        module_pool: ModulePool,
        task_flow: Vec<Operation>,
        scorer: Scorer,
    ) -> Result<Self> {
        let name = name.into();
        validate_flow(&name, &module_pool, &task_flow)?;
        Ok(Self {
            name,
            module_pool,
            task_flow,
            scorer,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module_pool(&self) -> &ModulePool {
        &self.module_pool
    }

    pub fn task_flow(&self) -> &[Operation] {
        &self.task_flow
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// The operation producing the task's logits
    pub fn head_op(&self) -> &Operation {
        // Flow is validated non-empty
        self.task_flow.last().expect("validated non-empty flow")
    }

    /// Shared handle for a pool module
    pub fn module(&self, name: &str) -> Option<SharedModule> {
        self.module_pool.get(name).map(Rc::clone)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field(
                "module_pool",
                &self.module_pool.keys().collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

fn validate_flow(task: &str, pool: &ModulePool, flow: &[Operation]) -> Result<()> {
    let fail = |reason: String| Error::InvalidTaskFlow {
        task: task.to_string(),
        reason,
    };

    if flow.is_empty() {
        return Err(fail("task flow is empty".into()));
    }

    let mut seen_ops: HashSet<&str> = HashSet::new();
    let mut used_modules: HashSet<&str> = HashSet::new();

    for op in flow {
        if !seen_ops.insert(op.name.as_str()) {
            return Err(Error::DuplicateName(op.name.clone()));
        }
        if !pool.contains_key(&op.module_name) {
            return Err(fail(format!(
                "operation '{}' references unknown module '{}'",
                op.name, op.module_name
            )));
        }
        // One driving operation per module keeps forward caches unambiguous
        if !used_modules.insert(op.module_name.as_str()) {
            return Err(fail(format!(
                "module '{}' is driven by more than one operation",
                op.module_name
            )));
        }
        for input in &op.inputs {
            match input {
                OpInput::Data(_) => {}
                OpInput::Op { op: src, index } => {
                    if src == &op.name {
                        return Err(fail(format!("operation '{}' references itself", op.name)));
                    }
                    if !seen_ops.contains(src.as_str()) {
                        return Err(fail(format!(
                            "operation '{}' forward-references '{src}'",
                            op.name
                        )));
                    }
                    if *index != 0 {
                        return Err(fail(format!(
                            "operation '{}' requests output {index} of '{src}', \
                             but modules publish a single output",
                            op.name
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}
