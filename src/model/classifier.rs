//! Multi-task classifier over a merged module pool
//!
//! Holds an ordered list of tasks whose module pools are merged into one:
//! a module name appearing in several tasks must alias the same shared
//! handle, which is how backbone parameters are shared. Forward runs a
//! task's flow in its validated order; backward walks it in reverse,
//! accumulating gradients where flows fan in.

use std::collections::HashMap;
use std::rc::Rc;

use ndarray::{Array1, Array2};

use crate::data::DictDataLoader;
use crate::error::{Error, Result};
use crate::nn::masked_cross_entropy;
use crate::task::{ModulePool, OpInput, Task};

/// A trainable multi-task model built from a list of tasks
pub struct MultitaskClassifier {
    tasks: Vec<Task>,
    module_pool: ModulePool,
}

impl std::fmt::Debug for MultitaskClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultitaskClassifier")
            .field("tasks", &self.tasks)
            .field(
                "module_pool",
                &self.module_pool.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl MultitaskClassifier {
    /// Merge the tasks' module pools and validate operation arity.
    ///
    /// Fails if two tasks share a task name, if one module name maps to two
    /// distinct module instances, or if an operation supplies the wrong
    /// number of inputs for its module.
    pub fn new(tasks: Vec<Task>) -> Result<Self> {
        let mut module_pool = ModulePool::new();
        let mut task_names = std::collections::HashSet::new();

        for task in &tasks {
            if !task_names.insert(task.name().to_string()) {
                return Err(Error::DuplicateName(task.name().to_string()));
            }

            for (name, module) in task.module_pool() {
                match module_pool.get(name) {
                    Some(existing) => {
                        if !Rc::ptr_eq(existing, module) {
                            return Err(Error::DuplicateName(name.clone()));
                        }
                    }
                    None => {
                        module_pool.insert(name.clone(), Rc::clone(module));
                    }
                }
            }

            for op in task.task_flow() {
                let module = task
                    .module_pool()
                    .get(&op.module_name)
                    .expect("flow validated against pool");
                let arity = module.borrow().arity();
                if op.inputs.len() != arity {
                    return Err(Error::InvalidTaskFlow {
                        task: task.name().to_string(),
                        reason: format!(
                            "operation '{}' supplies {} inputs to module '{}' expecting {}",
                            op.name,
                            op.inputs.len(),
                            op.module_name,
                            arity
                        ),
                    });
                }
            }
        }

        Ok(Self { tasks, module_pool })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name() == name)
    }

    pub fn module_pool(&self) -> &ModulePool {
        &self.module_pool
    }

    pub fn num_parameters(&self) -> usize {
        self.module_pool
            .values()
            .map(|m| m.borrow().num_parameters())
            .sum()
    }

    /// Run a task flow forward, returning every operation's output keyed by
    /// operation name
    fn forward_flow(
        &self,
        task: &Task,
        x_dict: &HashMap<String, Array2<f64>>,
        training: bool,
    ) -> Result<HashMap<String, Array2<f64>>> {
        let mut outputs: HashMap<String, Array2<f64>> = HashMap::new();

        for op in task.task_flow() {
            let mut inputs = Vec::with_capacity(op.inputs.len());
            for input in &op.inputs {
                match input {
                    OpInput::Data(field) => {
                        let x = x_dict
                            .get(field)
                            .ok_or_else(|| Error::MissingInput(field.clone()))?;
                        inputs.push(x.clone());
                    }
                    OpInput::Op { op: src, .. } => {
                        // Flow order validated at task construction
                        inputs.push(outputs[src.as_str()].clone());
                    }
                }
            }
            let module = task
                .module_pool()
                .get(&op.module_name)
                .expect("flow validated against pool");
            let out = module.borrow_mut().forward(&inputs, training);
            outputs.insert(op.name.clone(), out);
        }

        Ok(outputs)
    }

    /// Walk the flow in reverse, pushing gradients back through each module
    /// and accumulating them where operations fan in
    fn backward_flow(&self, task: &Task, head_grad: Array2<f64>) {
        let mut grads: HashMap<String, Array2<f64>> = HashMap::new();
        grads.insert(task.head_op().name.clone(), head_grad);

        for op in task.task_flow().iter().rev() {
            let grad = match grads.remove(&op.name) {
                Some(g) => g,
                None => continue,
            };
            let module = task
                .module_pool()
                .get(&op.module_name)
                .expect("flow validated against pool");
            let input_grads = module.borrow_mut().backward(&grad);

            for (input, ig) in op.inputs.iter().zip(input_grads) {
                if let OpInput::Op { op: src, .. } = input {
                    match grads.get_mut(src) {
                        Some(acc) => *acc = &*acc + &ig,
                        None => {
                            grads.insert(src.clone(), ig);
                        }
                    }
                }
            }
        }
    }

    /// Final-operation logits for one task
    pub fn logits(&self, task_name: &str, x_dict: &HashMap<String, Array2<f64>>) -> Result<Array2<f64>> {
        let task = self
            .task(task_name)
            .ok_or_else(|| Error::UnknownTask(task_name.to_string()))?;
        let mut outputs = self.forward_flow(task, x_dict, false)?;
        Ok(outputs
            .remove(&task.head_op().name)
            .expect("head op executed"))
    }

    /// Argmax class predictions for one task
    pub fn predict(&self, task_name: &str, x_dict: &HashMap<String, Array2<f64>>) -> Result<Array1<i64>> {
        let logits = self.logits(task_name, x_dict)?;
        let preds = logits
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0usize;
                for (c, &v) in row.iter().enumerate() {
                    if v > row[best] {
                        best = c;
                    }
                }
                best as i64
            })
            .collect();
        Ok(preds)
    }

    /// Per-task masked loss and non-ignored label counts over full feature
    /// and label dictionaries, outside the training loop
    pub fn calculate_loss(
        &self,
        x_dict: &HashMap<String, Array2<f64>>,
        y_dict: &HashMap<String, Array1<i64>>,
    ) -> Result<(HashMap<String, f64>, HashMap<String, usize>)> {
        let mut losses = HashMap::new();
        let mut counts = HashMap::new();

        for task in &self.tasks {
            let labels = match y_dict.get(task.name()) {
                Some(labels) => labels,
                None => continue,
            };
            let logits = self.logits(task.name(), x_dict)?;
            if let Some((loss, _)) = masked_cross_entropy(&logits, labels)? {
                let kept = labels.iter().filter(|&&v| v >= 0).count();
                losses.insert(task.name().to_string(), loss);
                counts.insert(task.name().to_string(), kept);
            }
        }

        Ok((losses, counts))
    }

    /// One forward+backward pass for a single task on a batch.
    ///
    /// Accumulates parameter gradients; the caller applies them once per
    /// batch. Returns `None` when every label in the batch is masked.
    pub(crate) fn train_step_task(
        &self,
        task: &Task,
        x_batch: &HashMap<String, Array2<f64>>,
        labels: &Array1<i64>,
    ) -> Result<Option<f64>> {
        let outputs = self.forward_flow(task, x_batch, true)?;
        let logits = &outputs[task.head_op().name.as_str()];
        match masked_cross_entropy(logits, labels)? {
            Some((loss, grad)) => {
                self.backward_flow(task, grad);
                Ok(Some(loss))
            }
            None => Ok(None),
        }
    }

    /// Score every task against every dataloader that carries its label key,
    /// producing a `"{task}/{dataset}/{split}/{metric}"` keyed report
    pub fn score(&self, dataloaders: &[DictDataLoader]) -> Result<HashMap<String, f64>> {
        let mut report = HashMap::new();

        for loader in dataloaders {
            let dataset = &loader.dataset;
            for task in &self.tasks {
                let golds = match dataset.y_dict().get(task.name()) {
                    Some(golds) => golds,
                    None => continue,
                };
                let preds = self.predict(task.name(), dataset.x_dict())?;
                let golds_vec: Vec<i64> = golds.iter().copied().collect();
                let preds_vec: Vec<i64> = preds.iter().copied().collect();

                for (metric, value) in task.scorer().score(&golds_vec, &preds_vec, task.name()) {
                    report.insert(
                        format!(
                            "{}/{}/{}/{}",
                            task.name(),
                            dataset.name(),
                            dataset.split(),
                            metric.as_str()
                        ),
                        value,
                    );
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DictDataset;
    use crate::nn::{shared, ActivationType, Linear, IGNORE_INDEX};
    use crate::task::{Metric, Operation, Scorer};
    use ndarray::array;

    fn simple_task(name: &str) -> Task {
        let mut pool = ModulePool::new();
        pool.insert(
            format!("{name}_body"),
            shared(Linear::new(2, 4, ActivationType::ReLU)),
        );
        pool.insert(
            format!("{name}_head"),
            shared(Linear::new(4, 2, ActivationType::Identity)),
        );
        Task::new(
            name,
            pool,
            vec![
                Operation::new("body", format!("{name}_body"), vec![OpInput::data("coordinates")]),
                Operation::new("head", format!("{name}_head"), vec![OpInput::op("body")]),
            ],
            Scorer::new(vec![Metric::Accuracy]),
        )
        .unwrap()
    }

    fn x_dict(rows: usize) -> HashMap<String, Array2<f64>> {
        let mut x = HashMap::new();
        x.insert(
            "coordinates".to_string(),
            Array2::from_shape_fn((rows, 2), |(i, j)| (i + j) as f64 * 0.1),
        );
        x
    }

    #[test]
    fn test_duplicate_task_name_rejected() {
        let err = MultitaskClassifier::new(vec![simple_task("t"), simple_task("t")]).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_)));
    }

    #[test]
    fn test_conflicting_module_instances_rejected() {
        // Same module name, different instances
        let a = simple_task("a");
        let mut pool = ModulePool::new();
        pool.insert(
            "a_body".into(),
            shared(Linear::new(2, 4, ActivationType::ReLU)),
        );
        pool.insert(
            "b_head".into(),
            shared(Linear::new(4, 2, ActivationType::Identity)),
        );
        let b = Task::new(
            "b",
            pool,
            vec![
                Operation::new("body", "a_body", vec![OpInput::data("coordinates")]),
                Operation::new("head", "b_head", vec![OpInput::op("body")]),
            ],
            Scorer::default(),
        )
        .unwrap();

        let err = MultitaskClassifier::new(vec![a, b]).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_)));
    }

    #[test]
    fn test_predict_shape_and_range() {
        let model = MultitaskClassifier::new(vec![simple_task("t")]).unwrap();
        let preds = model.predict("t", &x_dict(5)).unwrap();
        assert_eq!(preds.len(), 5);
        assert!(preds.iter().all(|&p| p == 0 || p == 1));
    }

    #[test]
    fn test_calculate_loss_skips_absent_and_masked() {
        let model = MultitaskClassifier::new(vec![simple_task("t")]).unwrap();

        let mut y = HashMap::new();
        y.insert("t".to_string(), array![0i64, 1, IGNORE_INDEX]);
        let (losses, counts) = model.calculate_loss(&x_dict(3), &y).unwrap();
        assert!(losses.contains_key("t"));
        assert_eq!(counts["t"], 2);

        let mut all_masked = HashMap::new();
        all_masked.insert("t".to_string(), array![IGNORE_INDEX, IGNORE_INDEX, IGNORE_INDEX]);
        let (losses, _) = model.calculate_loss(&x_dict(3), &all_masked).unwrap();
        assert!(losses.is_empty());
    }

    #[test]
    fn test_score_key_format() {
        let model = MultitaskClassifier::new(vec![simple_task("t")]).unwrap();
        let mut y = HashMap::new();
        y.insert("t".to_string(), array![0i64, 1, 0]);
        let dataset = DictDataset::new("TestData", "valid", x_dict(3), y).unwrap();
        let loader = DictDataLoader::new(dataset, 4);

        let report = model.score(&[loader]).unwrap();
        assert!(report.contains_key("t/TestData/valid/accuracy"));
    }

    #[test]
    fn test_unknown_task_errors() {
        let model = MultitaskClassifier::new(vec![simple_task("t")]).unwrap();
        assert!(matches!(
            model.predict("missing", &x_dict(2)).unwrap_err(),
            Error::UnknownTask(_)
        ));
    }
}
