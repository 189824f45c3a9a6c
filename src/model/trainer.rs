//! Multi-task training loop
//!
//! Iterates shuffled mini-batches from the train-split dataloaders; within a
//! batch, every task whose label key is present runs forward and backward in
//! sequence so shared backbone modules accumulate gradients from all of
//! them, then a single optimizer step updates every module once.

use std::collections::HashMap;

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::classifier::MultitaskClassifier;
use crate::data::DictDataLoader;
use crate::error::{Error, Result};
use crate::nn::{Adam, Optimizer, Sgd};
use crate::utils;

/// Which optimizer the trainer attaches to each module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerChoice {
    Adam,
    Sgd,
}

impl Default for OptimizerChoice {
    fn default() -> Self {
        Self::Adam
    }
}

impl OptimizerChoice {
    fn build(&self, learning_rate: f64) -> Box<dyn Optimizer> {
        match self {
            OptimizerChoice::Adam => Box::new(Adam::new(learning_rate)),
            OptimizerChoice::Sgd => Box::new(Sgd::new(learning_rate)),
        }
    }
}

/// Trainer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Learning rate, fixed for the whole run
    pub learning_rate: f64,
    /// Number of passes over the training data
    pub n_epochs: usize,
    /// Optimizer attached to every module
    pub optimizer: OptimizerChoice,
    /// Epoch interval for progress logs
    pub log_every: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            n_epochs: 50,
            optimizer: OptimizerChoice::Adam,
            log_every: 10,
        }
    }
}

impl TrainerConfig {
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = n_epochs;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerChoice) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_log_every(mut self, log_every: usize) -> Self {
        self.log_every = log_every;
        self
    }
}

/// Summary of a completed training run
#[derive(Debug, Clone, Default)]
pub struct TrainingReport {
    /// Mean summed batch loss per epoch
    pub epoch_losses: Vec<f64>,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.epoch_losses.last().copied()
    }
}

/// Multi-task trainer
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train the model on the train-split loaders for the configured number
    /// of epochs
    pub fn train(
        &self,
        model: &MultitaskClassifier,
        dataloaders: &[DictDataLoader],
    ) -> Result<TrainingReport> {
        let train_loaders: Vec<&DictDataLoader> = dataloaders
            .iter()
            .filter(|loader| loader.is_train() && !loader.dataset.is_empty())
            .collect();
        if train_loaders.is_empty() {
            return Err(Error::NoTrainingData);
        }

        let mut optimizers: HashMap<String, Box<dyn Optimizer>> = model
            .module_pool()
            .keys()
            .map(|name| (name.clone(), self.config.optimizer.build(self.config.learning_rate)))
            .collect();

        info!(
            tasks = model.tasks().len(),
            parameters = model.num_parameters(),
            epochs = self.config.n_epochs,
            "starting training"
        );

        let mut report = TrainingReport::default();

        for epoch in 0..self.config.n_epochs {
            let mut epoch_loss = 0.0;
            let mut batches = 0usize;

            for loader in &train_loaders {
                let mut indices: Vec<usize> = (0..loader.dataset.len()).collect();
                if loader.shuffle {
                    utils::with_rng(|rng| indices.shuffle(rng));
                }

                // Each loader batches at its own configured size
                for chunk in indices.chunks(loader.batch_size.max(1)) {
                    let x_batch: HashMap<String, Array2<f64>> = loader
                        .dataset
                        .x_dict()
                        .iter()
                        .map(|(key, x)| (key.clone(), x.select(Axis(0), chunk)))
                        .collect();
                    let y_batch: HashMap<String, Array1<i64>> = loader
                        .dataset
                        .y_dict()
                        .iter()
                        .map(|(key, y)| (key.clone(), y.select(Axis(0), chunk)))
                        .collect();

                    let mut batch_loss = 0.0;
                    for task in model.tasks() {
                        if let Some(labels) = y_batch.get(task.name()) {
                            if let Some(loss) = model.train_step_task(task, &x_batch, labels)? {
                                batch_loss += loss;
                            }
                        }
                    }

                    for (name, module) in model.module_pool() {
                        let optimizer = optimizers
                            .get_mut(name)
                            .expect("one optimizer per module");
                        let mut module = module.borrow_mut();
                        module.apply_gradients(optimizer.as_mut());
                        module.zero_grad();
                    }

                    epoch_loss += batch_loss;
                    batches += 1;
                }
            }

            let mean_loss = epoch_loss / batches.max(1) as f64;
            report.epoch_losses.push(mean_loss);

            if (epoch + 1) % self.config.log_every.max(1) == 0 {
                info!(
                    epoch = epoch + 1,
                    total = self.config.n_epochs,
                    loss = mean_loss,
                    "epoch complete"
                );
            } else {
                debug!(epoch = epoch + 1, loss = mean_loss, "epoch complete");
            }
        }

        Ok(report)
    }
}
