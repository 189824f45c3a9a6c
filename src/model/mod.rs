//! Multi-task model construction, training and scoring

mod classifier;
mod trainer;

pub use classifier::MultitaskClassifier;
pub use trainer::{OptimizerChoice, Trainer, TrainerConfig, TrainingReport};
