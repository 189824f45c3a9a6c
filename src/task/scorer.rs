//! Classification metrics over (gold, predicted) class ids
//!
//! Golds carrying the ignore sentinel are dropped before any metric is
//! computed, so masked slice-prediction labels never enter a denominator.
//! A metric that is undefined on the remaining support (empty split, F1 with
//! no positive golds or predictions) is reported as absent with a warning,
//! never as NaN.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::nn::IGNORE_INDEX;

/// Supported classification metrics; the positive class for the binary
/// metrics is class id 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Accuracy,
    F1,
    Precision,
    Recall,
}

impl Metric {
    /// Metric name as it appears in score-report keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::F1 => "f1",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configured set of metrics for one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scorer {
    metrics: Vec<Metric>,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            metrics: vec![Metric::Accuracy],
        }
    }
}

impl Scorer {
    pub fn new(metrics: Vec<Metric>) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Compute every configured metric over aligned gold/pred vectors.
    ///
    /// Ignored golds are dropped first; undefined metrics are omitted with a
    /// warning tagged by `context` (typically the task name).
    pub fn score(&self, golds: &[i64], preds: &[i64], context: &str) -> Vec<(Metric, f64)> {
        let pairs: Vec<(i64, i64)> = golds
            .iter()
            .zip(preds.iter())
            .filter(|(&g, _)| g != IGNORE_INDEX)
            .map(|(&g, &p)| (g, p))
            .collect();

        let mut results = Vec::with_capacity(self.metrics.len());
        for &metric in &self.metrics {
            match compute_metric(metric, &pairs) {
                Some(value) => results.push((metric, value)),
                None => warn!(
                    context,
                    metric = metric.as_str(),
                    support = pairs.len(),
                    "metric undefined on this split; omitting"
                ),
            }
        }
        results
    }
}

fn compute_metric(metric: Metric, pairs: &[(i64, i64)]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    match metric {
        Metric::Accuracy => {
            let correct = pairs.iter().filter(|(g, p)| g == p).count();
            Some(correct as f64 / pairs.len() as f64)
        }
        Metric::Precision => precision(pairs),
        Metric::Recall => recall(pairs),
        Metric::F1 => {
            let p = precision(pairs)?;
            let r = recall(pairs)?;
            if p + r == 0.0 {
                Some(0.0)
            } else {
                Some(2.0 * p * r / (p + r))
            }
        }
    }
}

fn precision(pairs: &[(i64, i64)]) -> Option<f64> {
    let tp = pairs.iter().filter(|(g, p)| *g == 1 && *p == 1).count();
    let fp = pairs.iter().filter(|(g, p)| *g != 1 && *p == 1).count();
    if tp + fp == 0 {
        None
    } else {
        Some(tp as f64 / (tp + fp) as f64)
    }
}

fn recall(pairs: &[(i64, i64)]) -> Option<f64> {
    let tp = pairs.iter().filter(|(g, p)| *g == 1 && *p == 1).count();
    let fn_ = pairs.iter().filter(|(g, p)| *g == 1 && *p != 1).count();
    if tp + fn_ == 0 {
        None
    } else {
        Some(tp as f64 / (tp + fn_) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_accuracy() {
        let scorer = Scorer::new(vec![Metric::Accuracy]);
        let scores = scorer.score(&[1, 0, 1, 0], &[1, 0, 0, 0], "t");
        assert_eq!(scores.len(), 1);
        assert_relative_eq!(scores[0].1, 0.75);
    }

    #[test]
    fn test_f1_known_value() {
        // tp=1, fp=1, fn=1 -> p=0.5, r=0.5, f1=0.5
        let scorer = Scorer::new(vec![Metric::F1]);
        let scores = scorer.score(&[1, 0, 1], &[1, 1, 0], "t");
        assert_relative_eq!(scores[0].1, 0.5);
    }

    #[test]
    fn test_perfect_f1_is_exactly_one() {
        let scorer = Scorer::new(vec![Metric::F1]);
        let scores = scorer.score(&[1, 1, 1], &[1, 1, 1], "t");
        assert_eq!(scores[0].1, 1.0);
    }

    #[test]
    fn test_ignored_golds_dropped() {
        let scorer = Scorer::new(vec![Metric::Accuracy]);
        let scores = scorer.score(&[1, IGNORE_INDEX, 0], &[1, 1, 1], "t");
        assert_relative_eq!(scores[0].1, 0.5);
    }

    #[test]
    fn test_degenerate_f1_omitted_not_nan() {
        // No positive golds and no positive predictions: F1 undefined
        let scorer = Scorer::new(vec![Metric::F1, Metric::Accuracy]);
        let scores = scorer.score(&[0, 0], &[0, 0], "t");
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].0, Metric::Accuracy);
    }

    #[test]
    fn test_empty_support_omits_everything() {
        let scorer = Scorer::new(vec![Metric::Accuracy, Metric::F1]);
        let scores = scorer.score(&[IGNORE_INDEX, IGNORE_INDEX], &[0, 1], "t");
        assert!(scores.is_empty());
    }
}
