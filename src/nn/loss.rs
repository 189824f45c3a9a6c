//! Cross-entropy loss with ignore-sentinel masking
//!
//! Slice prediction labels mark out-of-slice rows with [`IGNORE_INDEX`];
//! masked rows contribute neither to the mean loss nor to the gradient, so
//! tensor shapes stay uniform while the loss only sees in-slice examples.

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

/// Sentinel class id marking a label as excluded from loss and metrics.
///
/// Class ids are non-negative, so -1 cannot collide with a real class. An
/// explicit per-row mask would serve equally well; the sentinel keeps the
/// label store to one tensor per key.
pub const IGNORE_INDEX: i64 = -1;

/// Row-wise numerically stable softmax
pub fn softmax_rows(logits: &Array2<f64>) -> Array2<f64> {
    let mut probs = logits.clone();
    for mut row in probs.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    probs
}

/// Mean cross entropy over non-ignored rows, with its gradient w.r.t. the
/// logits.
///
/// Returns `Ok(None)` when every row is ignored (a degenerate batch for this
/// head); callers skip the head rather than propagate a NaN.
pub fn masked_cross_entropy(
    logits: &Array2<f64>,
    targets: &Array1<i64>,
) -> Result<Option<(f64, Array2<f64>)>> {
    if logits.nrows() != targets.len() {
        return Err(Error::shape_mismatch(
            "cross entropy targets",
            logits.nrows(),
            targets.len(),
        ));
    }

    let num_classes = logits.ncols();
    let probs = softmax_rows(logits);
    let mut grad = Array2::zeros(logits.dim());
    let mut loss = 0.0;
    let mut kept = 0usize;

    for (i, &target) in targets.iter().enumerate() {
        if target == IGNORE_INDEX {
            continue;
        }
        if target < 0 || target as usize >= num_classes {
            return Err(Error::InvalidLabel {
                value: target,
                num_classes,
            });
        }
        let t = target as usize;
        loss -= probs[[i, t]].max(1e-15).ln();
        for c in 0..num_classes {
            grad[[i, c]] = probs[[i, c]];
        }
        grad[[i, t]] -= 1.0;
        kept += 1;
    }

    if kept == 0 {
        return Ok(None);
    }

    let scale = 1.0 / kept as f64;
    Ok(Some((loss * scale, grad * scale)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let logits = array![[1.0, 2.0, 3.0], [-5.0, 0.0, 5.0]];
        let probs = softmax_rows(&logits);
        for row in probs.rows() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_uniform_logits_give_ln_num_classes() {
        let logits = array![[0.0, 0.0]];
        let targets = array![1i64];
        let (loss, _) = masked_cross_entropy(&logits, &targets).unwrap().unwrap();
        assert_relative_eq!(loss, 2.0f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_masked_rows_excluded() {
        let logits = array![[0.0, 10.0], [0.0, 10.0]];
        let targets_full = array![1i64, 1];
        let targets_masked = array![1i64, IGNORE_INDEX];

        let (full, _) = masked_cross_entropy(&logits, &targets_full)
            .unwrap()
            .unwrap();
        let (masked, grad) = masked_cross_entropy(&logits, &targets_masked)
            .unwrap()
            .unwrap();

        // Identical rows, so the per-row mean is unchanged by masking one out
        assert_relative_eq!(full, masked, epsilon = 1e-12);
        // Masked row gets no gradient
        assert_eq!(grad[[1, 0]], 0.0);
        assert_eq!(grad[[1, 1]], 0.0);
    }

    #[test]
    fn test_all_masked_is_none() {
        let logits = array![[0.0, 1.0]];
        let targets = array![IGNORE_INDEX];
        assert!(masked_cross_entropy(&logits, &targets).unwrap().is_none());
    }

    #[test]
    fn test_out_of_range_label_rejected() {
        let logits = array![[0.0, 1.0]];
        let targets = array![2i64];
        assert!(masked_cross_entropy(&logits, &targets).is_err());
    }

    #[test]
    fn test_gradient_points_away_from_target() {
        let logits = array![[0.0, 0.0]];
        let targets = array![0i64];
        let (_, grad) = masked_cross_entropy(&logits, &targets).unwrap().unwrap();
        assert!(grad[[0, 0]] < 0.0);
        assert!(grad[[0, 1]] > 0.0);
    }
}
