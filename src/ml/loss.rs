// ============================================================
// Layer 5 - Masked Cross Entropy
// ============================================================
// Label positions holding IGNORE_INDEX (-100) are padding and
// contribute nothing: the loss is the mean negative
// log-likelihood over the remaining positions only.

use burn::{prelude::*, tensor::activation::log_softmax};

/// Label value skipped by the loss.
pub const IGNORE_INDEX: i64 = -100;

/// logits: [batch, len, vocab], labels: [batch, len] → scalar loss [1]
pub fn masked_cross_entropy<B: Backend>(logits: Tensor<B, 3>, labels: Tensor<B, 2, Int>) -> Tensor<B, 1> {
    let [batch, len, _] = logits.dims();

    let keep   = labels.clone().equal_elem(IGNORE_INDEX).bool_not();      // [b, len]
    let safe   = labels.mask_fill(keep.clone().bool_not(), 0);             // sentinel → any valid id
    let picked = log_softmax(logits, 2)
        .gather(2, safe.unsqueeze_dim::<3>(2))                              // [b, len, 1]
        .reshape([batch, len]);

    let weights = keep.float();
    let total   = (picked * weights.clone()).sum().neg();
    total / weights.sum().clamp_min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestBackend;

    fn log_softmax_at(row: &[f32], idx: usize) -> f32 {
        let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let sum: f32 = row.iter().map(|x| (x - max).exp()).sum();
        row[idx] - max - sum.ln()
    }

    #[test]
    fn test_ignored_positions_do_not_count() {
        let device = Default::default();
        let rows = [[1.0f32, 2.0, 0.5], [3.0, -1.0, 0.0]];
        let logits = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(rows.concat(), [1, 2, 3]), &device,
        );
        let labels = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::new(vec![1i64, IGNORE_INDEX], [1, 2]), &device,
        );

        let loss = masked_cross_entropy(logits, labels).into_scalar().elem::<f32>();
        let expected = -log_softmax_at(&rows[0], 1);
        assert!((loss - expected).abs() < 1e-5, "{loss} vs {expected}");
    }

    #[test]
    fn test_mean_over_kept_positions() {
        let device = Default::default();
        let rows = [[0.0f32, 1.0], [2.0, 0.0], [5.0, 5.0]];
        let logits = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(rows.concat(), [1, 3, 2]), &device,
        );
        let labels = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::new(vec![1i64, 0, IGNORE_INDEX], [1, 3]), &device,
        );

        let loss = masked_cross_entropy(logits, labels).into_scalar().elem::<f32>();
        let expected = -(log_softmax_at(&rows[0], 1) + log_softmax_at(&rows[1], 0)) / 2.0;
        assert!((loss - expected).abs() < 1e-5, "{loss} vs {expected}");
    }

    #[test]
    fn test_all_ignored_gives_zero() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 3>::ones([1, 2, 4], &device);
        let labels = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::new(vec![IGNORE_INDEX, IGNORE_INDEX], [1, 2]), &device,
        );
        let loss = masked_cross_entropy(logits, labels).into_scalar().elem::<f32>();
        assert_eq!(loss, 0.0);
    }
}
