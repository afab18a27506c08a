// ============================================================
// Layer 4 - Summary Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<SummarySample>
// into device tensors.
//
// How batching works here:
//   Input:  N samples, sources of length S, targets of length T
//   Output: SummaryBatch with [N, S] and [N, T] Int tensors
//
//   Each field is flattened sample by sample, then reshaped:
//   [s1_t1, ..., s1_tS, s2_t1, ..., sN_tS] → [N, S]
//
// All samples are padded to the same lengths by the
// preprocessor, so no dynamic padding is needed here.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::SummarySample;

// ─── SummaryBatch ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SummaryBatch<B: Backend> {
    /// [batch, source_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// [batch, source_len], 1 = real token, 0 = padding
    pub attention_mask: Tensor<B, 2, Int>,

    /// [batch, target_len], labels shifted right behind the start token
    pub decoder_input_ids: Tensor<B, 2, Int>,

    /// [batch, target_len], -100 where the loss must ignore the position
    pub labels: Tensor<B, 2, Int>,
}

// ─── SummaryBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct SummaryBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SummaryBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn stack<T: Copy>(&self, rows: impl Iterator<Item = Vec<T>>, batch: usize, len: usize, to_i32: fn(T) -> i32) -> Tensor<B, 2, Int> {
        let flat: Vec<i32> = rows.flat_map(|r| r.into_iter().map(to_i32)).collect();
        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device).reshape([batch, len])
    }
}

impl<B: Backend> Batcher<SummarySample, SummaryBatch<B>> for SummaryBatcher<B> {
    fn batch(&self, items: Vec<SummarySample>) -> SummaryBatch<B> {
        let batch_size = items.len();
        // All samples share the same (pre-padded) lengths
        let source_len = items.first().map_or(0, |s| s.input_ids.len());
        let target_len = items.first().map_or(0, |s| s.labels.len());

        let input_ids = self.stack(
            items.iter().map(|s| s.input_ids.clone()), batch_size, source_len, |x| x as i32,
        );
        let attention_mask = self.stack(
            items.iter().map(|s| s.attention_mask.clone()), batch_size, source_len, |x| x as i32,
        );
        let decoder_input_ids = self.stack(
            items.iter().map(|s| s.decoder_input_ids.clone()), batch_size, target_len, |x| x as i32,
        );
        let labels = self.stack(
            items.into_iter().map(|s| s.labels), batch_size, target_len, |x| x as i32,
        );

        SummaryBatch { input_ids, attention_mask, decoder_input_ids, labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestBackend;

    fn sample(offset: u32) -> SummarySample {
        SummarySample {
            input_ids:         vec![offset + 5, offset + 6, 1, 0],
            attention_mask:    vec![1, 1, 1, 0],
            decoder_input_ids: vec![0, offset + 7, 1],
            labels:            vec![(offset + 7) as i64, 1, -100],
        }
    }

    #[test]
    fn test_batch_shapes_and_order() {
        let batcher = SummaryBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![sample(0), sample(10)]);

        assert_eq!(batch.input_ids.dims(), [2, 4]);
        assert_eq!(batch.attention_mask.dims(), [2, 4]);
        assert_eq!(batch.decoder_input_ids.dims(), [2, 3]);
        assert_eq!(batch.labels.dims(), [2, 3]);

        let labels = batch.labels.into_data().to_vec::<i64>().unwrap();
        assert_eq!(labels, vec![7, 1, -100, 17, 1, -100]);
        let ids = batch.input_ids.into_data().to_vec::<i64>().unwrap();
        assert_eq!(&ids[4..], &[15, 16, 1, 0]);
    }
}
