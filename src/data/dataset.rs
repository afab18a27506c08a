use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One tokenised, fixed-length training example.
/// Source: "summarize: " article </s> <pad>...
/// Target: summary </s> -100...
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarySample {
    pub input_ids:         Vec<u32>,
    pub attention_mask:    Vec<u32>,
    pub decoder_input_ids: Vec<u32>,
    pub labels:            Vec<i64>,
}

pub struct SummaryDataset {
    samples: Vec<SummarySample>,
}

impl SummaryDataset {
    pub fn new(samples: Vec<SummarySample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }
}

impl Dataset<SummarySample> for SummaryDataset {
    fn get(&self, index: usize) -> Option<SummarySample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_access() {
        let sample = SummarySample {
            input_ids:         vec![5, 1, 0],
            attention_mask:    vec![1, 1, 0],
            decoder_input_ids: vec![0, 7, 1],
            labels:            vec![7, 1, -100],
        };

        let ds = SummaryDataset::new(vec![sample]);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.sample_count(), 1);
        assert!(ds.get(0).is_some());
        assert!(ds.get(1).is_none());
    }
}
