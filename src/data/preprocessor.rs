// ============================================================
// Layer 4 - Seq2Seq Preprocessor
// ============================================================
// Turns an ArticleRecord into one fixed-shape training sample.
//
// Steps (applied in order):
//   1. Prefix the article with the task instruction "summarize: "
//   2. Encode the input, truncate, append </s>, pad to max_source_len
//   3. Encode the reference summary the same way to max_target_len
//   4. Replace every pad id in the target with -100 so the loss
//      skips those positions
//   5. Shift the labels right behind the decoder start token to
//      get the decoder inputs (teacher forcing)
//
// Example with max_target_len = 6, pad = 0, eos = 1, start = 0:
//   summary ids        [412, 87, 9, 1]
//   labels             [412, 87, 9, 1, -100, -100]
//   decoder_input_ids  [0, 412, 87, 9, 1, 0]
//
// Reference: Raffel et al. (2020) T5 paper, §2.4

use anyhow::{Context, Result};

use crate::data::{dataset::SummarySample, tokenizer::SummaryTokenizer};
use crate::domain::record::ArticleRecord;
use crate::ml::loss::IGNORE_INDEX;

/// Instruction prefix the pretrained checkpoint associates with summarization.
pub const TASK_PREFIX: &str = "summarize: ";

pub struct Seq2SeqPreprocessor<'a> {
    tokenizer:        &'a SummaryTokenizer,
    max_source_len:   usize,
    max_target_len:   usize,
    decoder_start_id: u32,
}

impl<'a> Seq2SeqPreprocessor<'a> {
    pub fn new(
        tokenizer:        &'a SummaryTokenizer,
        max_source_len:   usize,
        max_target_len:   usize,
        decoder_start_id: u32,
    ) -> Self {
        Self { tokenizer, max_source_len, max_target_len, decoder_start_id }
    }

    pub fn process(&self, record: &ArticleRecord) -> Result<SummarySample> {
        let input = format!("{TASK_PREFIX}{}", record.article);
        let (input_ids, attention_mask) = self.tokenizer.encode_padded(&input, self.max_source_len)?;

        let (target_ids, _) = self.tokenizer.encode_padded(&record.summary, self.max_target_len)?;
        let pad = self.tokenizer.pad_id();
        let labels: Vec<i64> = target_ids
            .iter()
            .map(|&id| if id == pad { IGNORE_INDEX } else { id as i64 })
            .collect();

        let decoder_input_ids = shift_right(&labels, self.decoder_start_id, pad);

        Ok(SummarySample { input_ids, attention_mask, decoder_input_ids, labels })
    }

    pub fn process_all(&self, records: &[ArticleRecord]) -> Result<Vec<SummarySample>> {
        let samples = records
            .iter()
            .enumerate()
            .map(|(i, r)| self.process(r).with_context(|| format!("Cannot preprocess record {i}")))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(
            "Preprocessed {} records (source_len={}, target_len={})",
            samples.len(), self.max_source_len, self.max_target_len
        );
        Ok(samples)
    }
}

/// [start, l0, l1, ..., l(n-2)] with ignored positions mapped back to `pad_id`.
pub fn shift_right(labels: &[i64], start_id: u32, pad_id: u32) -> Vec<u32> {
    std::iter::once(start_id)
        .chain(
            labels
                .iter()
                .take(labels.len().saturating_sub(1))
                .map(|&l| if l == IGNORE_INDEX { pad_id } else { l as u32 }),
        )
        .collect()
}
