// ============================================================
// Layer 4 - Summary Tokenizer
// ============================================================
// Thin wrapper over a `tokenizers::Tokenizer` that applies the
// seq2seq conventions the model was trained with:
//
//   encode:        tokens → truncate to (max_len - 1) → append </s>
//   encode_padded: encode → pad with <pad> up to exactly max_len
//   decode:        ids → text, special tokens skipped
//
// The pad and eos ids come from the model config rather than
// the tokenizer file, so both always agree with the weights.

use anyhow::{anyhow, Result};
use tokenizers::Tokenizer;

#[derive(Clone)]
pub struct SummaryTokenizer {
    inner:  Tokenizer,
    pad_id: u32,
    eos_id: u32,
}

impl SummaryTokenizer {
    pub fn new(inner: Tokenizer, pad_id: u32, eos_id: u32) -> Self {
        Self { inner, pad_id, eos_id }
    }

    pub fn pad_id(&self) -> u32 { self.pad_id }

    pub fn eos_id(&self) -> u32 { self.eos_id }

    pub fn inner(&self) -> &Tokenizer { &self.inner }

    /// Encode `text` into at most `max_len` ids, always ending in eos.
    pub fn encode(&self, text: &str, max_len: usize) -> Result<Vec<u32>> {
        anyhow::ensure!(max_len > 0, "max_len must be at least 1");
        let enc = self
            .inner
            .encode(text, false)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;

        let mut ids: Vec<u32> = enc.get_ids().to_vec();
        ids.truncate(max_len - 1);
        ids.push(self.eos_id);
        Ok(ids)
    }

    /// Encode and pad to exactly `max_len`.
    /// Returns (input_ids, attention_mask) where the mask is 1 for real tokens.
    pub fn encode_padded(&self, text: &str, max_len: usize) -> Result<(Vec<u32>, Vec<u32>)> {
        let mut ids  = self.encode(text, max_len)?;
        let mut mask = vec![1u32; ids.len()];
        ids.resize(max_len, self.pad_id);
        mask.resize(max_len, 0);
        Ok((ids, mask))
    }

    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map(|s| s.trim().to_string())
            .map_err(|e| anyhow!("Decode error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture_tokenizer;

    #[test]
    fn test_encode_appends_eos() {
        let tok = fixture_tokenizer();
        let ids = tok.encode("the cat sat", 16).unwrap();
        assert_eq!(ids.len(), 4);
        assert_eq!(*ids.last().unwrap(), tok.eos_id());
    }

    #[test]
    fn test_truncation_keeps_eos_within_limit() {
        let tok = fixture_tokenizer();
        let ids = tok.encode("the cat sat on the mat", 3).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[2], tok.eos_id());
    }

    #[test]
    fn test_encode_padded_has_exact_length() {
        let tok = fixture_tokenizer();
        let (ids, mask) = tok.encode_padded("the cat", 6).unwrap();
        assert_eq!(ids.len(), 6);
        assert_eq!(mask, vec![1, 1, 1, 0, 0, 0]);
        assert!(ids[3..].iter().all(|&id| id == tok.pad_id()));
    }

    #[test]
    fn test_decode_skips_special_tokens() {
        let tok = fixture_tokenizer();
        let (ids, _) = tok.encode_padded("the cat", 6).unwrap();
        assert_eq!(tok.decode(&ids).unwrap(), "the cat");
    }
}
