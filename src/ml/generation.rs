// ============================================================
// Layer 5 - Beam Search Generation
// ============================================================
// Decodes a summary one token at a time while keeping the
// `num_beams` best partial sequences alive:
//
//   1. start from a single beam holding the decoder start token
//   2. score every (beam, next token) pair by cumulative log-prob
//   3. keep the best 2 * num_beams candidates, in order:
//        eos candidate ranked < num_beams → finished hypothesis
//        any other token                   → next open beam
//   4. stop once num_beams hypotheses are finished (early
//      stopping) or the sequence reaches max_length
//   5. open beams left at max_length are finalized as hypotheses
//
// Hypotheses are ranked by sum_logprobs / len^length_penalty,
// where len counts the start token but not eos.
//
// The search itself only sees a `StepScorer`, so it runs the
// same against the real model and against synthetic scorers.
//
// Reference: Wiseman & Rush (2016), Hugging Face `generate()`

use anyhow::{anyhow, Result};
use burn::{prelude::*, tensor::activation::log_softmax};

use crate::ml::model::SummarizerModel;

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub num_beams:      usize,
    pub early_stopping: bool,
    pub length_penalty: f32,
    /// Summary budget as a fraction of the input token count.
    pub length_ratio:   f64,
    /// Lower bound on the summary budget.
    pub min_budget:     usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_beams:      4,
            early_stopping: true,
            length_penalty: 1.0,
            length_ratio:   0.35,
            min_budget:     20,
        }
    }
}

impl GenerationConfig {
    /// max(min_budget, floor(length_ratio * input_tokens))
    pub fn summary_budget(&self, input_tokens: usize) -> usize {
        let scaled = (input_tokens as f64 * self.length_ratio) as usize;
        scaled.max(self.min_budget)
    }
}

// ─── Scorer seam ──────────────────────────────────────────────────────────────
/// Produces next-token log-probabilities for a batch of equal-length prefixes.
pub trait StepScorer {
    fn next_log_probs(&mut self, prefixes: &[Vec<u32>]) -> Result<Vec<Vec<f32>>>;
}

// ─── Finished hypotheses ──────────────────────────────────────────────────────
/// The `num_beams` best finished sequences seen so far.
#[derive(Debug)]
pub struct BeamHypotheses {
    capacity:       usize,
    length_penalty: f32,
    early_stopping: bool,
    /// (normalised score, tokens including the start token)
    finished:       Vec<(f32, Vec<u32>)>,
}

impl BeamHypotheses {
    pub fn new(capacity: usize, length_penalty: f32, early_stopping: bool) -> Self {
        Self { capacity, length_penalty, early_stopping, finished: Vec::with_capacity(capacity + 1) }
    }

    pub fn add(&mut self, tokens: Vec<u32>, sum_logprobs: f32) {
        let score = sum_logprobs / (tokens.len() as f32).powf(self.length_penalty);
        if self.finished.len() < self.capacity || score > self.worst_score() {
            self.finished.push((score, tokens));
            if self.finished.len() > self.capacity {
                let worst = self
                    .finished
                    .iter()
                    .enumerate()
                    .min_by(|a, b| a.1 .0.total_cmp(&b.1 .0))
                    .map(|(i, _)| i);
                if let Some(i) = worst {
                    self.finished.remove(i);
                }
            }
        }
    }

    /// Whether no open beam can still improve the finished set.
    pub fn is_done(&self, best_open_sum: f32, cur_len: usize) -> bool {
        if self.finished.len() < self.capacity {
            return false;
        }
        if self.early_stopping {
            return true;
        }
        let best_possible = best_open_sum / (cur_len as f32).powf(self.length_penalty);
        self.worst_score() >= best_possible
    }

    pub fn best(self) -> Option<Vec<u32>> {
        self.finished
            .into_iter()
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, tokens)| tokens)
    }

    fn worst_score(&self) -> f32 {
        self.finished
            .iter()
            .map(|(s, _)| *s)
            .fold(f32::INFINITY, f32::min)
    }
}

// ─── Search ───────────────────────────────────────────────────────────────────
/// Returns the best sequence without the start token and without eos.
pub fn beam_search<S: StepScorer>(
    scorer:     &mut S,
    start_id:   u32,
    eos_id:     u32,
    max_length: usize,
    cfg:        &GenerationConfig,
) -> Result<Vec<u32>> {
    anyhow::ensure!(cfg.num_beams > 0, "num_beams must be at least 1");

    let mut hyps  = BeamHypotheses::new(cfg.num_beams, cfg.length_penalty, cfg.early_stopping);
    let mut beams = vec![(vec![start_id], 0.0f32)];
    let mut cur_len = 1;
    let mut done    = false;

    while cur_len < max_length {
        let prefixes: Vec<Vec<u32>> = beams.iter().map(|(t, _)| t.clone()).collect();
        let log_probs = scorer.next_log_probs(&prefixes)?;
        anyhow::ensure!(
            log_probs.len() == beams.len(),
            "Scorer returned {} rows for {} beams", log_probs.len(), beams.len()
        );

        // The global top 2n is always inside the union of each beam's top 2n.
        let width = 2 * cfg.num_beams;
        let mut candidates: Vec<(f32, usize, u32)> = Vec::with_capacity(width * beams.len());
        for (b, row) in log_probs.iter().enumerate() {
            for (token, lp) in top_k(row, width) {
                candidates.push((beams[b].1 + lp, b, token));
            }
        }
        candidates.sort_by(|x, y| y.0.total_cmp(&x.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));
        candidates.truncate(width);

        let mut next = Vec::with_capacity(cfg.num_beams);
        for (rank, (score, b, token)) in candidates.into_iter().enumerate() {
            if token == eos_id {
                if rank < cfg.num_beams {
                    hyps.add(beams[b].0.clone(), score);
                }
            } else {
                let mut tokens = beams[b].0.clone();
                tokens.push(token);
                next.push((tokens, score));
            }
            if next.len() == cfg.num_beams {
                break;
            }
        }

        cur_len += 1;
        let best_open = next.first().map(|(_, s)| *s).unwrap_or(f32::NEG_INFINITY);
        if next.is_empty() || hyps.is_done(best_open, cur_len) {
            done = true;
            break;
        }
        beams = next;
    }

    if !done {
        for (tokens, score) in beams {
            hyps.add(tokens, score);
        }
    }

    let best = hyps.best().ok_or_else(|| anyhow!("Beam search produced no hypothesis"))?;
    Ok(best.into_iter().skip(1).filter(|&t| t != eos_id).collect())
}

/// Indices and values of the k largest entries, best first.
fn top_k(row: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut ranked: Vec<(u32, f32)> = row.iter().enumerate().map(|(i, &v)| (i as u32, v)).collect();
    let k = k.min(ranked.len());
    if k == 0 {
        return Vec::new();
    }
    let order = |a: &(u32, f32), b: &(u32, f32)| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0));
    ranked.select_nth_unstable_by(k - 1, order);
    ranked.truncate(k);
    ranked.sort_by(order);
    ranked
}

// ─── Model-backed scorer ──────────────────────────────────────────────────────
/// Runs the encoder once and the decoder over the full prefix at every step.
pub struct ModelScorer<'a, B: Backend> {
    model:          &'a SummarizerModel<B>,
    encoder_out:    Tensor<B, 3>,       // [1, src_len, d_model]
    attention_mask: Tensor<B, 2, Int>,  // [1, src_len]
}

impl<'a, B: Backend> ModelScorer<'a, B> {
    pub fn new(model: &'a SummarizerModel<B>, input_ids: &[u32], device: &B::Device) -> Self {
        let len  = input_ids.len();
        let ids: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
        let ids  = Tensor::<B, 2, Int>::from_data(TensorData::new(ids, [1, len]), device);
        let mask = Tensor::<B, 2, Int>::ones([1, len], device);
        let encoder_out = model.encode(ids, mask.clone());
        Self { model, encoder_out, attention_mask: mask }
    }
}

impl<B: Backend> StepScorer for ModelScorer<'_, B> {
    fn next_log_probs(&mut self, prefixes: &[Vec<u32>]) -> Result<Vec<Vec<f32>>> {
        let n   = prefixes.len();
        let len = prefixes.first().map(Vec::len).unwrap_or(0);
        anyhow::ensure!(n > 0 && len > 0, "Empty decoder prefix batch");
        anyhow::ensure!(prefixes.iter().all(|p| p.len() == len), "Decoder prefixes differ in length");

        let device = self.encoder_out.device();
        let flat: Vec<i64> = prefixes.iter().flatten().map(|&id| id as i64).collect();
        let decoder_ids = Tensor::<B, 2, Int>::from_data(TensorData::new(flat, [n, len]), &device);
        let encoder_out = Tensor::cat(vec![self.encoder_out.clone(); n], 0);
        let mask        = Tensor::cat(vec![self.attention_mask.clone(); n], 0);

        let logits = self.model.decode(decoder_ids, encoder_out, mask);   // [n, len, vocab]
        let [_, _, vocab] = logits.dims();
        let last = logits.slice([0..n, len - 1..len, 0..vocab]).reshape([n, vocab]);

        let values = log_softmax(last, 1)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Cannot read decoder output: {e:?}"))?;
        Ok(values.chunks(vocab).map(<[f32]>::to_vec).collect())
    }
}
