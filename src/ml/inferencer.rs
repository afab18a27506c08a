// ============================================================
// Layer 5 - Inferencer
// ============================================================
// Loads a saved model directory and turns text into a summary:
//
//   "summarize: " + text → ids (truncated to n_positions, </s>)
//   budget = max(20, floor(0.35 * len(ids)))
//   beam_search(max_length = budget) → ids → text
//
// The budget counts the prefix and </s> tokens, and max_length
// counts the decoder start token, as the pretrained generation
// routine does.

use anyhow::Result;
use burn::prelude::*;
use std::path::Path;

use crate::data::{preprocessor::TASK_PREFIX, tokenizer::SummaryTokenizer};
use crate::domain::traits::Summarizer;
use crate::infra::checkpoint::ModelDir;
use crate::ml::config::T5Config;
use crate::ml::generation::{beam_search, GenerationConfig, ModelScorer};
use crate::ml::model::SummarizerModel;
use crate::ml::{ComputeBackend, CpuBackend, GpuBackend};

pub struct Inferencer<B: Backend> {
    model:      SummarizerModel<B>,
    config:     T5Config,
    tokenizer:  SummaryTokenizer,
    generation: GenerationConfig,
    device:     B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(
        model:      SummarizerModel<B>,
        config:     T5Config,
        tokenizer:  SummaryTokenizer,
        generation: GenerationConfig,
        device:     B::Device,
    ) -> Self {
        Self { model, config, tokenizer, generation, device }
    }

    pub fn from_dir(dir: &Path, generation: GenerationConfig, device: B::Device) -> Result<Self> {
        let (model, config, tokenizer) = ModelDir::new(dir).load::<B>(&device)?;
        Ok(Self::new(model, config, tokenizer, generation, device))
    }

    /// Summary token ids for `text`, without start or eos tokens.
    pub fn generate_ids(&self, text: &str) -> Result<Vec<u32>> {
        let input = format!("{TASK_PREFIX}{text}");
        let ids = self.tokenizer.encode(&input, self.config.max_input_len())?;
        let max_length = self.generation.summary_budget(ids.len());
        tracing::debug!("Input tokens: {}, summary budget: {}", ids.len(), max_length);

        let mut scorer = ModelScorer::new(&self.model, &ids, &self.device);
        beam_search(
            &mut scorer,
            self.config.decoder_start_token_id,
            self.config.eos_token_id,
            max_length,
            &self.generation,
        )
    }
}

impl<B: Backend> Summarizer for Inferencer<B> {
    fn summarize(&self, text: &str) -> Result<String> {
        let ids = self.generate_ids(text)?;
        self.tokenizer.decode(&ids)
    }
}

/// Load `dir` onto the default device of `backend`.
pub fn load_summarizer(
    dir:        &Path,
    generation: GenerationConfig,
    backend:    ComputeBackend,
) -> Result<Box<dyn Summarizer>> {
    tracing::info!("Loading model dir '{}' on {}", dir.display(), backend);
    let summarizer: Box<dyn Summarizer> = match backend {
        ComputeBackend::Wgpu => {
            Box::new(Inferencer::<GpuBackend>::from_dir(dir, generation, Default::default())?)
        }
        ComputeBackend::Ndarray => {
            Box::new(Inferencer::<CpuBackend>::from_dir(dir, generation, Default::default())?)
        }
    };
    Ok(summarizer)
}
