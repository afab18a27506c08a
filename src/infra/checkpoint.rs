// ============================================================
// Layer 6 - Model Directories and Checkpoints
// ============================================================
// Saves and restores model weights using Burn's named
// MessagePack recorder at full precision, so a reloaded model
// reproduces the saved one bit for bit.
//
// A model directory (what `infer` loads):
//   saved_model/
//     model.mpk         ← all learned parameters
//     config.json       ← T5Config, needed to rebuild the module tree
//     tokenizer.json    ← vocabulary the weights were trained with
//
// Training checkpoints (written every `save_steps`):
//   results/
//     checkpoint-500/
//       model.mpk
//       config.json
//       tokenizer.json
//       trainer_state.json   ← step, epoch, log history
//     train_config.json      ← hyperparameters of the run
//
// At most `save_total_limit` checkpoint directories are kept;
// the oldest are deleted first.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::data::tokenizer::SummaryTokenizer;
use crate::infra::{metrics::StepMetrics, tokenizer_store::TokenizerStore};
use crate::ml::{config::T5Config, model::SummarizerModel};

const MODEL_STEM:  &str = "model";
const CONFIG_FILE: &str = "config.json";
const STATE_FILE:  &str = "trainer_state.json";
const CHECKPOINT_PREFIX: &str = "checkpoint-";

/// Name of the model directory `train` writes and `infer` reads.
pub const DEFAULT_MODEL_DIR: &str = "saved_model";

/// `saved_model` beside the running executable, falling back to the
/// working directory when the executable path is unknown.
pub fn default_model_dir() -> PathBuf {
    match std::env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join(DEFAULT_MODEL_DIR))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR)),
        Err(e) => {
            tracing::warn!("Cannot locate the running executable ({e}); using './{DEFAULT_MODEL_DIR}'");
            PathBuf::from(DEFAULT_MODEL_DIR)
        }
    }
}

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

// ─── ModelDir ─────────────────────────────────────────────────────────────────
/// A self-contained saved model: weights, config and tokenizer.
pub struct ModelDir {
    dir: PathBuf,
}

impl ModelDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn save<B: Backend>(
        &self,
        model:     &SummarizerModel<B>,
        config:    &T5Config,
        tokenizer: &SummaryTokenizer,
    ) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create model dir '{}'", self.dir.display()))?;

        // The recorder appends the .mpk extension itself
        let weights = self.dir.join(MODEL_STEM);
        recorder()
            .record(model.clone().into_record(), weights.clone())
            .with_context(|| format!("Failed to save weights to '{}'", weights.display()))?;

        config.save(&self.dir.join(CONFIG_FILE))?;
        TokenizerStore::new(&self.dir).save(tokenizer.inner())?;

        tracing::debug!("Saved model dir '{}'", self.dir.display());
        Ok(())
    }

    /// Rebuild the model from `config.json`, then restore its weights.
    pub fn load<B: Backend>(&self, device: &B::Device) -> Result<(SummarizerModel<B>, T5Config, SummaryTokenizer)> {
        anyhow::ensure!(
            self.dir.is_dir(),
            "Model directory '{}' does not exist. Have you run 'train' first?",
            self.dir.display()
        );

        let config    = T5Config::load(&self.dir.join(CONFIG_FILE))?;
        let tokenizer = TokenizerStore::new(&self.dir).load()?;
        let tokenizer = SummaryTokenizer::new(tokenizer, config.pad_token_id, config.eos_token_id);

        let weights = self.dir.join(MODEL_STEM);
        let record  = recorder()
            .load(weights.clone(), device)
            .with_context(|| format!("Cannot load weights '{}'", weights.display()))?;
        let model = config.init::<B>(device).load_record(record);

        tracing::info!("Model loaded from '{}'", self.dir.display());
        Ok((model, config, tokenizer))
    }
}

// ─── Trainer state ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainerState {
    pub global_step: usize,
    pub epoch:       f64,
    pub max_steps:   usize,
    pub log_history: Vec<StepMetrics>,
}

// ─── CheckpointManager ────────────────────────────────────────────────────────
/// Writes numbered checkpoints under the run's output directory.
pub struct CheckpointManager {
    output_dir:       PathBuf,
    save_total_limit: Option<usize>,
}

impl CheckpointManager {
    pub fn new(output_dir: impl Into<PathBuf>, save_total_limit: Option<usize>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Cannot create output dir '{}'", output_dir.display()))?;
        Ok(Self { output_dir, save_total_limit })
    }

    /// Save a checkpoint for `state.global_step` and prune old ones.
    pub fn save<B: Backend>(
        &self,
        model:     &SummarizerModel<B>,
        config:    &T5Config,
        tokenizer: &SummaryTokenizer,
        state:     &TrainerState,
    ) -> Result<PathBuf> {
        let dir = self.output_dir.join(format!("{CHECKPOINT_PREFIX}{}", state.global_step));
        ModelDir::new(&dir).save(model, config, tokenizer)?;

        let state_path = dir.join(STATE_FILE);
        fs::write(&state_path, serde_json::to_string_pretty(state)?)
            .with_context(|| format!("Cannot write '{}'", state_path.display()))?;
        tracing::info!("Saved checkpoint '{}'", dir.display());

        self.rotate()?;
        Ok(dir)
    }

    pub fn load_state(checkpoint: &Path) -> Result<TrainerState> {
        let path = checkpoint.join(STATE_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save the run's hyperparameters next to its checkpoints.
    pub fn save_train_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.output_dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Existing checkpoint steps, ascending.
    pub fn checkpoint_steps(&self) -> Result<Vec<usize>> {
        let mut steps = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(step) = name.to_str().and_then(parse_checkpoint_step) {
                steps.push(step);
            }
        }
        steps.sort_unstable();
        Ok(steps)
    }

    fn rotate(&self) -> Result<()> {
        for step in checkpoints_to_prune(self.checkpoint_steps()?, self.save_total_limit) {
            let dir = self.output_dir.join(format!("{CHECKPOINT_PREFIX}{step}"));
            tracing::info!("Deleting older checkpoint '{}' due to save_total_limit", dir.display());
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Cannot delete '{}'", dir.display()))?;
        }
        Ok(())
    }
}

/// "checkpoint-500" → Some(500)
pub fn parse_checkpoint_step(name: &str) -> Option<usize> {
    name.strip_prefix(CHECKPOINT_PREFIX)?.parse().ok()
}

/// Oldest steps to delete so that at most `limit` remain.
/// No limit, or a limit of zero, keeps everything.
pub fn checkpoints_to_prune(mut steps: Vec<usize>, limit: Option<usize>) -> Vec<usize> {
    let Some(limit) = limit.filter(|&l| l > 0) else {
        return Vec::new();
    };
    steps.sort_unstable();
    let excess = steps.len().saturating_sub(limit);
    steps.truncate(excess);
    steps
}
