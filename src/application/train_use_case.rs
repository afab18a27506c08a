// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates the full fine-tuning pipeline in order:
//
//   Step 1: Resolve tokenizer, config, weights  (Layer 6 - infra)
//   Step 2: Load the dataset split              (Layer 4 - data)
//   Step 3: Preprocess into samples             (Layer 4 - data)
//   Step 4: Save the run config                 (Layer 6 - infra)
//   Step 5: Run the training loop               (Layer 5 - ml)
//   Step 6: Save the model directory            (Layer 6 - infra)
//
// After saving, `smoke_test` reloads the model directory from
// disk and summarizes a fixed passage, proving the saved
// artefacts are self-contained.
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{
    dataset::SummaryDataset,
    loader::{Columns, HubRowsLoader, JsonlLoader},
    preprocessor::Seq2SeqPreprocessor,
    split::SplitSelection,
    tokenizer::SummaryTokenizer,
};
use crate::domain::{
    record::ArticleRecord,
    traits::{ArticleSource, Summarizer},
};
use crate::infra::{
    checkpoint::{default_model_dir, CheckpointManager, ModelDir},
    hub::HubClient,
    metrics::MetricsLogger,
    tokenizer_store,
};
use crate::ml::{
    config::T5Config,
    generation::GenerationConfig,
    inferencer::load_summarizer,
    trainer::run_training,
    ComputeBackend,
    CpuBackend,
    GpuBackend,
};
use burn::{backend::Autodiff, tensor::backend::AutodiffBackend};

/// Passage summarized after training to check the saved model end to end.
pub const TEST_PASSAGE: &str = "The Scottish government has unveiled its latest budget plans, \
    outlining how public money will be spent in the year ahead. \
    The finance secretary set out the proposals at Holyrood earlier.";

// ─── Training Configuration ──────────────────────────────────────────────────
// Every knob of a run. Saved as train_config.json in the output dir.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Hub repo id or local directory of the pretrained model
    pub model_name:     String,
    pub dataset:        String,
    pub dataset_config: String,
    pub split:          String,
    /// Local JSONL file used instead of the hub dataset
    pub data_file:      Option<PathBuf>,
    pub text_column:    String,
    pub summary_column: String,

    pub max_source_len: usize,
    pub max_target_len: usize,

    pub epochs:        usize,
    pub batch_size:    usize,
    pub learning_rate: f64,
    pub weight_decay:  f64,
    pub adam_epsilon:  f64,
    pub max_grad_norm: f64,
    pub seed:          u64,

    pub logging_steps:    usize,
    pub save_steps:       usize,
    pub save_total_limit: Option<usize>,

    pub output_dir:  PathBuf,
    pub logging_dir: PathBuf,
    pub save_dir:    PathBuf,
    pub cache_dir:   PathBuf,

    pub num_beams: usize,
    /// Backend for fine-tuning and the post-training summary
    pub backend:   ComputeBackend,
}

impl Default for TrainConfig {
    fn default() -> Self {
        let columns = Columns::default();
        Self {
            model_name:       "t5-small".to_string(),
            dataset:          "abisee/cnn_dailymail".to_string(),
            dataset_config:   "3.0.0".to_string(),
            split:            "train[:1%]".to_string(),
            data_file:        None,
            text_column:      columns.text,
            summary_column:   columns.summary,
            max_source_len:   512,
            max_target_len:   64,
            epochs:           1,
            batch_size:       4,
            learning_rate:    5e-5,
            weight_decay:     0.0,
            adam_epsilon:     1e-8,
            max_grad_norm:    1.0,
            seed:             42,
            logging_steps:    100,
            save_steps:       500,
            save_total_limit: Some(1),
            output_dir:       PathBuf::from("results"),
            logging_dir:      PathBuf::from("logs"),
            save_dir:         default_model_dir(),
            cache_dir:        PathBuf::from("hf_cache"),
            num_beams:        4,
            backend:          ComputeBackend::default(),
        }
    }
}

impl TrainConfig {
    fn columns(&self) -> Columns {
        Columns { text: self.text_column.clone(), summary: self.summary_column.clone() }
    }
}

/// Everything a fine-tuning run needs besides the dataset.
struct FineTuneRun<'a> {
    model_cfg: &'a T5Config,
    weights:   &'a Path,
    tokenizer: &'a SummaryTokenizer,
    ckpt:      &'a CheckpointManager,
    metrics:   &'a MetricsLogger,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline; returns the saved model directory.
    pub fn execute(&self) -> Result<PathBuf> {
        let cfg = &self.config;

        // ── Step 1: Pretrained artefacts by name ─────────────────────────────
        let hub = HubClient::new(&cfg.cache_dir)?;
        tracing::info!("Loading pretrained model '{}'", cfg.model_name);
        let model_cfg = T5Config::load(&hub.model_file(&cfg.model_name, "config.json")?)?;
        let tokenizer = tokenizer_store::load_file(&hub.model_file(&cfg.model_name, "tokenizer.json")?)?;
        let tokenizer = SummaryTokenizer::new(tokenizer, model_cfg.pad_token_id, model_cfg.eos_token_id);
        let weights   = hub.model_file(&cfg.model_name, "pytorch_model.bin")?;

        // ── Step 2: Dataset records ───────────────────────────────────────────
        let records = self.load_records(&hub)?;
        anyhow::ensure!(!records.is_empty(), "The selected dataset split has no rows");

        // ── Step 3: Tokenise into fixed-length samples ────────────────────────
        let samples = Seq2SeqPreprocessor::new(
            &tokenizer,
            cfg.max_source_len,
            cfg.max_target_len,
            model_cfg.decoder_start_token_id,
        )
        .process_all(&records)?;
        let dataset = SummaryDataset::new(samples);

        // ── Step 4: Record the run configuration ──────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.output_dir, cfg.save_total_limit)?;
        ckpt.save_train_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.logging_dir)?;

        // ── Steps 5-6: Fine-tune (Layer 5), then save the model dir ─────────
        let run = FineTuneRun {
            model_cfg: &model_cfg,
            weights:   &weights,
            tokenizer: &tokenizer,
            ckpt:      &ckpt,
            metrics:   &metrics,
        };
        match cfg.backend {
            ComputeBackend::Wgpu    => self.fine_tune::<Autodiff<GpuBackend>>(run, dataset, &Default::default())?,
            ComputeBackend::Ndarray => self.fine_tune::<Autodiff<CpuBackend>>(run, dataset, &Default::default())?,
        }
        tracing::info!("Model saved to '{}'", cfg.save_dir.display());
        Ok(cfg.save_dir.clone())
    }

    fn fine_tune<B: AutodiffBackend>(
        &self,
        run:     FineTuneRun<'_>,
        dataset: SummaryDataset,
        device:  &B::Device,
    ) -> Result<()> {
        let cfg   = &self.config;
        let model = run_training::<B>(
            cfg, run.model_cfg, run.weights, run.tokenizer, dataset, run.ckpt, run.metrics, device,
        )?;
        // Weights + config + tokenizer together
        ModelDir::new(&cfg.save_dir).save(&model, run.model_cfg, run.tokenizer)
    }

    /// Reload `model_dir` from disk and summarize TEST_PASSAGE.
    pub fn smoke_test(&self, model_dir: &Path) -> Result<String> {
        tracing::info!("Reloading model from '{}'", model_dir.display());
        let generation = GenerationConfig { num_beams: self.config.num_beams, ..Default::default() };
        load_summarizer(model_dir, generation, self.config.backend)?.summarize(TEST_PASSAGE)
    }

    fn load_records(&self, hub: &HubClient) -> Result<Vec<ArticleRecord>> {
        let cfg = &self.config;
        match &cfg.data_file {
            Some(path) => JsonlLoader::new(path, cfg.columns()).load_all(),
            None => {
                let split = SplitSelection::parse(&cfg.split)
                    .with_context(|| format!("Invalid split '{}'", cfg.split))?;
                HubRowsLoader::new(hub, &cfg.dataset, &cfg.dataset_config, split, cfg.columns())
                    .load_all()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_t5_small_cnn_dailymail() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.model_name, "t5-small");
        assert_eq!(cfg.split, "train[:1%]");
        assert_eq!((cfg.max_source_len, cfg.max_target_len), (512, 64));
        assert_eq!((cfg.epochs, cfg.batch_size), (1, 4));
        assert_eq!(cfg.learning_rate, 5e-5);
        assert_eq!((cfg.logging_steps, cfg.save_steps, cfg.save_total_limit), (100, 500, Some(1)));
        assert_eq!(cfg.save_dir, default_model_dir());
        assert_eq!(cfg.backend, ComputeBackend::Wgpu);
    }

    #[test]
    fn test_train_config_is_saved_as_json() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path(), None).unwrap();
        ckpt.save_train_config(&TrainConfig::default()).unwrap();

        let json = std::fs::read_to_string(dir.path().join("train_config.json")).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dataset_config, "3.0.0");
        assert_eq!(back.seed, 42);
    }

    #[test]
    fn test_local_data_file_takes_precedence() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        std::fs::write(&path, "{\"article\": \"the cat sat\", \"highlights\": \"cat\"}\n").unwrap();

        let cfg = TrainConfig {
            data_file: Some(path),
            cache_dir: dir.path().join("cache"),
            ..TrainConfig::default()
        };
        let hub = HubClient::new(&cfg.cache_dir).unwrap();
        let records = TrainUseCase::new(cfg).load_records(&hub).unwrap();
        assert_eq!(records, vec![ArticleRecord::new("the cat sat", "cat")]);
    }
}
