// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `infer`, and all
// their configurable flags. Defaults fine-tune t5-small on 1%
// of CNN/DailyMail 3.0.0 and save next to the executable, where
// `infer` looks by default.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;
use crate::infra::checkpoint::default_model_dir;
use crate::ml::ComputeBackend;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune a pretrained T5 model for summarization
    Train(TrainArgs),

    /// Read {"text": ...} from stdin and print its summary
    Infer(InferArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Pretrained model: hub repo id or local directory
    #[arg(long = "model", default_value = "t5-small")]
    pub model_name: String,

    /// Hub dataset repo id
    #[arg(long, default_value = "abisee/cnn_dailymail")]
    pub dataset: String,

    /// Dataset configuration name
    #[arg(long, default_value = "3.0.0")]
    pub dataset_config: String,

    /// Split with optional slice, e.g. "train[:1%]" or "train[100:500]"
    #[arg(long, default_value = "train[:1%]")]
    pub split: String,

    /// Train on a local JSON Lines file instead of the hub dataset
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// Row field holding the article
    #[arg(long, default_value = "article")]
    pub text_column: String,

    /// Row field holding the reference summary
    #[arg(long, default_value = "highlights")]
    pub summary_column: String,

    /// Input tokens per sample, "summarize: " prefix and </s> included
    #[arg(long, default_value_t = 512)]
    pub max_source_len: usize,

    /// Target tokens per sample, </s> included
    #[arg(long, default_value_t = 64)]
    pub max_target_len: usize,

    #[arg(long, default_value_t = 1)]
    pub epochs: usize,

    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,

    /// Peak learning rate; decays linearly to 0
    #[arg(long, default_value_t = 5e-5)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 0.0)]
    pub weight_decay: f64,

    #[arg(long, default_value_t = 1e-8)]
    pub adam_epsilon: f64,

    /// Gradient norm clipping threshold
    #[arg(long, default_value_t = 1.0)]
    pub max_grad_norm: f64,

    /// Shuffle seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Log mean loss every N steps
    #[arg(long, default_value_t = 100)]
    pub logging_steps: usize,

    /// Save a checkpoint every N steps
    #[arg(long, default_value_t = 500)]
    pub save_steps: usize,

    /// Keep at most N checkpoints (0 keeps all)
    #[arg(long, default_value_t = 1)]
    pub save_total_limit: usize,

    /// Where checkpoints and train_config.json are written
    #[arg(long, default_value = "results")]
    pub output_dir: PathBuf,

    /// Where metrics.csv is written
    #[arg(long, default_value = "logs")]
    pub logging_dir: PathBuf,

    /// Final model directory consumed by `infer` [default: saved_model next to the executable]
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Download cache for models and dataset rows
    #[arg(long, env = "SUMMARIZER_CACHE_DIR", default_value = "hf_cache")]
    pub cache_dir: PathBuf,

    /// Beam width for the post-training test summary
    #[arg(long, default_value_t = 4)]
    pub num_beams: usize,

    /// Tensor backend: wgpu (GPU) or ndarray (CPU)
    #[arg(long, default_value_t = ComputeBackend::Wgpu)]
    pub backend: ComputeBackend,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            model_name:       a.model_name,
            dataset:          a.dataset,
            dataset_config:   a.dataset_config,
            split:            a.split,
            data_file:        a.data_file,
            text_column:      a.text_column,
            summary_column:   a.summary_column,
            max_source_len:   a.max_source_len,
            max_target_len:   a.max_target_len,
            epochs:           a.epochs,
            batch_size:       a.batch_size,
            learning_rate:    a.learning_rate,
            weight_decay:     a.weight_decay,
            adam_epsilon:     a.adam_epsilon,
            max_grad_norm:    a.max_grad_norm,
            seed:             a.seed,
            logging_steps:    a.logging_steps,
            save_steps:       a.save_steps,
            save_total_limit: Some(a.save_total_limit),
            output_dir:       a.output_dir,
            logging_dir:      a.logging_dir,
            save_dir:         a.save_dir.unwrap_or_else(default_model_dir),
            cache_dir:        a.cache_dir,
            num_beams:        a.num_beams,
            backend:          a.backend,
        }
    }
}

/// All arguments for the `infer` command
#[derive(Args, Debug)]
pub struct InferArgs {
    /// Saved model directory [default: saved_model next to the executable]
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 4)]
    pub num_beams: usize,

    /// Tensor backend: wgpu (GPU) or ndarray (CPU)
    #[arg(long, default_value_t = ComputeBackend::Wgpu)]
    pub backend: ComputeBackend,
}

impl InferArgs {
    pub fn resolve_model_dir(&self) -> PathBuf {
        self.model_dir.clone().unwrap_or_else(default_model_dir)
    }
}
