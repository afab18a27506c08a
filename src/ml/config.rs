// ============================================================
// Layer 5 - T5 Model Configuration
// ============================================================
// Mirrors the `config.json` shipped with every pretrained T5
// checkpoint on the hub. Only the keys the model needs are
// typed; everything else (architectures, task_specific_params,
// ...) is kept in `extra` so a re-saved config stays complete.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

/// Rejected configurations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported feed_forward_proj '{0}' (expected 'relu' or 'gated-gelu')")]
    UnsupportedFeedForward(String),

    #[error("config field '{field}' must be greater than zero")]
    Zero { field: &'static str },

    #[error("{0} relative attention buckets cannot be split for bidirectional attention")]
    OddBuckets(usize),
}

/// Feed-forward variant of a T5 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedForwardKind {
    /// T5 v1.0: wo(relu(wi(x)))
    Relu,
    /// T5 v1.1 / Flan-T5: wo(gelu(wi_0(x)) * wi_1(x))
    GatedGelu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct T5Config {
    pub vocab_size: usize,
    pub d_model:    usize,
    pub d_kv:       usize,
    pub d_ff:       usize,
    pub num_layers: usize,
    #[serde(default)]
    pub num_decoder_layers: Option<usize>,
    pub num_heads: usize,

    #[serde(default = "default_buckets")]
    pub relative_attention_num_buckets: usize,
    #[serde(default = "default_max_distance")]
    pub relative_attention_max_distance: usize,

    #[serde(default = "default_dropout")]
    pub dropout_rate: f64,
    #[serde(default = "default_epsilon")]
    pub layer_norm_epsilon: f64,
    #[serde(default = "default_feed_forward")]
    pub feed_forward_proj: String,
    #[serde(default = "default_true")]
    pub tie_word_embeddings: bool,

    #[serde(default)]
    pub pad_token_id: u32,
    #[serde(default = "default_eos")]
    pub eos_token_id: u32,
    #[serde(default)]
    pub decoder_start_token_id: u32,

    /// Longest input the model was pretrained on.
    #[serde(default)]
    pub n_positions: Option<usize>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_buckets() -> usize { 32 }
fn default_max_distance() -> usize { 128 }
fn default_dropout() -> f64 { 0.1 }
fn default_epsilon() -> f64 { 1e-6 }
fn default_feed_forward() -> String { "relu".to_string() }
fn default_true() -> bool { true }
fn default_eos() -> u32 { 1 }

impl T5Config {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&json)
            .with_context(|| format!("Invalid model config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write model config '{}'", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("vocab_size", self.vocab_size),
            ("d_model", self.d_model),
            ("d_kv", self.d_kv),
            ("d_ff", self.d_ff),
            ("num_layers", self.num_layers),
            ("num_heads", self.num_heads),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.relative_attention_num_buckets < 2 || self.relative_attention_num_buckets % 2 != 0 {
            return Err(ConfigError::OddBuckets(self.relative_attention_num_buckets));
        }
        self.feed_forward()?;
        Ok(())
    }

    pub fn feed_forward(&self) -> Result<FeedForwardKind, ConfigError> {
        match self.feed_forward_proj.as_str() {
            "relu" => Ok(FeedForwardKind::Relu),
            "gated-gelu" => Ok(FeedForwardKind::GatedGelu),
            other => Err(ConfigError::UnsupportedFeedForward(other.to_string())),
        }
    }

    pub fn decoder_layers(&self) -> usize {
        self.num_decoder_layers.unwrap_or(self.num_layers)
    }

    pub fn inner_dim(&self) -> usize {
        self.num_heads * self.d_kv
    }

    /// Maximum number of input tokens fed to the encoder.
    pub fn max_input_len(&self) -> usize {
        self.n_positions.unwrap_or(512)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T5_SMALL: &str = r#"{
        "architectures": ["T5ForConditionalGeneration"],
        "d_ff": 2048, "d_kv": 64, "d_model": 512,
        "decoder_start_token_id": 0, "dropout_rate": 0.1, "eos_token_id": 1,
        "initializer_factor": 1.0, "is_encoder_decoder": true,
        "layer_norm_epsilon": 1e-06, "model_type": "t5",
        "n_positions": 512, "num_heads": 8, "num_layers": 6,
        "output_past": true, "pad_token_id": 0,
        "relative_attention_num_buckets": 32,
        "task_specific_params": {"summarization": {"prefix": "summarize: "}},
        "vocab_size": 32128
    }"#;

    #[test]
    fn test_parses_t5_small_config() {
        let cfg: T5Config = serde_json::from_str(T5_SMALL).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.d_model, 512);
        assert_eq!(cfg.decoder_layers(), 6);
        assert_eq!(cfg.inner_dim(), 512);
        assert_eq!(cfg.relative_attention_max_distance, 128);
        assert_eq!(cfg.feed_forward().unwrap(), FeedForwardKind::Relu);
        assert!(cfg.tie_word_embeddings);
        assert_eq!(cfg.max_input_len(), 512);
    }

    #[test]
    fn test_unknown_keys_survive_a_save() {
        let cfg: T5Config = serde_json::from_str(T5_SMALL).unwrap();
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        cfg.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["model_type"], "t5");
        assert_eq!(raw["task_specific_params"]["summarization"]["prefix"], "summarize: ");
        assert_eq!(T5Config::load(&path).unwrap().vocab_size, 32128);
    }

    #[test]
    fn test_rejects_unknown_feed_forward() {
        let mut cfg: T5Config = serde_json::from_str(T5_SMALL).unwrap();
        cfg.feed_forward_proj = "swiglu".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::UnsupportedFeedForward(_))));
    }

    #[test]
    fn test_rejects_zero_heads() {
        let mut cfg: T5Config = serde_json::from_str(T5_SMALL).unwrap();
        cfg.num_heads = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Zero { field: "num_heads" })));
    }
}
