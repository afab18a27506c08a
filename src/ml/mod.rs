// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here:
//
//   config.rs     - T5Config, read from the pretrained config.json
//   position.rs   - relative position bucketing
//   model.rs      - T5 encoder-decoder modules
//   loss.rs       - cross entropy that skips -100 labels
//   generation.rs - beam search over a StepScorer
//   trainer.rs    - AdamW fine-tuning loop with checkpoints
//   inferencer.rs - model dir → summary text
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Raffel et al. (2020) T5 paper

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// GPU backend (Vulkan / Metal / DX12 through wgpu)
pub type GpuBackend = burn::backend::Wgpu;

/// CPU backend
pub type CpuBackend = burn::backend::NdArray;

// ─── ComputeBackend ───────────────────────────────────────────────────────────
// Runtime choice between the two backends. Training wraps the
// chosen one in Autodiff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeBackend {
    #[default]
    Wgpu,
    Ndarray,
}

impl FromStr for ComputeBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wgpu" | "gpu" => Ok(Self::Wgpu),
            "ndarray" | "cpu" => Ok(Self::Ndarray),
            other => Err(format!("unknown backend '{other}' (expected 'wgpu' or 'ndarray')")),
        }
    }
}

impl fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wgpu    => f.write_str("wgpu"),
            Self::Ndarray => f.write_str("ndarray"),
        }
    }
}

/// Model hyperparameters from config.json
pub mod config;

/// T5 relative position buckets
pub mod position;

/// T5 encoder-decoder architecture
pub mod model;

/// Masked cross-entropy loss
pub mod loss;

/// Beam-search decoding
pub mod generation;

/// Fine-tuning loop with logging and checkpointing
pub mod trainer;

/// Inference engine: loads a model dir and summarizes text
pub mod inferencer;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_backend_names() {
        assert_eq!("wgpu".parse::<ComputeBackend>().unwrap(), ComputeBackend::Wgpu);
        assert_eq!("CPU".parse::<ComputeBackend>().unwrap(), ComputeBackend::Ndarray);
        assert!("cuda".parse::<ComputeBackend>().is_err());
        assert_eq!(ComputeBackend::Ndarray.to_string(), "ndarray");
        assert_eq!(ComputeBackend::default(), ComputeBackend::Wgpu);
    }
}
