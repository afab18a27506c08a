// ============================================================
// Layer 6 - Pretrained Weight Import
// ============================================================
// Loads a Hugging Face `pytorch_model.bin` into SummarizerModel
// with burn-import's PyTorch recorder. Parameter names differ
// between the two module trees, so keys are rewritten by a
// fixed list of regex remaps, applied in order:
//
//   encoder.block.3.layer.0.SelfAttention.q.weight
//     → encoder.block.3.self_attn.attention.q.weight
//   decoder.block.1.layer.1.EncDecAttention.k.weight
//     → decoder.block.1.cross_attn.attention.k.weight
//   decoder.block.0.layer.2.DenseReluDense.wi.weight
//     → decoder.block.0.ff.wi_0.weight
//   encoder.block.0.layer.0.SelfAttention.relative_attention_bias.weight
//     → encoder.relative_attention_bias.weight
//
// Layer norm weights become `gamma`. Keys with no counterpart
// (the per-stack `embed_tokens` copies, a tied `lm_head`) are
// ignored by the recorder.
//
// Reference: Burn Book §7 (Importing PyTorch models)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::path::Path;

use crate::ml::{config::T5Config, model::SummarizerModel};

/// (pattern, replacement) pairs, applied top to bottom.
pub fn key_remaps() -> Vec<(&'static str, &'static str)> {
    vec![
        // Position bias lives on the first layer only; must run before the SelfAttention rule.
        (
            r"^(encoder|decoder)\.block\.0\.layer\.0\.SelfAttention\.relative_attention_bias\.weight$",
            "${1}.relative_attention_bias.weight",
        ),
        (
            r"^(encoder|decoder)\.block\.(\d+)\.layer\.0\.SelfAttention\.",
            "${1}.block.${2}.self_attn.attention.",
        ),
        (
            r"^(encoder|decoder)\.block\.(\d+)\.layer\.0\.layer_norm\.weight$",
            "${1}.block.${2}.self_attn.layer_norm.gamma",
        ),
        (
            r"^decoder\.block\.(\d+)\.layer\.1\.EncDecAttention\.",
            "decoder.block.${1}.cross_attn.attention.",
        ),
        (
            r"^decoder\.block\.(\d+)\.layer\.1\.layer_norm\.weight$",
            "decoder.block.${1}.cross_attn.layer_norm.gamma",
        ),
        (
            r"^encoder\.block\.(\d+)\.layer\.1\.DenseReluDense\.",
            "encoder.block.${1}.ff.",
        ),
        (
            r"^decoder\.block\.(\d+)\.layer\.2\.DenseReluDense\.",
            "decoder.block.${1}.ff.",
        ),
        (
            r"^encoder\.block\.(\d+)\.layer\.1\.layer_norm\.weight$",
            "encoder.block.${1}.ff.layer_norm.gamma",
        ),
        (
            r"^decoder\.block\.(\d+)\.layer\.2\.layer_norm\.weight$",
            "decoder.block.${1}.ff.layer_norm.gamma",
        ),
        // T5 v1.0 has a single input projection `wi`
        (r"\.ff\.wi\.weight$", ".ff.wi_0.weight"),
        (
            r"^(encoder|decoder)\.final_layer_norm\.weight$",
            "${1}.final_layer_norm.gamma",
        ),
    ]
}

/// Build a model from `cfg` and fill it with the weights in `weights`.
pub fn load_pretrained<B: Backend>(
    weights: &Path,
    cfg:     &T5Config,
    device:  &B::Device,
) -> Result<SummarizerModel<B>> {
    tracing::info!("Importing pretrained weights from '{}'", weights.display());

    let args = key_remaps()
        .into_iter()
        .fold(LoadArgs::new(weights.to_path_buf()), |args, (pattern, replacement)| {
            args.with_key_remap(pattern, replacement)
        });

    let record = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(args, device)
        .with_context(|| format!("Cannot import PyTorch weights '{}'", weights.display()))?;

    Ok(cfg.init::<B>(device).load_record(record))
}
