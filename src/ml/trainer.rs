// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Fine-tunes the pretrained model with Burn's DataLoader and
// AdamW:
//
//   - shuffled batches (fixed seed), one worker
//   - AdamW, weight decay 0, eps 1e-8
//   - gradient norm clipped to max_grad_norm
//   - learning rate decays linearly from lr to 0 over all
//     steps, no warmup
//   - mean loss logged every logging_steps
//   - checkpoint every save_steps, oldest pruned
//
// Generic over the autodiff backend: Autodiff<Wgpu> or
// Autodiff<NdArray>, picked at runtime by `--backend`.
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    grad_clipping::GradientClippingConfig,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::path::Path;

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::SummaryBatcher, dataset::SummaryDataset, tokenizer::SummaryTokenizer};
use crate::infra::{
    checkpoint::{CheckpointManager, TrainerState},
    metrics::{MetricsLogger, StepMetrics},
    pretrained::load_pretrained,
};
use crate::ml::{config::T5Config, model::SummarizerModel};

/// Learning rate for 0-indexed `step` out of `total` steps.
pub fn linear_decay(base: f64, step: usize, total: usize) -> f64 {
    if total == 0 {
        return base;
    }
    base * total.saturating_sub(step) as f64 / total as f64
}

/// Import pretrained weights onto `device` and fine-tune them.
#[allow(clippy::too_many_arguments)]
pub fn run_training<B: AutodiffBackend>(
    cfg:       &TrainConfig,
    model_cfg: &T5Config,
    weights:   &Path,
    tokenizer: &SummaryTokenizer,
    dataset:   SummaryDataset,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
    device:    &B::Device,
) -> Result<SummarizerModel<B>> {
    tracing::info!("Using {} device: {:?}", cfg.backend, device);
    let model = load_pretrained::<B>(weights, model_cfg, device)?;
    train_loop(cfg, model, model_cfg, tokenizer, dataset, ckpt, metrics, device)
}

#[allow(clippy::too_many_arguments)]
pub fn train_loop<B: AutodiffBackend>(
    cfg:       &TrainConfig,
    mut model: SummarizerModel<B>,
    model_cfg: &T5Config,
    tokenizer: &SummaryTokenizer,
    dataset:   SummaryDataset,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
    device:    &B::Device,
) -> Result<SummarizerModel<B>> {
    anyhow::ensure!(cfg.batch_size > 0, "batch_size must be at least 1");

    let samples         = dataset.sample_count();
    let steps_per_epoch = samples.div_ceil(cfg.batch_size);
    let total_steps     = steps_per_epoch * cfg.epochs;
    tracing::info!(
        "Training: {} samples, {} epochs, batch size {}, {} steps",
        samples, cfg.epochs, cfg.batch_size, total_steps
    );

    // ── AdamW optimiser ───────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g
    // v = β2*v + (1-β2)*g²
    // θ = θ - lr * (m / (√v + ε) + λθ)
    let optim_cfg = AdamWConfig::new()
        .with_epsilon(cfg.adam_epsilon as f32)
        .with_weight_decay(cfg.weight_decay as f32)
        .with_grad_clipping(Some(GradientClippingConfig::Norm(cfg.max_grad_norm as f32)));
    let mut optim = optim_cfg.init();

    // ── Data loader ───────────────────────────────────────────────────────────
    let batcher = SummaryBatcher::<B>::new(device.clone());
    let loader  = DataLoaderBuilder::new(batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(dataset);

    let mut state = TrainerState { max_steps: total_steps, ..Default::default() };
    let mut step         = 0usize;
    let mut window_loss  = 0.0f64;
    let mut window_steps = 0usize;
    let mut total_loss   = 0.0f64;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for _ in 0..cfg.epochs {
        for batch in loader.iter() {
            let lr = linear_decay(cfg.learning_rate, step, total_steps);

            let (loss, _) = model.forward_loss(
                batch.input_ids,
                batch.attention_mask,
                batch.decoder_input_ids,
                batch.labels,
            );
            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            if !loss_val.is_finite() {
                tracing::warn!("Non-finite loss at step {}", step + 1);
            }

            // Backward pass + AdamW update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);

            step         += 1;
            window_loss  += loss_val;
            window_steps += 1;
            total_loss   += loss_val;
            let epoch = step as f64 / steps_per_epoch as f64;

            if cfg.logging_steps > 0 && step % cfg.logging_steps == 0 {
                let m = StepMetrics::new(step, epoch, window_loss / window_steps as f64, lr);
                tracing::info!(
                    "step {:>6}/{} | epoch {:.2} | loss {:.4} | lr {:.3e}",
                    m.step, total_steps, m.epoch, m.loss, m.learning_rate
                );
                metrics.log(&m)?;
                state.log_history.push(m);
                window_loss  = 0.0;
                window_steps = 0;
            }

            if cfg.save_steps > 0 && step % cfg.save_steps == 0 {
                state.global_step = step;
                state.epoch       = epoch;
                ckpt.save(&model, model_cfg, tokenizer, &state)?;
            }
        }
    }

    let mean_loss = if step > 0 { total_loss / step as f64 } else { f64::NAN };
    tracing::info!("Training complete: {} steps, train_loss={:.4}", step, mean_loss);
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::preprocessor::Seq2SeqPreprocessor;
    use crate::domain::record::ArticleRecord;
    use crate::test_support::{fixture_tokenizer, tiny_config, TestAutodiffBackend};

    #[test]
    fn test_linear_decay() {
        assert_eq!(linear_decay(5e-5, 0, 100), 5e-5);
        assert!((linear_decay(5e-5, 50, 100) - 2.5e-5).abs() < 1e-12);
        assert_eq!(linear_decay(5e-5, 100, 100), 0.0);
        assert_eq!(linear_decay(5e-5, 150, 100), 0.0);
        assert_eq!(linear_decay(5e-5, 0, 0), 5e-5);
    }

    #[test]
    fn test_short_run_logs_and_checkpoints() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model_cfg = tiny_config();
        let tok       = fixture_tokenizer();

        let records = vec![
            ArticleRecord::new("the cat sat on the mat", "cat sat"),
            ArticleRecord::new("a dog ran on the mat", "dog ran"),
            ArticleRecord::new("the government plans public money", "budget plans"),
        ];
        let samples = Seq2SeqPreprocessor::new(&tok, 12, 6, model_cfg.decoder_start_token_id)
            .process_all(&records)
            .unwrap();

        let cfg = TrainConfig {
            batch_size:       2,
            learning_rate:    1e-3,
            logging_steps:    1,
            save_steps:       2,
            save_total_limit: Some(1),
            ..TrainConfig::default()
        };
        let ckpt    = CheckpointManager::new(dir.path().join("results"), cfg.save_total_limit).unwrap();
        let metrics = MetricsLogger::new(dir.path().join("logs")).unwrap();
        let model   = model_cfg.init::<TestAutodiffBackend>(&device);

        train_loop(
            &cfg, model, &model_cfg, &tok, SummaryDataset::new(samples),
            &ckpt, &metrics, &device,
        ).unwrap();

        // 3 samples / batch 2 → 2 steps, both logged
        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        let rows: Vec<&str> = csv.lines().skip(1).collect();
        assert_eq!(rows.len(), 2);
        for row in rows {
            let loss: f64 = row.split(',').nth(2).unwrap().parse().unwrap();
            assert!(loss.is_finite() && loss > 0.0);
        }
        assert_eq!(ckpt.checkpoint_steps().unwrap(), vec![2]);
    }
}
