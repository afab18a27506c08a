// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any one layer:
//
//   hub.rs             - Resolves pretrained files and dataset
//                        rows by name, with an on-disk cache.
//
//   pretrained.rs      - Imports PyTorch checkpoint weights into
//                        the Burn model via a key-remap table.
//
//   checkpoint.rs      - Model directories (weights + config +
//                        tokenizer) and rotating step checkpoints.
//
//   tokenizer_store.rs - tokenizer.json persistence.
//
//   metrics.rs         - Step-level training metrics CSV.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model hub downloads and dataset rows
pub mod hub;

/// PyTorch weight import
pub mod pretrained;

/// Model directory and checkpoint saving/loading
pub mod checkpoint;

/// Tokenizer loading and saving
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
