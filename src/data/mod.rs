// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything from raw dataset rows to tensor batches.
//
//   rows API / .jsonl
//       │
//       ▼
//   Loader             → ArticleRecord { article, summary }
//       │                 (split slicing, on-disk cache)
//       ▼
//   Seq2SeqPreprocessor→ "summarize: " prefix, tokenise, pad,
//       │                 -100 labels, shifted decoder inputs
//       ▼
//   SummaryDataset     → implements Burn's Dataset trait
//       │
//       ▼
//   SummaryBatcher     → stacks samples into [batch, len] tensors
//       │
//       ▼
//   DataLoader         → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Dataset split expressions such as "train[:1%]"
pub mod split;

/// Local JSONL and hub rows loaders
pub mod loader;

/// Tokenizer wrapper with truncation / padding conventions
pub mod tokenizer;

/// Record → fixed-length training sample
pub mod preprocessor;

/// Implements Burn's Dataset trait for summary samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
