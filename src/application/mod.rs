// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each:
// fine-tuning a model, or answering a single inference request.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing to the terminal (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The fine-tuning workflow
pub mod train_use_case;

// The stdin → stdout summarization workflow
pub mod infer_use_case;
