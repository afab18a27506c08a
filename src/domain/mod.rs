// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the system
// works with: dataset records, inference requests, and the
// seams between the data, model and application layers.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O or network calls
//   - Only plain structs, enums and traits

// Dataset records and the inference request payload
pub mod record;

// Core abstractions implemented by the other layers
pub mod traits;
