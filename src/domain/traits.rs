// ============================================================
// Layer 3 - Core Traits
// ============================================================
// The application layer talks to datasets and models through
// these traits, so a local JSONL file and the remote rows API
// are interchangeable, and so is any summariser backend.

use anyhow::Result;

use crate::domain::record::ArticleRecord;

// ─── ArticleSource ────────────────────────────────────────────────────────────
/// Any component that can produce summarization training records.
///
/// Implementations:
///   - JsonlLoader    → a local JSON Lines file
///   - HubRowsLoader  → a dataset split fetched from the hub (cached as JSONL)
pub trait ArticleSource {
    /// Load every record of this source, in order.
    fn load_all(&self) -> Result<Vec<ArticleRecord>>;
}

// ─── Summarizer ───────────────────────────────────────────────────────────────
/// Any component that turns a text into a summary.
pub trait Summarizer {
    fn summarize(&self, text: &str) -> Result<String>;
}

impl<S: Summarizer + ?Sized> Summarizer for Box<S> {
    fn summarize(&self, text: &str) -> Result<String> {
        (**self).summarize(text)
    }
}
