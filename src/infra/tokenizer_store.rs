// ============================================================
// Layer 6 - Tokenizer Store
// ============================================================
// Loads and saves `tokenizer.json` (Hugging Face fast-tokenizer
// format) inside a model directory. The pretrained T5
// SentencePiece vocabulary is used unchanged; nothing is
// trained here.

use anyhow::{anyhow, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tokenizers::Tokenizer;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn load(&self) -> Result<Tokenizer> {
        load_file(&self.path())
    }

    pub fn save(&self, tokenizer: &Tokenizer) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.path();
        tokenizer
            .save(&path, false)
            .map_err(|e| anyhow!("Cannot write tokenizer to '{}': {}", path.display(), e))?;
        tracing::debug!("Saved tokenizer to '{}'", path.display());
        Ok(())
    }
}

/// Load a tokenizer from an explicit `tokenizer.json` path.
pub fn load_file(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture_raw_tokenizer;

    #[test]
    fn test_save_then_load_encodes_identically() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path().join("model"));
        let tok   = fixture_raw_tokenizer();
        store.save(&tok).unwrap();

        let loaded = store.load().unwrap();
        let a = tok.encode("the cat sat on the mat", false).unwrap();
        let b = loaded.encode("the cat sat on the mat", false).unwrap();
        assert_eq!(a.get_ids(), b.get_ids());
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = TokenizerStore::new(dir.path()).load().unwrap_err();
        assert!(err.to_string().contains(TOKENIZER_FILE));
    }
}
