// ============================================================
// Layer 2 - InferUseCase
// ============================================================
// One request per process:
//
//   Step 1: Read all of stdin and parse {"text": ...}
//   Step 2: Load the saved model directory
//   Step 3: Summarize the text
//   Step 4: Write the summary and a newline, then flush
//
// The request is validated before the model is loaded, and
// nothing is written until the summary is complete, so a
// failed request leaves the output empty.

use anyhow::{Context, Result};
use std::{
    io::{Read, Write},
    path::PathBuf,
};

use crate::domain::{record::SummaryRequest, traits::Summarizer};
use crate::ml::{generation::GenerationConfig, inferencer::load_summarizer, ComputeBackend};

pub struct InferUseCase {
    model_dir:  PathBuf,
    generation: GenerationConfig,
    backend:    ComputeBackend,
}

impl InferUseCase {
    pub fn new(model_dir: PathBuf, generation: GenerationConfig, backend: ComputeBackend) -> Self {
        Self { model_dir, generation, backend }
    }

    pub fn run<R: Read, W: Write>(&self, input: R, output: W) -> Result<()> {
        run_with(input, output, || {
            load_summarizer(&self.model_dir, self.generation.clone(), self.backend)
        })
    }
}

/// Parse the request, then build the summarizer with `load` and answer it.
pub fn run_with<R, W, S, F>(mut input: R, mut output: W, load: F) -> Result<()>
where
    R: Read,
    W: Write,
    S: Summarizer,
    F: FnOnce() -> Result<S>,
{
    let mut raw = String::new();
    input.read_to_string(&mut raw).context("Cannot read request from stdin")?;
    let request = SummaryRequest::from_json(&raw)
        .context("Invalid request: expected a JSON object with a string field 'text'")?;

    let summarizer = load()?;
    let summary = summarizer.summarize(&request.text)?;

    writeln!(output, "{summary}")?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FirstWords(usize);

    impl Summarizer for FirstWords {
        fn summarize(&self, text: &str) -> Result<String> {
            Ok(text.split_whitespace().take(self.0).collect::<Vec<_>>().join(" "))
        }
    }

    #[test]
    fn test_writes_one_newline_terminated_line() {
        let mut out = Vec::new();
        run_with(
            r#"{"text": "the budget plans were unveiled today"}"#.as_bytes(),
            &mut out,
            || Ok(FirstWords(3)),
        ).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "the budget plans\n");
    }

    #[test]
    fn test_malformed_json_writes_nothing_and_skips_loading() {
        let loaded = Cell::new(false);
        let mut out = Vec::new();
        let res = run_with("{not json".as_bytes(), &mut out, || {
            loaded.set(true);
            Ok(FirstWords(3))
        });
        assert!(res.is_err());
        assert!(out.is_empty());
        assert!(!loaded.get());
    }

    #[test]
    fn test_missing_text_field_writes_nothing() {
        let mut out = Vec::new();
        let res = run_with(r#"{"body": "x"}"#.as_bytes(), &mut out, || Ok(FirstWords(3)));
        assert!(res.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_load_failure_writes_nothing() {
        let mut out = Vec::new();
        let res = run_with(
            r#"{"text": "x"}"#.as_bytes(),
            &mut out,
            || -> Result<FirstWords> { anyhow::bail!("no model dir") },
        );
        assert!(res.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_saved_model_dir_answers_on_cpu() {
        use crate::infra::checkpoint::ModelDir;
        use crate::test_support::{fixture_tokenizer, tiny_config, TestBackend};

        let dir   = tempfile::tempdir().unwrap();
        let cfg   = tiny_config();
        let model = cfg.init::<TestBackend>(&Default::default());
        ModelDir::new(dir.path()).save(&model, &cfg, &fixture_tokenizer()).unwrap();

        let generation = GenerationConfig { num_beams: 2, ..Default::default() };
        let use_case   = InferUseCase::new(dir.path().to_path_buf(), generation, ComputeBackend::Ndarray);
        let mut out = Vec::new();
        use_case.run(r#"{"text": "the cat sat on the mat"}"#.as_bytes(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);
    }

    #[test]
    fn test_missing_model_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = InferUseCase::new(
            dir.path().join("saved_model"),
            GenerationConfig::default(),
            ComputeBackend::Ndarray,
        );
        let mut out = Vec::new();
        assert!(use_case.run(r#"{"text": "x"}"#.as_bytes(), &mut out).is_err());
        assert!(out.is_empty());
    }
}
