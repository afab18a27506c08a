// ============================================================
// Layer 3 - Record Types
// ============================================================
// ArticleRecord is one row of a summarization dataset: a long
// free-text article and its human-written reference summary.
// The column names differ between datasets, so loaders map
// them onto these two fields.
//
// SummaryRequest is the JSON object read from stdin by the
// `infer` command: {"text": "..."}.

use serde::{Deserialize, Serialize};

/// A raw dataset row before any tokenisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// The source text to be summarised
    pub article: String,

    /// The reference summary used as the training target
    pub summary: String,
}

impl ArticleRecord {
    pub fn new(article: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            article: article.into(),
            summary: summary.into(),
        }
    }
}

/// Payload accepted on stdin by the inference command.
/// `text` is required; any other keys are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRequest {
    pub text: String,
}

impl SummaryRequest {
    /// Parse a request from raw stdin contents.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_text_field() {
        let req = SummaryRequest::from_json(r#"{"text": "hello world"}"#).unwrap();
        assert_eq!(req.text, "hello world");
    }

    #[test]
    fn test_ignores_extra_keys() {
        let req = SummaryRequest::from_json(r#"{"text": "a", "lang": "en"}"#).unwrap();
        assert_eq!(req.text, "a");
    }

    #[test]
    fn test_missing_text_is_an_error() {
        assert!(SummaryRequest::from_json(r#"{"body": "a"}"#).is_err());
    }

    #[test]
    fn test_non_string_text_is_an_error() {
        assert!(SummaryRequest::from_json(r#"{"text": 42}"#).is_err());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(SummaryRequest::from_json("{\"text\": ").is_err());
    }
}
