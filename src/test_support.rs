// Shared fixtures for unit tests: a small word-level tokenizer in
// Hugging Face JSON format, a tiny T5 config that keeps model
// tests fast on the NdArray backend, and a local HTTP server
// standing in for the hub.

use tokenizers::Tokenizer;

use crate::data::tokenizer::SummaryTokenizer;
use crate::ml::config::T5Config;

pub type TestBackend = burn::backend::NdArray;
pub type TestAutodiffBackend = burn::backend::Autodiff<burn::backend::NdArray>;

pub const FIXTURE_WORDS: &[&str] = &[
    "summarize", ":", "the", "cat", "sat", "on", "mat", "a", "dog", "ran",
    "government", "budget", "plans", "public", "money", "year", ".", ",",
];

/// Word-level tokenizer: <pad>=0, </s>=1, <unk>=2, then FIXTURE_WORDS.
pub fn fixture_raw_tokenizer() -> Tokenizer {
    let mut vocab = serde_json::json!({ "<pad>": 0, "</s>": 1, "<unk>": 2 });
    for (i, w) in FIXTURE_WORDS.iter().enumerate() {
        vocab[*w] = serde_json::json!(i + 3);
    }
    let special = |id: u32, content: &str| serde_json::json!({
        "id": id, "content": content, "single_word": false, "lstrip": false,
        "rstrip": false, "normalized": false, "special": true
    });

    let json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [special(0, "<pad>"), special(1, "</s>"), special(2, "<unk>")],
        "normalizer": { "type": "Lowercase" },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "<unk>" }
    });

    Tokenizer::from_bytes(json.to_string().as_bytes()).expect("fixture tokenizer")
}

pub fn fixture_tokenizer() -> SummaryTokenizer {
    SummaryTokenizer::new(fixture_raw_tokenizer(), 0, 1)
}

/// A two-layer T5 small enough to run forward passes in unit tests.
pub fn tiny_config() -> T5Config {
    serde_json::from_value(serde_json::json!({
        "vocab_size": FIXTURE_WORDS.len() + 3,
        "d_model": 16,
        "d_kv": 4,
        "d_ff": 32,
        "num_layers": 2,
        "num_decoder_layers": 2,
        "num_heads": 4,
        "relative_attention_num_buckets": 8,
        "relative_attention_max_distance": 16,
        "dropout_rate": 0.0,
        "n_positions": 64
    }))
    .expect("tiny config")
}

/// Serve `app` on a free localhost port from a background thread.
/// Returns the base URL, e.g. "http://127.0.0.1:40123".
pub fn serve_fixture(app: axum::Router) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind fixture server");
    listener.set_nonblocking(true).expect("nonblocking listener");
    let addr = listener.local_addr().expect("fixture address");

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("fixture runtime");
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");
            axum::serve(listener, app).await.expect("fixture server");
        });
    });
    format!("http://{addr}")
}
