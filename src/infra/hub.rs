// ============================================================
// Layer 6 - Model Hub Client
// ============================================================
// Resolves pretrained artefacts by name, e.g. "t5-small":
//
//   - a name that is an existing local directory is used as-is
//   - anything else is a hub repo id; files are downloaded once
//     into the cache directory and reused afterwards
//
// Cache layout:
//   <cache>/models/<repo id, '/' → '--'>/<file>
//   <cache>/datasets/...            (see data::loader)
//
// Dataset rows come from the public datasets-server `rows`
// endpoint, which returns JSON pages of at most 100 rows.
//
// Endpoints: `HF_ENDPOINT` overrides the hub, and
// `SUMMARIZER_DATASETS_SERVER` overrides the datasets server.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

const DEFAULT_ENDPOINT: &str = "https://huggingface.co";
const DEFAULT_DATASETS_SERVER: &str = "https://datasets-server.huggingface.co";

/// Largest page the rows endpoint will serve.
pub const MAX_ROWS_PER_PAGE: usize = 100;

/// One page of the datasets-server `rows` response.
#[derive(Debug, Deserialize)]
pub struct RowsPage {
    pub rows:           Vec<RowEntry>,
    pub num_rows_total: usize,
}

#[derive(Debug, Deserialize)]
pub struct RowEntry {
    pub row_idx: usize,
    pub row:     serde_json::Map<String, serde_json::Value>,
}

pub struct HubClient {
    cache_dir:       PathBuf,
    endpoint:        String,
    datasets_server: String,
    http:            reqwest::blocking::Client,
}

impl HubClient {
    /// Create a client that caches into `cache_dir`, with endpoints
    /// taken from the environment or the public defaults.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let endpoint = std::env::var("HF_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let datasets_server = std::env::var("SUMMARIZER_DATASETS_SERVER")
            .unwrap_or_else(|_| DEFAULT_DATASETS_SERVER.to_string());
        Self::with_endpoints(cache_dir, &endpoint, &datasets_server)
    }

    pub fn with_endpoints(
        cache_dir:       impl Into<PathBuf>,
        endpoint:        &str,
        datasets_server: &str,
    ) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("summarizer/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<std::time::Duration>)
            .build()
            .context("Cannot build HTTP client")?;
        Ok(Self {
            cache_dir:       cache_dir.into(),
            endpoint:        endpoint.trim_end_matches('/').to_string(),
            datasets_server: datasets_server.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path to `file` of model `repo`, downloading it if needed.
    pub fn model_file(&self, repo: &str, file: &str) -> Result<PathBuf> {
        let local = Path::new(repo);
        if local.is_dir() {
            let path = local.join(file);
            anyhow::ensure!(
                path.exists(),
                "Local model directory '{}' has no '{}'",
                local.display(),
                file
            );
            return Ok(path);
        }

        let target = self.cache_dir.join("models").join(repo_slug(repo)).join(file);
        if target.exists() {
            tracing::debug!("Cache hit: '{}'", target.display());
            return Ok(target);
        }

        let url = format!("{}/{}/resolve/main/{}", self.endpoint, repo, file);
        self.download(&url, &target)?;
        Ok(target)
    }

    /// Fetch one page of rows from a hub dataset split.
    pub fn dataset_rows(
        &self,
        dataset: &str,
        config:  &str,
        split:   &str,
        offset:  usize,
        length:  usize,
    ) -> Result<RowsPage> {
        let length = length.min(MAX_ROWS_PER_PAGE);
        let offset_s = offset.to_string();
        let length_s = length.to_string();
        tracing::debug!("Fetching rows {}..{} of {}/{}/{}", offset, offset + length, dataset, config, split);

        let page = self
            .http
            .get(format!("{}/rows", self.datasets_server))
            .query(&[
                ("dataset", dataset),
                ("config", config),
                ("split", split),
                ("offset", offset_s.as_str()),
                ("length", length_s.as_str()),
            ])
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Rows request failed for dataset '{dataset}'"))?
            .json::<RowsPage>()
            .with_context(|| format!("Unexpected rows response for dataset '{dataset}'"))?;
        Ok(page)
    }

    fn download(&self, url: &str, target: &Path) -> Result<()> {
        tracing::info!("Downloading {}", url);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create cache dir '{}'", parent.display()))?;
        }

        let bytes = self
            .http
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Download failed: {url}"))?
            .bytes()
            .with_context(|| format!("Download interrupted: {url}"))?;

        // Partial downloads never appear under the final name.
        let tmp = target.with_extension("part");
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("Cannot write '{}'", tmp.display()))?;
        f.write_all(&bytes)?;
        f.sync_all()?;
        fs::rename(&tmp, target)
            .with_context(|| format!("Cannot move download into '{}'", target.display()))?;

        tracing::info!("Saved {} bytes to '{}'", bytes.len(), target.display());
        Ok(())
    }
}

/// Turn a repo id into a single directory name: "google/flan-t5-small" → "google--flan-t5-small".
pub fn repo_slug(repo: &str) -> String {
    repo.trim_matches('/').replace('/', "--")
}
