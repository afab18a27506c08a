// ============================================================
// Layer 4 - Article Loaders
// ============================================================
// Two sources of (article, summary) records, both behind the
// ArticleSource trait from Layer 3:
//
//   JsonlLoader    - a local JSON Lines file, one row object per
//                    line
//   HubRowsLoader  - a split of a hub dataset, fetched page by
//                    page from the datasets-server rows API and
//                    cached as JSON Lines on first use
//
// Cache layout:
//   <cache>/datasets/<dataset slug>/<config>/<split key>.jsonl
//
// The cache keeps whole row objects rather than just the two
// selected columns, so a different column choice can reuse it.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::{
    fs,
    io::{BufRead, BufReader, BufWriter, Write},
    ops::Range,
    path::{Path, PathBuf},
};

use crate::data::split::SplitSelection;
use crate::domain::{record::ArticleRecord, traits::ArticleSource};
use crate::infra::hub::{repo_slug, HubClient, MAX_ROWS_PER_PAGE};

/// Which row fields hold the article and its reference summary.
#[derive(Debug, Clone)]
pub struct Columns {
    pub text:    String,
    pub summary: String,
}

impl Default for Columns {
    fn default() -> Self {
        Self { text: "article".into(), summary: "highlights".into() }
    }
}

impl Columns {
    fn extract(&self, row: &Map<String, Value>) -> Result<ArticleRecord> {
        let field = |name: &str| -> Result<String> {
            match row.get(name) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(_) => bail!("Column '{name}' is not a string"),
                None => bail!("Column '{name}' is missing"),
            }
        };
        Ok(ArticleRecord::new(field(&self.text)?, field(&self.summary)?))
    }
}

// ─── JsonlLoader ──────────────────────────────────────────────────────────────
pub struct JsonlLoader {
    path:    PathBuf,
    columns: Columns,
}

impl JsonlLoader {
    pub fn new(path: impl Into<PathBuf>, columns: Columns) -> Self {
        Self { path: path.into(), columns }
    }
}

impl ArticleSource for JsonlLoader {
    fn load_all(&self) -> Result<Vec<ArticleRecord>> {
        let file = fs::File::open(&self.path)
            .with_context(|| format!("Cannot open dataset file '{}'", self.path.display()))?;

        let mut records = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let lineno = i + 1;
            let row: Map<String, Value> = serde_json::from_str(&line)
                .with_context(|| format!("{}:{lineno}: invalid JSON row", self.path.display()))?;
            let record = self
                .columns
                .extract(&row)
                .with_context(|| format!("{}:{lineno}", self.path.display()))?;
            records.push(record);
        }

        tracing::info!("Loaded {} records from '{}'", records.len(), self.path.display());
        Ok(records)
    }
}

// ─── HubRowsLoader ────────────────────────────────────────────────────────────
pub struct HubRowsLoader<'a> {
    hub:     &'a HubClient,
    dataset: String,
    config:  String,
    split:   SplitSelection,
    columns: Columns,
}

impl<'a> HubRowsLoader<'a> {
    pub fn new(
        hub:     &'a HubClient,
        dataset: impl Into<String>,
        config:  impl Into<String>,
        split:   SplitSelection,
        columns: Columns,
    ) -> Self {
        Self { hub, dataset: dataset.into(), config: config.into(), split, columns }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.hub
            .cache_dir()
            .join("datasets")
            .join(repo_slug(&self.dataset))
            .join(&self.config)
            .join(format!("{}.jsonl", self.split.cache_key()))
    }

    /// Page through the selected rows and write them to `cache`.
    fn fetch_into(&self, cache: &Path) -> Result<()> {
        let first_page = self.hub.dataset_rows(&self.dataset, &self.config, &self.split.name, 0, 1)?;
        let range = self.split.resolve(first_page.num_rows_total);
        tracing::info!(
            "Fetching rows {}..{} of {}/{} split '{}' ({} total)",
            range.start, range.end, self.dataset, self.config, self.split.name, first_page.num_rows_total
        );

        if let Some(parent) = cache.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create cache dir '{}'", parent.display()))?;
        }

        // Only a complete fetch is moved under the cache name.
        let tmp = cache.with_extension("part");
        if let Err(e) = self.write_rows(&tmp, range) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, cache)
            .with_context(|| format!("Cannot move rows into '{}'", cache.display()))?;
        Ok(())
    }

    fn write_rows(&self, tmp: &Path, range: Range<usize>) -> Result<()> {
        let mut out = BufWriter::new(
            fs::File::create(tmp).with_context(|| format!("Cannot write '{}'", tmp.display()))?,
        );

        let mut offset = range.start;
        while offset < range.end {
            let length = (range.end - offset).min(MAX_ROWS_PER_PAGE);
            let page = self
                .hub
                .dataset_rows(&self.dataset, &self.config, &self.split.name, offset, length)?;
            if page.rows.is_empty() {
                bail!("Rows API returned no rows at offset {offset}");
            }
            for entry in page.rows {
                anyhow::ensure!(
                    entry.row_idx == offset,
                    "Rows API returned row {} where row {} was expected", entry.row_idx, offset
                );
                serde_json::to_writer(&mut out, &entry.row)?;
                out.write_all(b"\n")?;
                offset += 1;
            }
            tracing::debug!("Fetched {} / {} rows", offset - range.start, range.len());
        }

        out.flush()?;
        Ok(())
    }
}

impl ArticleSource for HubRowsLoader<'_> {
    fn load_all(&self) -> Result<Vec<ArticleRecord>> {
        let cache = self.cache_path();
        if cache.exists() {
            tracing::info!("Using cached dataset rows '{}'", cache.display());
        } else {
            self.fetch_into(&cache)?;
        }
        JsonlLoader::new(cache, self.columns.clone()).load_all()
    }
}
