//! Cross-run index page.
//!
//! Aggregates every finished run into a single landing page. A run
//! qualifies only if it has both the markdown report and the
//! machine-readable summary statistics; missing either silently excludes
//! it — a half-finished run simply does not appear yet.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

use crate::pipeline::naming;
use crate::registry::{scan_run_dirs, RunId};
use crate::store::ArtifactKind;

/// Markdown source of the index page under the working root.
pub const INDEX_MD: &str = "index.md";
/// Rendered index page under the working root.
pub const INDEX_HTML: &str = "index.html";

/// Errors that can occur while rebuilding the index page.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid summary stats in {path}: {source}")]
    Stats {
        path: String,
        source: serde_json::Error,
    },

    #[error("template rendering failed: {0}")]
    Template(#[from] tera::Error),

    #[error("failed to launch document converter '{bin}': {source}")]
    Converter { bin: String, source: std::io::Error },

    #[error("document conversion exited with code {code}: {stderr}")]
    Conversion { code: i32, stderr: String },
}

/// Per-run summary written by the report producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStats {
    #[serde(default)]
    pub forecast_time: String,
    #[serde(default)]
    pub number_active: u64,
    #[serde(default)]
    pub storm_names: Vec<String>,
    #[serde(default)]
    pub number_affecting_people: u64,
    #[serde(default)]
    pub number_displacing_people: u64,
}

/// One table row of the rendered index.
#[derive(Debug, Serialize)]
struct IndexEntry {
    run_id: RunId,
    display_time: String,
    report_link: String,
    storms: String,
    number_active: u64,
    number_affecting_people: u64,
    number_displacing_people: u64,
}

impl IndexEntry {
    fn new(run: &RunId, stats: SummaryStats) -> Self {
        let display_time = if stats.forecast_time.is_empty() {
            run.display_time()
        } else {
            stats.forecast_time.clone()
        };
        Self {
            run_id: run.clone(),
            display_time,
            report_link: format!(
                "{}/{}/{}",
                run,
                ArtifactKind::Report.dir_name(),
                naming::REPORT_HTML
            ),
            storms: stats.storm_names.join(", "),
            number_active: stats.number_active,
            number_affecting_people: stats.number_affecting_people,
            number_displacing_people: stats.number_displacing_people,
        }
    }
}

const INDEX_TEMPLATE: &str = "\
# Tropical cyclone displacement forecasts

Overview of all completed forecast runs, newest first.

| Forecast time | Named storms | Storms | Affecting people | Displacing people |
|---|---|---|---|---|
{% for row in rows %}| [{{ row.display_time }}]({{ row.report_link }}) | {{ row.number_active }} | {{ row.storms }} | {{ row.number_affecting_people }} | {{ row.number_displacing_people }} |
{% endfor %}";

/// Rebuilds the aggregate landing page from finished run reports.
pub struct IndexBuilder {
    working_dir: PathBuf,
    pandoc_bin: String,
}

impl IndexBuilder {
    pub fn new(working_dir: impl Into<PathBuf>, pandoc_bin: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            pandoc_bin: pandoc_bin.into(),
        }
    }

    /// Scans all run directories and rewrites `index.md` / `index.html`.
    ///
    /// # Errors
    ///
    /// Fails on IO problems, malformed summary statistics, or a non-zero
    /// exit of the document converter. Failure here never affects the
    /// audit batch itself; the controller only logs it.
    pub async fn rebuild(&self) -> Result<PathBuf, IndexError> {
        std::fs::create_dir_all(&self.working_dir)?;
        let entries = self.collect_summaries()?;
        info!(runs = entries.len(), "rebuilding index page");

        let markdown = render_markdown(&entries)?;
        let md_path = self.working_dir.join(INDEX_MD);
        std::fs::write(&md_path, markdown)?;

        let html_path = self.working_dir.join(INDEX_HTML);
        let output = Command::new(&self.pandoc_bin)
            .arg(&md_path)
            .arg("-o")
            .arg(&html_path)
            .output()
            .await
            .map_err(|source| IndexError::Converter {
                bin: self.pandoc_bin.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(IndexError::Conversion {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(html_path)
    }

    /// Loads summary statistics from every qualifying run, newest first.
    fn collect_summaries(&self) -> Result<Vec<IndexEntry>, IndexError> {
        let mut entries = Vec::new();
        for run in scan_run_dirs(&self.working_dir) {
            let report_dir = self
                .working_dir
                .join(run.as_str())
                .join(ArtifactKind::Report.dir_name());
            let report_md = report_dir.join(naming::REPORT_MD);
            let stats_path = report_dir.join(naming::SUMMARY_STATS);
            if !report_md.is_file() || !stats_path.is_file() {
                continue;
            }
            let raw = std::fs::read_to_string(&stats_path)?;
            let stats: SummaryStats =
                serde_json::from_str(&raw).map_err(|source| IndexError::Stats {
                    path: stats_path.display().to_string(),
                    source,
                })?;
            entries.push(IndexEntry::new(&run, stats));
        }
        entries.sort_by(|a, b| b.run_id.cmp(&a.run_id));
        Ok(entries)
    }
}

fn render_markdown(entries: &[IndexEntry]) -> Result<String, tera::Error> {
    let mut context = Context::new();
    context.insert("rows", entries);
    Tera::one_off(INDEX_TEMPLATE, &context, false)
}
