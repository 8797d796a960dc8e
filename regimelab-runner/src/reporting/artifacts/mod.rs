//! Artifact manager for persisting run outputs.
//!
//! One run writes into `<output_dir>/<dataset hash prefix>-<config hash prefix>/`:
//!
//! ```text
//! manifest.json       RunManifest
//! report.json         the full PipelineReport
//! report.md           generate_run_report
//! positions.csv       final positions
//! ledgers/<SYM>.csv   filter-signal share ledger per instrument
//! ```

mod manifest;
mod tables;

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::pipeline::PipelineReport;
use crate::reporting::reports::generate_run_report;

pub use manifest::RunManifest;

/// Hex characters of each hash used in the run directory name.
const RUN_ID_HASH_CHARS: usize = 12;

/// Artifact paths returned after export.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub run_dir: PathBuf,
    pub manifest: PathBuf,
    pub report_json: PathBuf,
    pub report_markdown: PathBuf,
    pub positions_csv: PathBuf,
    pub ledgers: Vec<PathBuf>,
}

/// Manages writing all artifacts for a run.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    output_dir: PathBuf,
}

/// Directory name identifying a run by its inputs.
pub fn run_id(report: &PipelineReport) -> String {
    let prefix = |hash: &str| hash.chars().take(RUN_ID_HASH_CHARS).collect::<String>();
    format!("{}-{}", prefix(&report.dataset_hash), prefix(&report.config_hash))
}

impl ArtifactManager {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)
            .context("Failed to create artifact output directory")?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Save complete run artifacts. Re-running the same inputs overwrites
    /// the same directory.
    pub fn save_run(&self, report: &PipelineReport) -> Result<ArtifactPaths> {
        let run_dir = self.output_dir.join(run_id(report));
        let ledger_dir = run_dir.join("ledgers");
        std::fs::create_dir_all(&ledger_dir)
            .context("Failed to create run artifact directory")?;

        let manifest_path = run_dir.join("manifest.json");
        manifest::write_manifest(&manifest_path, &RunManifest::from_report(report, Utc::now()))?;

        let report_json = run_dir.join("report.json");
        let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
        std::fs::write(&report_json, json)
            .with_context(|| format!("Failed to write report to {}", report_json.display()))?;

        let report_markdown = run_dir.join("report.md");
        std::fs::write(&report_markdown, generate_run_report(report))
            .with_context(|| format!("Failed to write report to {}", report_markdown.display()))?;

        let positions_csv = run_dir.join("positions.csv");
        tables::write_positions_csv(&positions_csv, &report.final_positions.positions)?;

        let mut ledgers = Vec::with_capacity(report.instruments.len());
        for instrument in &report.instruments {
            let path = ledger_dir.join(format!("{}.csv", instrument.instrument.symbol));
            tables::write_ledger_csv(&path, &instrument.filter.signal_backtest.ledger)?;
            ledgers.push(path);
        }

        info!(dir = %run_dir.display(), ledgers = ledgers.len(), "artifacts written");
        Ok(ArtifactPaths {
            run_dir,
            manifest: manifest_path,
            report_json,
            report_markdown,
            positions_csv,
            ledgers,
        })
    }
}
