//! Run manifest export (JSON).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::pipeline::PipelineReport;

/// Identifies a run: what went in, when, and how much came out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub timestamp: DateTime<Utc>,
    pub config_hash: String,
    pub dataset_hash: String,
    pub instruments: Vec<String>,
    pub skipped: Vec<String>,
    pub num_positions: usize,
    pub effective_weight: f64,
}

impl RunManifest {
    pub fn from_report(report: &PipelineReport, timestamp: DateTime<Utc>) -> Self {
        Self {
            schema_version: report.schema_version,
            timestamp,
            config_hash: report.config_hash.clone(),
            dataset_hash: report.dataset_hash.clone(),
            instruments: report
                .instruments
                .iter()
                .map(|r| r.instrument.symbol.clone())
                .collect(),
            skipped: report
                .skipped
                .iter()
                .map(|s| s.instrument.symbol.clone())
                .collect(),
            num_positions: report.final_positions.num_positions,
            effective_weight: report.final_positions.effective_weight,
        }
    }
}

pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest)
        .context("Failed to serialize run manifest")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write manifest to {}", path.display()))?;
    Ok(())
}
