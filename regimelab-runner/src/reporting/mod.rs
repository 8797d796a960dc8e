//! Markdown reports and on-disk run artifacts.

pub mod artifacts;
pub mod reports;

pub use artifacts::{ArtifactManager, ArtifactPaths, RunManifest};
pub use reports::{
    generate_backtest_report, generate_comparison_report, generate_position_report,
    generate_run_report,
};
