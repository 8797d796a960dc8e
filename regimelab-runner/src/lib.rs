//! RegimeLab Runner: pipeline orchestration, backtests, allocation, reports.
//!
//! This crate builds on `regimelab-core` to provide:
//! - CSV universe loading, dataset hashing, and synthetic series
//! - TOML pipeline configuration with content hashing
//! - Position backtests of the strategy bank and whole-share filter backtests
//! - Strategy weighting and capped portfolio allocation
//! - Markdown reports and on-disk run artifacts

pub mod allocation;
pub mod backtest;
pub mod config;
pub mod data_loader;
pub mod metrics;
pub mod pipeline;
pub mod regime;
pub mod reporting;

pub use allocation::{
    allocate_portfolio, final_positions, AllocationConfig, AllocationMethod, FinalPositions,
    PortfolioMetrics, PositionAllocation, StrategyWeight,
};
pub use backtest::{
    backtest_buy_and_hold, backtest_multiple_strategies, backtest_signal_strategy,
    backtest_strategy, compare_strategies, BacktestError, PositionBacktest, ShareBacktest,
    StrategyBacktest, StrategyComparison,
};
pub use config::{ConfigError, PipelineConfig, RegimeMode};
pub use data_loader::{dataset_hash, load_series, load_universe, synthetic_series, LoadError};
pub use metrics::{MetricsConfig, PerformanceMetrics};
pub use pipeline::{Pipeline, PipelineError, PipelineReport, RegimeModel};
pub use regime::RegimeTrack;
pub use reporting::{ArtifactManager, ArtifactPaths};
