//! Report generators.

mod format;
mod markdown;

pub use format::{format_drawdown, format_fixed, format_pct};
pub use markdown::{
    generate_backtest_report, generate_comparison_report, generate_position_report,
    generate_run_report,
};
