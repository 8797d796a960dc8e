//! Markdown report generators.
//!
//! Percentages carry two decimals; Sharpe ratios carry two in tables and
//! four where a single strategy or portfolio is summarized. Drawdowns are
//! shown as losses.

use std::fmt::Write as _;

use regimelab_core::domain::Instrument;

use super::format::{format_drawdown, format_fixed, format_pct};
use crate::allocation::{FinalPositions, PortfolioMetrics, PositionAllocation};
use crate::backtest::{StrategyBacktest, Winner};
use crate::pipeline::{FilterOutcome, InstrumentReport, PipelineReport};

/// Months of filter returns listed per instrument in the run report.
const RECENT_MONTHS: usize = 12;

fn heading(out: &mut String, level: usize, text: &str) {
    let _ = writeln!(out, "{} {}\n", "#".repeat(level), text);
}

// ─── Strategy backtests ──────────────────────────────────────────────

/// Performance table of every successful backtest plus the best by Sharpe.
pub fn generate_backtest_report(results: &[StrategyBacktest]) -> String {
    let mut report = String::new();
    heading(&mut report, 1, "Strategy Backtest Report");
    push_backtest_sections(&mut report, results, 2);
    report
}

fn push_backtest_sections(out: &mut String, results: &[StrategyBacktest], level: usize) {
    heading(out, level, "Strategy Performance");
    out.push_str("| Strategy | Annualized Return | Sharpe Ratio | Max Drawdown | Win Rate | Calmar Ratio |\n");
    out.push_str("|----------|-------------------|--------------|--------------|----------|--------------|\n");
    for result in results {
        let Some(m) = result.metrics() else { continue };
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} |",
            result.strategy,
            format_pct(m.annualized_return),
            format_fixed(m.sharpe_ratio, 2),
            format_drawdown(m.max_drawdown),
            format_pct(m.win_rate),
            format_fixed(m.calmar_ratio, 2),
        );
    }

    // first of equals wins
    let best = results
        .iter()
        .filter_map(|r| r.metrics().map(|m| (r, m)))
        .reduce(|best, current| if current.1.sharpe_ratio > best.1.sharpe_ratio { current } else { best });
    if let Some((result, m)) = best {
        out.push('\n');
        heading(out, level, "Best Strategy (by Sharpe Ratio)");
        let _ = writeln!(out, "- **Strategy**: {}", result.strategy);
        let _ = writeln!(out, "- **Sharpe Ratio**: {}", format_fixed(m.sharpe_ratio, 4));
        let _ = writeln!(out, "- **Annualized Return**: {}", format_pct(m.annualized_return));
        let _ = writeln!(out, "- **Max Drawdown**: {}", format_drawdown(m.max_drawdown));
    }
}

// ─── Portfolio positions ─────────────────────────────────────────────

/// Portfolio overview and the position table, heaviest first.
pub fn generate_position_report(positions: &[PositionAllocation], metrics: &PortfolioMetrics) -> String {
    let mut report = String::new();
    heading(&mut report, 1, "Portfolio Position Report");
    push_position_sections(&mut report, positions, metrics, 2);
    report
}

fn push_position_sections(
    out: &mut String,
    positions: &[PositionAllocation],
    metrics: &PortfolioMetrics,
    level: usize,
) {
    heading(out, level, "Portfolio Overview");
    let _ = writeln!(out, "- **Total Equity Weight**: {}", format_pct(metrics.total_weight));
    let _ = writeln!(out, "- **Weighted Sharpe Ratio**: {}", format_fixed(metrics.weighted_sharpe, 4));
    let _ = writeln!(out, "- **Max Single Weight**: {}", format_pct(metrics.max_weight));
    let _ = writeln!(out, "- **Min Single Weight**: {}", format_pct(metrics.min_weight));
    let _ = writeln!(out, "- **Average Weight**: {}", format_pct(metrics.avg_weight));
    let _ = writeln!(out, "- **Concentration**: {}\n", metrics.concentration);

    heading(out, level, "Position Details");
    out.push_str("| Sector | Instrument | Fund | Weight | Sharpe Ratio |\n");
    out.push_str("|--------|------------|------|--------|--------------|\n");
    let mut sorted: Vec<&PositionAllocation> = positions.iter().collect();
    sorted.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    for p in sorted {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            p.instrument.sector,
            p.instrument.symbol,
            p.instrument.fund,
            format_pct(p.weight),
            format_fixed(p.sharpe_ratio, 4),
        );
    }
}

// ─── Filter comparison ───────────────────────────────────────────────

fn winner_label(winner: Winner) -> &'static str {
    match winner {
        Winner::Signal => "signal",
        Winner::BuyAndHold => "buy & hold",
        Winner::Tie => "tie",
    }
}

/// Filter-signal trading against buy-and-hold, one row per instrument.
pub fn generate_comparison_report<'a>(
    rows: impl IntoIterator<Item = (&'a Instrument, &'a FilterOutcome)>,
) -> String {
    let mut report = String::new();
    heading(&mut report, 1, "Filter Signal vs Buy-and-Hold");
    push_comparison_table(&mut report, rows);
    report
}

fn push_comparison_table<'a>(
    out: &mut String,
    rows: impl IntoIterator<Item = (&'a Instrument, &'a FilterOutcome)>,
) {
    out.push_str("| Instrument | Trades | Signal Final | Signal Return | Hold Final | Hold Return | Difference | Winner |\n");
    out.push_str("|------------|--------|--------------|---------------|------------|-------------|------------|--------|\n");
    for (instrument, outcome) in rows {
        let signal = &outcome.signal_backtest;
        let hold = &outcome.buy_and_hold;
        let c = &outcome.comparison;
        let _ = writeln!(
            out,
            "| {} | {} | {} | {}% | {} | {}% | {} ({}%) | {} |",
            instrument.symbol,
            signal.trades.len(),
            format_fixed(signal.final_capital, 2),
            format_fixed(signal.total_return_pct, 2),
            format_fixed(hold.final_capital, 2),
            format_fixed(hold.total_return_pct, 2),
            format_fixed(c.difference, 2),
            format_fixed(c.difference_pct, 2),
            winner_label(c.winner),
        );
    }
}

// ─── Full run ────────────────────────────────────────────────────────

fn push_instrument(out: &mut String, r: &InstrumentReport) {
    heading(out, 2, &r.instrument.symbol);
    let span = match (r.start_date, r.end_date) {
        (Some(start), Some(end)) => format!(" ({start} to {end})"),
        _ => String::new(),
    };
    let _ = writeln!(out, "- **Bars**: {}{}", r.bars, span);
    if !r.instrument.sector.is_empty() {
        let _ = writeln!(out, "- **Sector**: {}", r.instrument.sector);
    }

    let regime = &r.regime;
    let p = &regime.prediction;
    let prev = p.prev_state.map_or_else(|| "-".to_string(), |s| s.to_string());
    let _ = writeln!(
        out,
        "- **Regime**: state {} (previous {}), next state {}, next observation {}",
        p.current_state, prev, p.next_state, p.next_observation
    );
    let probs: Vec<String> = p.state_probs.iter().map(|v| format_fixed(*v, 4)).collect();
    let _ = writeln!(out, "- **State probabilities**: [{}]", probs.join(", "));
    let _ = writeln!(
        out,
        "- **Training**: log-likelihood {}, {} valid run(s), seed {}{}\n",
        format_fixed(regime.log_likelihood, 4),
        regime.valid_runs,
        regime.seed,
        if regime.fallback { ", untrained fallback" } else { "" }
    );

    heading(out, 3, "Current Signals");
    out.push_str("| Strategy | Action | Position | Confidence | Weight |\n");
    out.push_str("|----------|--------|----------|------------|--------|\n");
    for named in &r.current_signals {
        let weight = r
            .strategy_weights
            .iter()
            .find(|w| w.strategy == named.strategy)
            .map_or_else(|| "-".to_string(), |w| format_pct(w.weight));
        let action = match &named.error {
            Some(e) => format!("{} (error: {e})", named.signal.action),
            None => named.signal.action.to_string(),
        };
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            named.strategy,
            action,
            format_fixed(named.signal.position, 2),
            format_fixed(named.signal.confidence, 2),
            weight,
        );
    }
    out.push('\n');

    push_backtest_sections(out, &r.backtests, 3);

    let months = &r.filter.monthly_returns;
    if !months.is_empty() {
        out.push('\n');
        heading(out, 3, "Recent Monthly Returns (filter signal)");
        out.push_str("| Month | Return |\n");
        out.push_str("|-------|--------|\n");
        for m in &months[months.len().saturating_sub(RECENT_MONTHS)..] {
            let _ = writeln!(out, "| {} | {} |", m.month, format_pct(m.total));
        }
    }
    out.push('\n');
}

fn push_final_positions(out: &mut String, final_positions: &FinalPositions) {
    heading(out, 2, "Final Positions");
    let _ = writeln!(out, "- **Positions**: {}", final_positions.num_positions);
    let _ = writeln!(out, "- **Effective Weight**: {}\n", format_pct(final_positions.effective_weight));
    out.push_str("| Instrument | Weight |\n");
    out.push_str("|------------|--------|\n");
    let mut sorted: Vec<&PositionAllocation> = final_positions.positions.iter().collect();
    sorted.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    for p in sorted {
        let _ = writeln!(out, "| {} | {} |", p.instrument.symbol, format_pct(p.weight));
    }
}

/// Everything a pipeline run produced, as one document.
pub fn generate_run_report(report: &PipelineReport) -> String {
    let mut out = String::new();
    heading(&mut out, 1, "RegimeLab Run Report");
    let _ = writeln!(out, "- **Config hash**: `{}`", report.config_hash);
    let _ = writeln!(out, "- **Dataset hash**: `{}`", report.dataset_hash);
    let _ = writeln!(
        out,
        "- **Instruments**: {} analyzed, {} skipped\n",
        report.instruments.len(),
        report.skipped.len()
    );

    for instrument in &report.instruments {
        push_instrument(&mut out, instrument);
    }

    if !report.skipped.is_empty() {
        heading(&mut out, 2, "Skipped Instruments");
        for s in &report.skipped {
            let _ = writeln!(out, "- {}: {}", s.instrument.symbol, s.reason);
        }
        out.push('\n');
    }

    if !report.instruments.is_empty() {
        heading(&mut out, 2, "Filter Signal vs Buy-and-Hold");
        push_comparison_table(
            &mut out,
            report.instruments.iter().map(|r| (&r.instrument, &r.filter)),
        );
        out.push('\n');
    }

    push_position_sections(&mut out, &report.allocation, &report.portfolio_metrics, 2);
    out.push('\n');
    push_final_positions(&mut out, &report.final_positions);
    out
}
