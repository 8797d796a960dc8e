//! Performance metrics: pure functions over a daily returns series.
//!
//! Undefined ratios follow one convention: Sortino, profit/loss and Calmar
//! report `f64::INFINITY` when their denominator vanishes (no losses, no
//! drawdown), while Sharpe and the information ratio report 0 when the
//! volatility or tracking error is zero.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::BacktestConfig;

/// Annualization inputs shared by the ratio metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub risk_free_rate: f64,
    pub trading_days_per_year: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.03,
            trading_days_per_year: 252.0,
        }
    }
}

impl From<&BacktestConfig> for MetricsConfig {
    fn from(config: &BacktestConfig) -> Self {
        Self {
            risk_free_rate: config.risk_free_rate,
            trading_days_per_year: config.trading_days_per_year,
        }
    }
}

/// The metric suite for one returns series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub cumulative_return: f64,
    pub annualized_return: f64,
    /// Positive fraction, e.g. 0.15 for a 15% peak-to-trough loss.
    pub max_drawdown: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub win_rate: f64,
    pub profit_loss_ratio: f64,
    pub calmar_ratio: f64,
    /// Present only when a same-length benchmark was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub information_ratio: Option<f64>,
}

impl PerformanceMetrics {
    pub fn compute(returns: &[f64], benchmark: Option<&[f64]>, config: &MetricsConfig) -> Self {
        let days = config.trading_days_per_year;
        let rf = config.risk_free_rate;
        Self {
            cumulative_return: cumulative_return(returns),
            annualized_return: annualized_return(returns, days),
            max_drawdown: max_drawdown(&equity_curve(returns, 1.0)).max_drawdown,
            volatility: volatility(returns, days),
            sharpe_ratio: sharpe_ratio(returns, rf, days),
            sortino_ratio: sortino_ratio(returns, rf, days),
            win_rate: win_rate(returns),
            profit_loss_ratio: profit_loss_ratio(returns),
            calmar_ratio: calmar_ratio(returns, days),
            information_ratio: benchmark
                .filter(|b| b.len() == returns.len())
                .map(|b| information_ratio(returns, b, days)),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Compounded return: `Π(1 + r) - 1`.
pub fn cumulative_return(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

/// Geometric annualization with `years = n / days_per_year`.
pub fn annualized_return(returns: &[f64], days_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let years = returns.len() as f64 / days_per_year;
    (1.0 + cumulative_return(returns)).powf(1.0 / years) - 1.0
}

/// Sample standard deviation scaled by `sqrt(days_per_year)`.
pub fn volatility(returns: &[f64], days_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let m = mean(returns);
    let var = returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    var.sqrt() * days_per_year.sqrt()
}

/// `(annualized return - rf) / volatility`; 0 for zero volatility.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, days_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let vol = volatility(returns, days_per_year);
    if vol == 0.0 {
        return 0.0;
    }
    (annualized_return(returns, days_per_year) - risk_free_rate) / vol
}

/// Excess annualized return over the annualized deviation of the negative
/// returns around their own mean.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, days_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let negative: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if negative.is_empty() {
        return f64::INFINITY;
    }
    let center = mean(&negative).min(0.0);
    let downside = (negative.iter().map(|r| (r - center).powi(2)).sum::<f64>()
        / negative.len() as f64)
        .sqrt()
        * days_per_year.sqrt();
    if downside == 0.0 {
        return f64::INFINITY;
    }
    (annualized_return(returns, days_per_year) - risk_free_rate) / downside
}

/// Fraction of strictly positive returns.
pub fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64
}

/// Mean gain over mean absolute loss.
pub fn profit_loss_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let gains: Vec<f64> = returns.iter().copied().filter(|&r| r > 0.0).collect();
    let losses: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if losses.is_empty() {
        return f64::INFINITY;
    }
    let avg_gain = if gains.is_empty() { 0.0 } else { mean(&gains) };
    let avg_loss = mean(&losses).abs();
    if avg_loss == 0.0 {
        return f64::INFINITY;
    }
    avg_gain / avg_loss
}

/// Annualized return over max drawdown of the compounded curve.
pub fn calmar_ratio(returns: &[f64], days_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let dd = max_drawdown(&equity_curve(returns, 1.0)).max_drawdown;
    if dd == 0.0 {
        return f64::INFINITY;
    }
    annualized_return(returns, days_per_year) / dd
}

/// Annualized mean excess return over annualized tracking error
/// (population deviation). 0 on length mismatch or zero tracking error.
pub fn information_ratio(returns: &[f64], benchmark: &[f64], days_per_year: f64) -> f64 {
    if returns.is_empty() || returns.len() != benchmark.len() {
        return 0.0;
    }
    let excess: Vec<f64> = returns.iter().zip(benchmark).map(|(r, b)| r - b).collect();
    let m = mean(&excess);
    let tracking = (excess.iter().map(|e| (e - m).powi(2)).sum::<f64>() / excess.len() as f64)
        .sqrt()
        * days_per_year.sqrt();
    if tracking == 0.0 {
        return 0.0;
    }
    m * days_per_year / tracking
}

// ─── Equity and drawdown ────────────────────────────────────────────

/// `[initial, initial·(1+r₀), …]`, one longer than `returns`.
pub fn equity_curve(returns: &[f64], initial: f64) -> Vec<f64> {
    let mut curve = Vec::with_capacity(returns.len() + 1);
    curve.push(initial);
    let mut equity = initial;
    for r in returns {
        equity *= 1.0 + r;
        curve.push(equity);
    }
    curve
}

/// Step returns of an equity curve; a non-positive base yields 0.
pub fn returns_from_equity(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Largest peak-to-trough decline and where it happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Drawdown {
    pub max_drawdown: f64,
    pub peak_index: usize,
    pub trough_index: usize,
}

pub fn max_drawdown(equity: &[f64]) -> Drawdown {
    let mut result = Drawdown::default();
    let Some(&first) = equity.first() else {
        return result;
    };
    let mut peak = first;
    let mut peak_index = 0;
    for (i, &value) in equity.iter().enumerate().skip(1) {
        if value > peak {
            peak = value;
            peak_index = i;
        }
        if peak <= 0.0 {
            continue;
        }
        let dd = (peak - value) / peak;
        if dd > result.max_drawdown {
            result = Drawdown {
                max_drawdown: dd,
                peak_index,
                trough_index: i,
            };
        }
    }
    result
}

// ─── Calendar aggregation ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    /// `YYYY-MM`
    pub month: String,
    /// Sum of the month's daily returns.
    pub total: f64,
}

/// Sum daily returns per calendar month, in date order. Empty when the
/// inputs differ in length.
pub fn monthly_returns(returns: &[f64], dates: &[NaiveDate]) -> Vec<MonthlyReturn> {
    if returns.len() != dates.len() {
        return Vec::new();
    }
    let mut months: Vec<MonthlyReturn> = Vec::new();
    for (r, date) in returns.iter().zip(dates) {
        let key = format!("{:04}-{:02}", date.year(), date.month());
        match months.last_mut() {
            Some(last) if last.month == key => last.total += r,
            _ => months.push(MonthlyReturn {
                month: key,
                total: *r,
            }),
        }
    }
    months
}

// ─── Helpers ────────────────────────────────────────────────────────

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;
    const RETURNS: [f64; 6] = [0.01, -0.02, 0.03, -0.01, 0.02, 0.0];

    fn approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPS * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn return_metrics() {
        approx(cumulative_return(&RETURNS), 0.02948504120000006);
        approx(annualized_return(&RETURNS, 252.0), 2.388766948549711);
        approx(volatility(&RETURNS, 252.0), 0.29698484809835);
    }

    #[test]
    fn risk_adjusted_ratios() {
        approx(sharpe_ratio(&RETURNS, 0.03, 252.0), 7.942381450277146);
        approx(sortino_ratio(&RETURNS, 0.03, 252.0), 29.71767022200582);
        approx(calmar_ratio(&RETURNS, 252.0), 119.43834742748558);
    }

    #[test]
    fn win_and_profit_loss() {
        approx(win_rate(&RETURNS), 0.5);
        approx(profit_loss_ratio(&RETURNS), 1.3333333333333335);
    }

    #[test]
    fn information_ratio_vs_benchmark() {
        let bench = [0.005, -0.01, 0.01, 0.0, 0.01, 0.001];
        approx(information_ratio(&RETURNS, &bench, 252.0), 3.4457331473979407);
        assert_eq!(information_ratio(&RETURNS, &bench[..3], 252.0), 0.0);
        assert_eq!(information_ratio(&RETURNS, &RETURNS, 252.0), 0.0);
    }

    #[test]
    fn drawdown_records_peak_and_trough() {
        let dd = max_drawdown(&equity_curve(&RETURNS, 1.0));
        approx(dd.max_drawdown, 0.02);
        assert_eq!(dd.peak_index, 1);
        assert_eq!(dd.trough_index, 2);

        let dd = max_drawdown(&[100.0, 120.0, 90.0, 130.0, 65.0]);
        approx(dd.max_drawdown, 0.5);
        assert_eq!((dd.peak_index, dd.trough_index), (3, 4));
    }

    #[test]
    fn infinity_sentinels() {
        let gains = [0.01, 0.02, 0.0];
        assert_eq!(sortino_ratio(&gains, 0.03, 252.0), f64::INFINITY);
        assert_eq!(profit_loss_ratio(&gains), f64::INFINITY);
        assert_eq!(calmar_ratio(&gains, 252.0), f64::INFINITY);
        // a single loss has zero deviation around its own mean
        assert_eq!(sortino_ratio(&[0.01, -0.01], 0.03, 252.0), f64::INFINITY);
    }

    #[test]
    fn zero_volatility_gives_zero_sharpe() {
        assert_eq!(sharpe_ratio(&[0.25; 8], 0.03, 252.0), 0.0);
        assert_eq!(volatility(&[0.05], 252.0), 0.0);
    }

    #[test]
    fn empty_returns_are_all_zero() {
        let m = PerformanceMetrics::compute(&[], None, &MetricsConfig::default());
        assert_eq!(m.cumulative_return, 0.0);
        assert_eq!(m.annualized_return, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.sortino_ratio, 0.0);
        assert_eq!(m.profit_loss_ratio, 0.0);
        assert_eq!(m.calmar_ratio, 0.0);
        assert_eq!(m.information_ratio, None);
    }

    #[test]
    fn compute_includes_information_ratio_only_for_matching_benchmark() {
        let cfg = MetricsConfig::default();
        let bench = [0.0; 6];
        assert!(PerformanceMetrics::compute(&RETURNS, Some(&bench), &cfg)
            .information_ratio
            .is_some());
        assert!(PerformanceMetrics::compute(&RETURNS, Some(&bench[..2]), &cfg)
            .information_ratio
            .is_none());
    }

    #[test]
    fn equity_curve_compounds() {
        let curve = equity_curve(&[0.1, -0.5], 2.0);
        assert_eq!(curve.len(), 3);
        approx(curve[1], 2.2);
        approx(curve[2], 1.1);
    }

    #[test]
    fn monthly_returns_sum_per_month() {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        let dates = [d(1, 30), d(1, 31), d(2, 1), d(2, 2), d(3, 1)];
        let returns = [0.01, 0.02, -0.01, 0.0, 0.0];
        let months = monthly_returns(&returns, &dates);
        assert_eq!(months.len(), 3);
        assert_eq!(months[0].month, "2024-01");
        approx(months[0].total, 0.03);
        approx(months[1].total, -0.01);
        // a flat final month is still reported
        assert_eq!(months[2].month, "2024-03");
        assert_eq!(months[2].total, 0.0);

        assert!(monthly_returns(&returns[..2], &dates).is_empty());
    }
}
