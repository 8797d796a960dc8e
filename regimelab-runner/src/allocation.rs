//! Allocation engine: strategy weights within an instrument, and portfolio
//! weights across instruments.
//!
//! Strategy-level functions take one instrument's backtests and return a
//! weight per backtest, in input order. Failed backtests get weight 0.
//! Portfolio allocation ranks instruments by the average Sharpe of their
//! strategies and fits the result into `[min_stock_weight,
//! max_single_stock_weight]` while preserving the total equity exposure.

use std::fmt;

use serde::{Deserialize, Serialize};

use regimelab_core::domain::Instrument;

use crate::backtest::StrategyBacktest;
use crate::config::ConfigError;

const WEIGHT_EPSILON: f64 = 1e-12;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    Sharpe,
    RiskParity,
    Correlation,
    Kelly,
    /// Weighted blend of the other four.
    #[default]
    Combined,
}

/// Blend weights for [`AllocationMethod::Combined`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    pub sharpe: f64,
    pub risk_parity: f64,
    pub correlation: f64,
    pub kelly: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            sharpe: 0.4,
            risk_parity: 0.3,
            correlation: 0.2,
            kelly: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub method: AllocationMethod,
    /// Pairs above this absolute correlation are penalized.
    pub max_correlation: f64,
    pub kelly_fraction: f64,
    pub weights: BlendWeights,
    pub max_single_stock_weight: f64,
    pub min_stock_weight: f64,
    /// Fraction of capital allocated to equities overall.
    pub total_equity_weight: f64,
    /// Final positions below this weight are dropped.
    pub min_final_weight: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            method: AllocationMethod::Combined,
            max_correlation: 0.8,
            kelly_fraction: 0.5,
            weights: BlendWeights::default(),
            max_single_stock_weight: 0.15,
            min_stock_weight: 0.01,
            total_equity_weight: 0.8,
            min_final_weight: 0.005,
        }
    }
}

impl AllocationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |field: &'static str, value: f64| -> Result<(), ConfigError> {
            if value.is_finite() && (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be within [0, 1], got {value}"),
                })
            }
        };
        unit("allocation.max_correlation", self.max_correlation)?;
        unit("allocation.kelly_fraction", self.kelly_fraction)?;
        unit("allocation.max_single_stock_weight", self.max_single_stock_weight)?;
        unit("allocation.min_stock_weight", self.min_stock_weight)?;
        unit("allocation.total_equity_weight", self.total_equity_weight)?;
        unit("allocation.min_final_weight", self.min_final_weight)?;

        if self.max_single_stock_weight <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "allocation.max_single_stock_weight",
                reason: "must be positive".into(),
            });
        }
        if self.min_stock_weight > self.max_single_stock_weight {
            return Err(ConfigError::Invalid {
                field: "allocation.min_stock_weight",
                reason: format!(
                    "{} exceeds max_single_stock_weight {}",
                    self.min_stock_weight, self.max_single_stock_weight
                ),
            });
        }

        let w = &self.weights;
        let blend = [w.sharpe, w.risk_parity, w.correlation, w.kelly];
        if blend.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ConfigError::Invalid {
                field: "allocation.weights",
                reason: "blend weights must be non-negative numbers".into(),
            });
        }
        if blend.iter().sum::<f64>() <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "allocation.weights",
                reason: "at least one blend weight must be positive".into(),
            });
        }
        Ok(())
    }
}

// ─── Strategy weights ────────────────────────────────────────────────

/// Spread `scores` of the valid backtests over all of `results`.
///
/// Falls back to an equal split over valid backtests when every score is 0.
fn normalize_valid(results: &[StrategyBacktest], scores: impl Fn(&StrategyBacktest) -> f64) -> Vec<f64> {
    let raw: Vec<Option<f64>> = results
        .iter()
        .map(|r| r.is_valid().then(|| scores(r)))
        .collect();
    let valid = raw.iter().flatten().count();
    if valid == 0 {
        return vec![0.0; results.len()];
    }
    let total: f64 = raw.iter().flatten().sum();
    raw.iter()
        .map(|score| match score {
            None => 0.0,
            Some(_) if total <= 0.0 => 1.0 / valid as f64,
            Some(s) => s / total,
        })
        .collect()
}

/// Proportional to Sharpe, negatives clipped to 0.
pub fn allocate_by_sharpe(results: &[StrategyBacktest]) -> Vec<f64> {
    normalize_valid(results, |r| {
        r.metrics()
            .map(|m| m.sharpe_ratio)
            .filter(|s| s.is_finite())
            .unwrap_or(0.0)
            .max(0.0)
    })
}

/// Inverse risk, with the absolute max drawdown standing in for risk.
/// A zero drawdown counts as 0.01.
pub fn allocate_by_risk_parity(results: &[StrategyBacktest]) -> Vec<f64> {
    normalize_valid(results, |r| {
        let drawdown = r.metrics().map(|m| m.max_drawdown.abs()).unwrap_or(0.0);
        let risk = if drawdown > 0.0 { drawdown } else { 0.01 };
        1.0 / risk
    })
}

/// Sharpe weights, each multiplied by `1 - |corr|` for every other strategy
/// it is correlated with above `max_correlation`.
///
/// An empty matrix leaves the Sharpe weights unchanged.
pub fn allocate_with_correlation(
    results: &[StrategyBacktest],
    correlation: &[Vec<f64>],
    max_correlation: f64,
) -> Vec<f64> {
    let sharpe = allocate_by_sharpe(results);
    if correlation.is_empty() {
        return sharpe;
    }

    let adjusted: Vec<f64> = sharpe
        .iter()
        .enumerate()
        .map(|(i, &w)| {
            let row = correlation.get(i).map(Vec::as_slice).unwrap_or(&[]);
            let penalty: f64 = row
                .iter()
                .enumerate()
                .filter(|&(j, c)| j != i && c.abs() > max_correlation)
                .map(|(_, c)| 1.0 - c.abs())
                .product();
            w * penalty
        })
        .collect();

    let total: f64 = adjusted.iter().sum();
    if total > 0.0 {
        return adjusted.iter().map(|w| w / total).collect();
    }
    let valid = results.iter().filter(|r| r.is_valid()).count();
    results
        .iter()
        .map(|r| if r.is_valid() { 1.0 / valid as f64 } else { 0.0 })
        .collect()
}

/// Fractional Kelly: `fraction × (win_rate - loss_rate / profit_loss_ratio)`,
/// floored at 0. A zero profit/loss ratio is treated as 1.
pub fn allocate_by_kelly(results: &[StrategyBacktest], fraction: f64) -> Vec<f64> {
    normalize_valid(results, |r| {
        let Some(m) = r.metrics() else { return 0.0 };
        let win_rate = if m.win_rate.is_finite() { m.win_rate } else { 0.0 };
        let ratio = if m.profit_loss_ratio > 0.0 { m.profit_loss_ratio } else { 1.0 };
        (fraction * (win_rate - (1.0 - win_rate) / ratio)).max(0.0)
    })
}

/// Strategy weights by the configured method; they sum to 1 whenever any
/// backtest succeeded.
pub fn allocate_strategies(
    results: &[StrategyBacktest],
    correlation: &[Vec<f64>],
    config: &AllocationConfig,
) -> Vec<f64> {
    match config.method {
        AllocationMethod::Sharpe => allocate_by_sharpe(results),
        AllocationMethod::RiskParity => allocate_by_risk_parity(results),
        AllocationMethod::Correlation => {
            allocate_with_correlation(results, correlation, config.max_correlation)
        }
        AllocationMethod::Kelly => allocate_by_kelly(results, config.kelly_fraction),
        AllocationMethod::Combined => {
            let b = &config.weights;
            let parts = [
                (allocate_by_sharpe(results), b.sharpe),
                (allocate_by_risk_parity(results), b.risk_parity),
                (
                    allocate_with_correlation(results, correlation, config.max_correlation),
                    b.correlation,
                ),
                (allocate_by_kelly(results, config.kelly_fraction), b.kelly),
            ];
            let blended: Vec<f64> = (0..results.len())
                .map(|i| parts.iter().map(|(w, k)| w[i] * k).sum())
                .collect();
            let total: f64 = blended.iter().sum();
            if total > 0.0 {
                blended.iter().map(|w| w / total).collect()
            } else {
                blended
            }
        }
    }
}

/// A strategy's share of one instrument's allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyWeight {
    pub strategy: String,
    pub weight: f64,
}

/// Correlate the backtests' positions, then weight them by the configured method.
pub fn strategy_weights(results: &[StrategyBacktest], config: &AllocationConfig) -> Vec<StrategyWeight> {
    let correlation = correlation_matrix(results);
    allocate_strategies(results, &correlation, config)
        .into_iter()
        .zip(results)
        .map(|(weight, r)| StrategyWeight {
            strategy: r.strategy.clone(),
            weight,
        })
        .collect()
}

/// Pearson correlation of the strategies' position series.
///
/// The diagonal is 1. Pairs with missing or unequal-length series, or a
/// constant series, correlate at 0.
pub fn correlation_matrix(results: &[StrategyBacktest]) -> Vec<Vec<f64>> {
    let series: Vec<&[f64]> = results
        .iter()
        .map(|r| r.result.as_ref().map(|b| b.positions.as_slice()).unwrap_or(&[]))
        .collect();
    (0..series.len())
        .map(|i| {
            (0..series.len())
                .map(|j| if i == j { 1.0 } else { pearson(series[i], series[j]) })
                .collect()
        })
        .collect()
}

/// Population Pearson correlation; 0 when undefined.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        cov / denom
    }
}

// ─── Portfolio allocation ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionAllocation {
    pub instrument: Instrument,
    pub weight: f64,
    /// Average Sharpe across the instrument's strategies, floored at 0.
    pub sharpe_ratio: f64,
}

/// Mean Sharpe over an instrument's successful backtests, floored at 0.
pub fn average_sharpe(results: &[StrategyBacktest]) -> f64 {
    let sharpes: Vec<f64> = results
        .iter()
        .filter_map(StrategyBacktest::metrics)
        .map(|m| m.sharpe_ratio)
        .filter(|s| s.is_finite())
        .collect();
    if sharpes.is_empty() {
        return 0.0;
    }
    (sharpes.iter().sum::<f64>() / sharpes.len() as f64).max(0.0)
}

/// Weight instruments by average Sharpe.
///
/// Weights land in `[min_stock_weight, max_single_stock_weight]` and sum to
/// `min(total_equity_weight, n × max_single_stock_weight)`. When even the
/// floor overshoots that total, weights are scaled proportionally instead
/// and may fall below the floor.
pub fn allocate_portfolio<R: AsRef<[StrategyBacktest]>>(
    instruments: &[Instrument],
    results: &[R],
    config: &AllocationConfig,
) -> Vec<PositionAllocation> {
    let n = instruments.len();
    if n == 0 {
        return Vec::new();
    }
    let sharpes: Vec<f64> = (0..n)
        .map(|i| results.get(i).map_or(0.0, |r| average_sharpe(r.as_ref())))
        .collect();

    let total = config.total_equity_weight;
    let sharpe_sum: f64 = sharpes.iter().sum();
    let mut weights: Vec<f64> = if sharpe_sum > 0.0 {
        sharpes.iter().map(|s| s / sharpe_sum * total).collect()
    } else {
        vec![total / n as f64; n]
    };
    for w in &mut weights {
        *w = w.clamp(config.min_stock_weight, config.max_single_stock_weight);
    }

    let target = total.min(n as f64 * config.max_single_stock_weight);
    fit_to_total(
        &mut weights,
        target,
        config.min_stock_weight,
        config.max_single_stock_weight,
    );

    instruments
        .iter()
        .zip(weights)
        .zip(sharpes)
        .map(|((instrument, weight), sharpe_ratio)| PositionAllocation {
            instrument: instrument.clone(),
            weight,
            sharpe_ratio,
        })
        .collect()
}

/// Rescale `weights` to sum to `target` without leaving `[floor, cap]`.
///
/// `target` must not exceed `len × cap`. Weights pinned at a bound stay
/// there while the others absorb the difference.
fn fit_to_total(weights: &mut [f64], target: f64, floor: f64, cap: f64) {
    let sum: f64 = weights.iter().sum();
    if weights.is_empty() || (sum - target).abs() <= WEIGHT_EPSILON {
        return;
    }
    if sum < target {
        fill_up_to_cap(weights, target, cap);
    } else if weights.len() as f64 * floor > target {
        for w in weights.iter_mut() {
            *w *= target / sum;
        }
    } else {
        drain_down_to_floor(weights, target, floor);
    }
}

fn fill_up_to_cap(weights: &mut [f64], target: f64, cap: f64) {
    loop {
        let pinned: f64 = weights.iter().filter(|&&w| w >= cap - WEIGHT_EPSILON).sum();
        let free: Vec<usize> = (0..weights.len())
            .filter(|&i| weights[i] < cap - WEIGHT_EPSILON)
            .collect();
        if free.is_empty() {
            return;
        }
        let remaining = target - pinned;
        let free_sum: f64 = free.iter().map(|&i| weights[i]).sum();
        let mut overflow = false;
        for &i in &free {
            let w = if free_sum > 0.0 {
                weights[i] * remaining / free_sum
            } else {
                remaining / free.len() as f64
            };
            if w >= cap {
                overflow = true;
            }
            weights[i] = w.min(cap);
        }
        if !overflow {
            return;
        }
    }
}

fn drain_down_to_floor(weights: &mut [f64], target: f64, floor: f64) {
    loop {
        let pinned: f64 = weights.iter().filter(|&&w| w <= floor + WEIGHT_EPSILON).sum();
        let free: Vec<usize> = (0..weights.len())
            .filter(|&i| weights[i] > floor + WEIGHT_EPSILON)
            .collect();
        let free_sum: f64 = free.iter().map(|&i| weights[i]).sum();
        if free.is_empty() || free_sum <= 0.0 {
            return;
        }
        let scale = (target - pinned) / free_sum;
        let mut underflow = false;
        for &i in &free {
            let w = weights[i] * scale;
            if w <= floor {
                underflow = true;
            }
            weights[i] = w.max(floor);
        }
        if !underflow {
            return;
        }
    }
}

// ─── Portfolio metrics ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Concentration {
    Low,
    Medium,
    High,
}

impl Concentration {
    /// `high` above 0.1, `medium` above 0.05.
    pub fn from_herfindahl(h: f64) -> Self {
        if h > 0.1 {
            Concentration::High
        } else if h > 0.05 {
            Concentration::Medium
        } else {
            Concentration::Low
        }
    }
}

impl fmt::Display for Concentration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Concentration::Low => "low",
            Concentration::Medium => "medium",
            Concentration::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub total_weight: f64,
    /// Σ weight × Sharpe.
    pub weighted_sharpe: f64,
    pub max_weight: f64,
    pub min_weight: f64,
    pub avg_weight: f64,
    /// Σ weight²
    pub herfindahl: f64,
    pub concentration: Concentration,
}

impl PortfolioMetrics {
    pub fn compute(positions: &[PositionAllocation]) -> Self {
        let weights: Vec<f64> = positions.iter().map(|p| p.weight).collect();
        let total_weight: f64 = weights.iter().sum();
        let herfindahl: f64 = weights.iter().map(|w| w * w).sum();
        let (max_weight, min_weight, avg_weight) = if weights.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                weights.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                weights.iter().copied().fold(f64::INFINITY, f64::min),
                total_weight / weights.len() as f64,
            )
        };
        Self {
            total_weight,
            weighted_sharpe: positions.iter().map(|p| p.weight * p.sharpe_ratio).sum(),
            max_weight,
            min_weight,
            avg_weight,
            herfindahl,
            concentration: Concentration::from_herfindahl(herfindahl),
        }
    }
}

// ─── Final positions ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPositions {
    pub positions: Vec<PositionAllocation>,
    /// Metrics over the kept positions.
    pub metrics: PortfolioMetrics,
    pub num_positions: usize,
    /// Sum of the kept weights.
    pub effective_weight: f64,
}

/// Drop positions below `min_final_weight` and spread their weight over
/// the rest, capped at `max_single_stock_weight`.
pub fn final_positions(positions: &[PositionAllocation], config: &AllocationConfig) -> FinalPositions {
    let before: f64 = positions.iter().map(|p| p.weight).sum();
    let mut kept: Vec<PositionAllocation> = positions
        .iter()
        .filter(|p| p.weight >= config.min_final_weight)
        .cloned()
        .collect();

    let mut weights: Vec<f64> = kept.iter().map(|p| p.weight).collect();
    let target = before.min(kept.len() as f64 * config.max_single_stock_weight);
    if weights.iter().sum::<f64>() < target {
        fill_up_to_cap(&mut weights, target, config.max_single_stock_weight);
    }
    for (p, w) in kept.iter_mut().zip(weights) {
        p.weight = w;
    }

    FinalPositions {
        metrics: PortfolioMetrics::compute(&kept),
        num_positions: kept.len(),
        effective_weight: kept.iter().map(|p| p.weight).sum(),
        positions: kept,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::PositionBacktest;
    use crate::metrics::PerformanceMetrics;

    fn metrics(sharpe: f64, max_drawdown: f64, win_rate: f64, profit_loss_ratio: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            cumulative_return: 0.0,
            annualized_return: 0.0,
            max_drawdown,
            volatility: 0.1,
            sharpe_ratio: sharpe,
            sortino_ratio: 0.0,
            win_rate,
            profit_loss_ratio,
            calmar_ratio: 0.0,
            information_ratio: None,
        }
    }

    fn ok(name: &str, m: PerformanceMetrics, positions: Vec<f64>) -> StrategyBacktest {
        StrategyBacktest {
            strategy: name.into(),
            result: Some(PositionBacktest {
                positions,
                portfolio_returns: vec![],
                equity_curve: vec![1.0],
                rebalances: vec![],
                metrics: m,
                final_capital: 1.0,
            }),
            error: None,
        }
    }

    fn failed(name: &str) -> StrategyBacktest {
        StrategyBacktest {
            strategy: name.into(),
            result: None,
            error: Some("boom".into()),
        }
    }

    fn instruments(n: u32) -> Vec<Instrument> {
        (0..n)
            .map(|i| Instrument {
                sector: "Tech".into(),
                ..Instrument::new(i, format!("S{i}"))
            })
            .collect()
    }

    fn with_sharpe(s: f64) -> Vec<StrategyBacktest> {
        vec![ok("a", metrics(s, 0.1, 0.5, 1.0), vec![])]
    }

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-9, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn sharpe_weights_clip_negatives_and_skip_failures() {
        let results = vec![
            ok("a", metrics(2.0, 0.1, 0.5, 1.0), vec![]),
            ok("b", metrics(-1.0, 0.1, 0.5, 1.0), vec![]),
            failed("c"),
            ok("d", metrics(6.0, 0.1, 0.5, 1.0), vec![]),
        ];
        assert_close(&allocate_by_sharpe(&results), &[0.25, 0.0, 0.0, 0.75]);
    }

    #[test]
    fn sharpe_weights_split_equally_when_all_zero() {
        let results = vec![
            ok("a", metrics(-1.0, 0.1, 0.5, 1.0), vec![]),
            failed("b"),
            ok("c", metrics(0.0, 0.1, 0.5, 1.0), vec![]),
        ];
        assert_close(&allocate_by_sharpe(&results), &[0.5, 0.0, 0.5]);
        assert_close(&allocate_by_sharpe(&[failed("x")]), &[0.0]);
    }

    #[test]
    fn risk_parity_inverts_drawdown() {
        let results = vec![
            ok("a", metrics(1.0, 0.1, 0.5, 1.0), vec![]),
            ok("b", metrics(1.0, 0.2, 0.5, 1.0), vec![]),
            // zero drawdown counts as 0.01
            ok("c", metrics(1.0, 0.0, 0.5, 1.0), vec![]),
        ];
        // inverse risks 10, 5, 100
        assert_close(&allocate_by_risk_parity(&results), &[10.0 / 115.0, 5.0 / 115.0, 100.0 / 115.0]);
    }

    #[test]
    fn correlation_penalizes_crowded_pairs() {
        let results = vec![
            ok("a", metrics(1.0, 0.1, 0.5, 1.0), vec![]),
            ok("b", metrics(1.0, 0.1, 0.5, 1.0), vec![]),
            ok("c", metrics(2.0, 0.1, 0.5, 1.0), vec![]),
        ];
        let corr = vec![
            vec![1.0, 0.9, 0.0],
            vec![0.9, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        // sharpe weights 0.25, 0.25, 0.5; a and b each × 0.1
        let w = allocate_with_correlation(&results, &corr, 0.8);
        let total = 0.025 + 0.025 + 0.5;
        assert_close(&w, &[0.025 / total, 0.025 / total, 0.5 / total]);
        assert_close(&allocate_with_correlation(&results, &[], 0.8), &[0.25, 0.25, 0.5]);
    }

    #[test]
    fn correlation_falls_back_to_equal_split_over_valid() {
        let results = vec![
            ok("a", metrics(1.0, 0.1, 0.5, 1.0), vec![]),
            ok("b", metrics(1.0, 0.1, 0.5, 1.0), vec![]),
            failed("c"),
        ];
        let corr = vec![vec![1.0, 1.0, 0.0], vec![1.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]];
        assert_close(&allocate_with_correlation(&results, &corr, 0.8), &[0.5, 0.5, 0.0]);
    }

    #[test]
    fn kelly_floors_negative_edges() {
        let results = vec![
            // 0.5 × (0.6 - 0.4 / 2) = 0.2
            ok("a", metrics(1.0, 0.1, 0.6, 2.0), vec![]),
            // 0.5 × (0.3 - 0.7) < 0
            ok("b", metrics(1.0, 0.1, 0.3, 1.0), vec![]),
            // ratio 0 treated as 1: 0.5 × (0.8 - 0.2) = 0.3
            ok("c", metrics(1.0, 0.1, 0.8, 0.0), vec![]),
            // no losses: 0.5 × 0.7 = 0.35
            ok("d", metrics(1.0, 0.1, 0.7, f64::INFINITY), vec![]),
        ];
        let total = 0.2 + 0.3 + 0.35;
        assert_close(
            &allocate_by_kelly(&results, 0.5),
            &[0.2 / total, 0.0, 0.3 / total, 0.35 / total],
        );
    }

    #[test]
    fn combined_blend_sums_to_one() {
        let results = vec![
            ok("a", metrics(1.5, 0.1, 0.6, 1.5), vec![0.0, 1.0, 1.0, 0.0]),
            ok("b", metrics(0.5, 0.3, 0.4, 0.8), vec![0.0, 1.0, 1.0, 0.0]),
            failed("c"),
            ok("d", metrics(0.8, 0.05, 0.55, 1.2), vec![1.0, 0.0, 0.5, 0.5]),
        ];
        let weights = strategy_weights(&results, &AllocationConfig::default());
        assert_eq!(weights.len(), 4);
        assert_eq!(weights[2].weight, 0.0);
        let sum: f64 = weights.iter().map(|w| w.weight).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(weights.iter().all(|w| w.weight >= 0.0));
    }

    #[test]
    fn correlation_matrix_of_positions() {
        let results = vec![
            ok("a", metrics(1.0, 0.1, 0.5, 1.0), vec![0.0, 1.0, 0.0, 1.0]),
            ok("b", metrics(1.0, 0.1, 0.5, 1.0), vec![1.0, 0.0, 1.0, 0.0]),
            ok("c", metrics(1.0, 0.1, 0.5, 1.0), vec![0.5, 0.5, 0.5, 0.5]),
            failed("d"),
        ];
        let m = correlation_matrix(&results);
        assert_eq!(m.len(), 4);
        assert!((m[0][1] + 1.0).abs() < 1e-12);
        assert_eq!(m[0][2], 0.0);
        assert_eq!(m[0][3], 0.0);
        assert_eq!(m[3][3], 1.0);
        assert_eq!(m[1][0], m[0][1]);
    }

    #[test]
    fn portfolio_respects_cap_and_total() {
        let config = AllocationConfig::default();
        let results: Vec<_> = [5.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]
            .iter()
            .map(|&s| with_sharpe(s))
            .collect();
        let allocation = allocate_portfolio(&instruments(10), &results, &config);
        let total: f64 = allocation.iter().map(|p| p.weight).sum();
        assert!((total - 0.8).abs() < 1e-9);
        assert!(allocation.iter().all(|p| p.weight <= 0.15 + 1e-12));
        assert!(allocation.iter().all(|p| p.weight >= 0.01 - 1e-12));
        assert!((allocation[0].weight - 0.15).abs() < 1e-12);
        assert_eq!(allocation[0].sharpe_ratio, 5.0);
    }

    #[test]
    fn portfolio_total_shrinks_when_cap_binds() {
        let config = AllocationConfig::default();
        let results = vec![with_sharpe(1.0), with_sharpe(3.0)];
        let allocation = allocate_portfolio(&instruments(2), &results, &config);
        assert_close(
            &allocation.iter().map(|p| p.weight).collect::<Vec<_>>(),
            &[0.15, 0.15],
        );
    }

    #[test]
    fn portfolio_without_positive_sharpe_splits_equally() {
        let config = AllocationConfig::default();
        let results = vec![with_sharpe(-1.0), vec![failed("x")], with_sharpe(0.0)];
        let allocation = allocate_portfolio(&instruments(3), &results, &config);
        for p in &allocation {
            assert!((p.weight - 0.15).abs() < 1e-12);
            assert_eq!(p.sharpe_ratio, 0.0);
        }
    }

    #[test]
    fn portfolio_floor_lifts_weak_names() {
        let config = AllocationConfig {
            total_equity_weight: 0.5,
            max_single_stock_weight: 0.3,
            min_stock_weight: 0.05,
            ..AllocationConfig::default()
        };
        let results = vec![with_sharpe(10.0), with_sharpe(10.0), with_sharpe(0.0)];
        let allocation = allocate_portfolio(&instruments(3), &results, &config);
        let weights: Vec<f64> = allocation.iter().map(|p| p.weight).collect();
        assert_close(&weights, &[0.225, 0.225, 0.05]);
    }

    #[test]
    fn portfolio_metrics_and_concentration() {
        let positions: Vec<PositionAllocation> = instruments(2)
            .into_iter()
            .zip([(0.3, 1.0), (0.1, 2.0)])
            .map(|(instrument, (weight, sharpe_ratio))| PositionAllocation {
                instrument,
                weight,
                sharpe_ratio,
            })
            .collect();
        let m = PortfolioMetrics::compute(&positions);
        assert!((m.total_weight - 0.4).abs() < 1e-12);
        assert!((m.weighted_sharpe - 0.5).abs() < 1e-12);
        assert_eq!(m.max_weight, 0.3);
        assert_eq!(m.min_weight, 0.1);
        assert!((m.avg_weight - 0.2).abs() < 1e-12);
        assert!((m.herfindahl - 0.1).abs() < 1e-12);
        assert_eq!(Concentration::from_herfindahl(0.11), Concentration::High);
        assert_eq!(Concentration::from_herfindahl(0.06), Concentration::Medium);
        assert_eq!(Concentration::from_herfindahl(0.05).to_string(), "low");
        assert_eq!(PortfolioMetrics::compute(&[]).max_weight, 0.0);
    }

    #[test]
    fn final_positions_drop_dust_and_refill() {
        let config = AllocationConfig::default();
        let positions: Vec<PositionAllocation> = instruments(4)
            .into_iter()
            .zip([0.3, 0.2, 0.097, 0.003])
            .map(|(instrument, weight)| PositionAllocation {
                instrument,
                weight,
                sharpe_ratio: 1.0,
            })
            .collect();
        let config = AllocationConfig {
            max_single_stock_weight: 0.5,
            ..config
        };
        let result = final_positions(&positions, &config);
        assert_eq!(result.num_positions, 3);
        assert!((result.effective_weight - 0.6).abs() < 1e-9);
        assert!(result.positions.iter().all(|p| p.weight <= 0.5));
        assert_eq!(result.positions[0].instrument.symbol, "S0");
        assert!(result.positions[0].weight > 0.3);
    }

    #[test]
    fn final_positions_of_nothing() {
        let result = final_positions(&[], &AllocationConfig::default());
        assert_eq!(result.num_positions, 0);
        assert_eq!(result.effective_weight, 0.0);
    }

    #[test]
    fn validate_bounds() {
        assert!(AllocationConfig::default().validate().is_ok());
        let bad = AllocationConfig {
            min_stock_weight: 0.2,
            ..AllocationConfig::default()
        };
        assert!(bad.validate().unwrap_err().to_string().contains("allocation.min_stock_weight"));
        let bad = AllocationConfig {
            total_equity_weight: 1.5,
            ..AllocationConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
