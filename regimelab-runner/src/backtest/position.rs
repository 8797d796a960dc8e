//! Fractional-position backtests of the strategy bank.
//!
//! At step `t` a strategy sees prices `0..=t`, the indicators computable
//! from them and the regime view for `t`, and returns a target position in
//! `[0, 1]`. That position is held into step `t + 1` and earns its return,
//! so no decision is scored against the price it was made from.

use serde::{Deserialize, Serialize};
use tracing::warn;

use regimelab_core::indicators::IndicatorSet;
use regimelab_core::strategy::{MarketView, Strategy, StrategyError};

use crate::metrics::{equity_curve, MetricsConfig, PerformanceMetrics};
use crate::regime::RegimeTrack;

/// Position held before the first decision.
pub const INITIAL_POSITION: f64 = 0.5;

/// A change of target position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rebalance {
    pub step: usize,
    pub from: f64,
    pub to: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionBacktest {
    /// Target position decided at each step.
    pub positions: Vec<f64>,
    /// One per step; step 0 has no prior position and earns 0.
    pub portfolio_returns: Vec<f64>,
    pub equity_curve: Vec<f64>,
    pub rebalances: Vec<Rebalance>,
    pub metrics: PerformanceMetrics,
    pub final_capital: f64,
}

/// One strategy's backtest, or the error that stopped it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyBacktest {
    pub strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<PositionBacktest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StrategyBacktest {
    /// Metrics of a successful run; `None` excludes it from ranking.
    pub fn metrics(&self) -> Option<&PerformanceMetrics> {
        self.result.as_ref().map(|r| &r.metrics)
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }
}

/// Walk one strategy through the full price history.
///
/// The strategy is reset first. Metrics are taken over the per-step
/// portfolio returns, with the instrument's own returns as benchmark.
pub fn backtest_strategy(
    strategy: &mut dyn Strategy,
    prices: &[f64],
    indicators: &IndicatorSet,
    regimes: &RegimeTrack,
    initial_capital: f64,
    metrics: &MetricsConfig,
) -> Result<PositionBacktest, StrategyError> {
    strategy.reset();
    let market_returns = indicators.returns.values();

    let mut positions = Vec::with_capacity(prices.len());
    let mut portfolio_returns = Vec::with_capacity(prices.len());
    let mut benchmark = Vec::with_capacity(prices.len());
    let mut rebalances = Vec::new();
    let mut held = INITIAL_POSITION;

    for step in 0..prices.len() {
        let market_return = match step {
            0 => 0.0,
            _ => market_returns.get(step - 1).copied().unwrap_or(0.0),
        };
        portfolio_returns.push(if step == 0 { 0.0 } else { held * market_return });
        benchmark.push(market_return);

        let view = MarketView::new(&prices[..=step], indicators);
        let signal = strategy.generate_signal(&view, regimes.at(step))?;
        if signal.position != held {
            rebalances.push(Rebalance {
                step,
                from: held,
                to: signal.position,
            });
        }
        held = signal.position;
        positions.push(held);
    }

    // The first entry is a placeholder, so the curve starts at step 0.
    let curve = equity_curve(portfolio_returns.get(1..).unwrap_or(&[]), initial_capital);
    let final_capital = curve.last().copied().unwrap_or(initial_capital);
    Ok(PositionBacktest {
        metrics: PerformanceMetrics::compute(&portfolio_returns, Some(&benchmark), metrics),
        positions,
        portfolio_returns,
        equity_curve: curve,
        rebalances,
        final_capital,
    })
}

/// Backtest every strategy; a failure is recorded on that strategy's entry
/// and the rest still run.
pub fn backtest_multiple_strategies(
    strategies: &mut [Box<dyn Strategy>],
    prices: &[f64],
    indicators: &IndicatorSet,
    regimes: &RegimeTrack,
    initial_capital: f64,
    metrics: &MetricsConfig,
) -> Vec<StrategyBacktest> {
    strategies
        .iter_mut()
        .map(|strategy| {
            let name = strategy.name().to_string();
            match backtest_strategy(
                strategy.as_mut(),
                prices,
                indicators,
                regimes,
                initial_capital,
                metrics,
            ) {
                Ok(result) => StrategyBacktest {
                    strategy: name,
                    result: Some(result),
                    error: None,
                },
                Err(e) => {
                    warn!(strategy = %name, error = %e, "strategy backtest failed");
                    StrategyBacktest {
                        strategy: name,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use regimelab_core::hmm::HmmPrediction;
    use regimelab_core::indicators::{compute_indicators, IndicatorConfig};
    use regimelab_core::strategy::{default_strategies, StrategyParams, StrategySignal};

    /// Holds `position` regardless of input; counts its calls.
    struct Fixed {
        position: f64,
        calls: usize,
    }

    impl Strategy for Fixed {
        fn name(&self) -> &str {
            "Fixed"
        }

        fn generate_signal(
            &mut self,
            _market: &MarketView<'_>,
            _regime: &HmmPrediction,
        ) -> Result<StrategySignal, StrategyError> {
            self.calls += 1;
            Ok(StrategySignal::hold(self.position, 1.0))
        }
    }

    /// Long only after it has seen a rising last price.
    struct PeekLast;

    impl Strategy for PeekLast {
        fn name(&self) -> &str {
            "PeekLast"
        }

        fn generate_signal(
            &mut self,
            market: &MarketView<'_>,
            _regime: &HmmPrediction,
        ) -> Result<StrategySignal, StrategyError> {
            let p = market.prices();
            let up = p.len() >= 2 && p[p.len() - 1] > p[p.len() - 2];
            Ok(StrategySignal::hold(if up { 1.0 } else { 0.0 }, 1.0))
        }
    }

    struct Broken;

    impl Strategy for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        fn generate_signal(
            &mut self,
            _market: &MarketView<'_>,
            _regime: &HmmPrediction,
        ) -> Result<StrategySignal, StrategyError> {
            Err(StrategyError::NonFinite {
                field: "sma",
                value: f64::NAN,
            })
        }
    }

    fn regime() -> RegimeTrack {
        RegimeTrack::Static(HmmPrediction {
            states: vec![1],
            state_probs: vec![0.2, 0.6, 0.2],
            current_state: 1,
            prev_state: None,
            next_state: 1,
            next_observation: 0,
        })
    }

    fn run(strategy: &mut dyn Strategy, prices: &[f64]) -> PositionBacktest {
        let indicators = compute_indicators(prices, &IndicatorConfig::default());
        backtest_strategy(strategy, prices, &indicators, &regime(), 1.0, &MetricsConfig::default())
            .unwrap()
    }

    #[test]
    fn full_position_tracks_the_instrument() {
        let prices = [100.0, 110.0, 99.0, 108.9];
        let result = run(&mut Fixed { position: 1.0, calls: 0 }, &prices);
        assert_eq!(result.portfolio_returns.len(), 4);
        assert_eq!(result.portfolio_returns[0], 0.0);
        assert_eq!(result.equity_curve.len(), 4);
        assert!((result.final_capital - 1.089).abs() < 1e-12);
        assert_eq!(result.rebalances, vec![Rebalance { step: 0, from: 0.5, to: 1.0 }]);
    }

    #[test]
    fn half_position_earns_half_the_return() {
        let result = run(&mut Fixed { position: 0.5, calls: 0 }, &[100.0, 120.0]);
        assert!((result.portfolio_returns[1] - 0.1).abs() < 1e-12);
        assert!((result.final_capital - 1.1).abs() < 1e-12);
        assert!(result.rebalances.is_empty());
    }

    #[test]
    fn decisions_earn_the_following_return() {
        // steps 1 and 3 rise; each decision only pays off on the next step
        let prices = [100.0, 110.0, 99.0, 108.9, 98.01];
        let result = run(&mut PeekLast, &prices);
        assert_eq!(result.positions, vec![0.0, 1.0, 0.0, 1.0, 0.0]);
        assert_eq!(result.portfolio_returns[1], 0.0);
        assert!((result.portfolio_returns[2] - -0.1).abs() < 1e-12);
        assert_eq!(result.portfolio_returns[3], 0.0);
        assert!((result.portfolio_returns[4] - -0.1).abs() < 1e-12);
    }

    #[test]
    fn strategy_sees_every_step_once() {
        let mut s = Fixed { position: 0.3, calls: 0 };
        run(&mut s, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(s.calls, 5);
    }

    #[test]
    fn failures_are_recorded_per_strategy() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + f64::from(i)).collect();
        let indicators = compute_indicators(&prices, &IndicatorConfig::default());
        let mut bank: Vec<Box<dyn Strategy>> =
            vec![Box::new(Broken), Box::new(Fixed { position: 1.0, calls: 0 })];
        let results = backtest_multiple_strategies(
            &mut bank,
            &prices,
            &indicators,
            &regime(),
            1.0,
            &MetricsConfig::default(),
        );
        assert_eq!(results.len(), 2);
        assert!(!results[0].is_valid());
        assert!(results[0].error.as_deref().unwrap().contains("sma"));
        assert!(results[0].metrics().is_none());
        assert!(results[1].is_valid());
        assert!(results[1].metrics().unwrap().cumulative_return > 0.0);
    }

    #[test]
    fn default_bank_runs_on_short_history() {
        let prices = [100.0, 101.0, 99.5, 102.0, 103.0];
        let indicators = compute_indicators(&prices, &IndicatorConfig::default());
        let mut bank = default_strategies(&StrategyParams::default());
        let results = backtest_multiple_strategies(
            &mut bank,
            &prices,
            &indicators,
            &regime(),
            1.0,
            &MetricsConfig::default(),
        );
        assert_eq!(results.len(), 10);
        for r in &results {
            assert!(r.is_valid(), "{}: {:?}", r.strategy, r.error);
            let bt = r.result.as_ref().unwrap();
            assert_eq!(bt.positions.len(), prices.len());
            assert!(bt.positions.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }
}
