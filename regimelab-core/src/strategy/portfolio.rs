//! Portfolio optimization: RSI extremes confirmed by the recent regime drift.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::{finite, MarketView, SignalAction, Strategy, StrategyError, StrategySignal, BEARISH, BULLISH};
use crate::hmm::HmmPrediction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioOptimizationParams {
    pub history_length: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Regime probability needed to trade on drift alone.
    pub trend_prob: f64,
}

impl Default for PortfolioOptimizationParams {
    fn default() -> Self {
        Self {
            history_length: 5,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            trend_prob: 0.6,
        }
    }
}

/// Direction of recent regime changes. Lower state numbers are more
/// bullish, so a falling state index is an upward drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateTrend {
    Up,
    Down,
    Neutral,
}

/// The one stateful strategy: it remembers the last `history_length`
/// current states it was shown.
#[derive(Debug, Clone)]
pub struct PortfolioOptimizationStrategy {
    params: PortfolioOptimizationParams,
    history: VecDeque<usize>,
}

impl PortfolioOptimizationStrategy {
    pub fn new(params: PortfolioOptimizationParams) -> Self {
        Self {
            history: VecDeque::with_capacity(params.history_length + 1),
            params,
        }
    }

    pub fn history(&self) -> &VecDeque<usize> {
        &self.history
    }

    /// Majority direction of consecutive state changes; neutral with fewer
    /// than three remembered states.
    pub fn state_trend(&self) -> StateTrend {
        if self.history.len() < 3 {
            return StateTrend::Neutral;
        }
        let (mut up, mut down) = (0usize, 0usize);
        for (prev, next) in self.history.iter().zip(self.history.iter().skip(1)) {
            if next < prev {
                up += 1;
            } else if next > prev {
                down += 1;
            }
        }
        match up.cmp(&down) {
            std::cmp::Ordering::Greater => StateTrend::Up,
            std::cmp::Ordering::Less => StateTrend::Down,
            std::cmp::Ordering::Equal => StateTrend::Neutral,
        }
    }
}

impl Strategy for PortfolioOptimizationStrategy {
    fn name(&self) -> &str {
        "Portfolio Optimization"
    }

    fn generate_signal(
        &mut self,
        market: &MarketView<'_>,
        regime: &HmmPrediction,
    ) -> Result<StrategySignal, StrategyError> {
        self.history.push_back(regime.current_state);
        while self.history.len() > self.params.history_length {
            self.history.pop_front();
        }
        let trend = self.state_trend();
        let rsi = market.rsi().last().copied().map(|r| finite("rsi", r)).transpose()?;
        let p = &self.params;

        let signal = match (trend, rsi) {
            (StateTrend::Up, Some(r)) if r < p.rsi_oversold => {
                StrategySignal::new(SignalAction::Buy, 0.8, 0.7)
            }
            (StateTrend::Down, Some(r)) if r > p.rsi_overbought => {
                StrategySignal::new(SignalAction::Sell, 0.2, 0.7)
            }
            (StateTrend::Up, _) if regime.probability_of(BULLISH) > p.trend_prob => {
                StrategySignal::new(SignalAction::Buy, 0.9, 0.6)
            }
            (StateTrend::Down, _) if regime.probability_of(BEARISH) > p.trend_prob => {
                StrategySignal::new(SignalAction::Sell, 0.0, 0.6)
            }
            _ => StrategySignal::hold(0.5, 0.5),
        };
        Ok(signal)
    }

    fn reset(&mut self) {
        self.history.clear();
    }
}
