//! Price-trend strategies: long/short, momentum, trend-following.

use serde::{Deserialize, Serialize};

use super::{
    finite, positive, MarketView, SignalAction, Strategy, StrategyError, StrategySignal, BEARISH,
    BULLISH,
};
use crate::hmm::HmmPrediction;

// ─── Long/short ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LongShortParams {
    pub lookback: usize,
}

impl Default for LongShortParams {
    fn default() -> Self {
        Self { lookback: 20 }
    }
}

/// Goes long when a bullish regime agrees with the lookback return,
/// flat when a bearish regime does.
#[derive(Debug, Clone)]
pub struct LongShortStrategy {
    params: LongShortParams,
}

impl LongShortStrategy {
    pub fn new(params: LongShortParams) -> Self {
        Self { params }
    }
}

impl Strategy for LongShortStrategy {
    fn name(&self) -> &str {
        "Long/Short"
    }

    fn generate_signal(
        &mut self,
        market: &MarketView<'_>,
        regime: &HmmPrediction,
    ) -> Result<StrategySignal, StrategyError> {
        let prices = market.prices();
        let lookback = self.params.lookback.max(1);
        if prices.len() < lookback {
            return Ok(StrategySignal::hold(0.5, 0.3));
        }
        let current = finite("price", prices[prices.len() - 1])?;
        let reference = positive("lookback price", prices[prices.len() - lookback])?;
        let recent_return = (current - reference) / reference;

        let signal = if regime.current_state == BULLISH && recent_return > 0.0 {
            StrategySignal::new(SignalAction::Buy, 1.0, 0.7)
        } else if regime.current_state == BEARISH && recent_return < 0.0 {
            StrategySignal::new(SignalAction::Sell, 0.0, 0.7)
        } else {
            StrategySignal::hold(0.2, 0.5)
        };
        Ok(signal)
    }
}

// ─── Momentum ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumParams {
    pub momentum_window: usize,
    /// Per-day return threshold; the cumulative bar is `threshold * window`.
    pub threshold: f64,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            momentum_window: 10,
            threshold: 0.01,
        }
    }
}

/// Follows the summed return over a trailing window.
#[derive(Debug, Clone)]
pub struct MomentumStrategy {
    params: MomentumParams,
}

impl MomentumStrategy {
    pub fn new(params: MomentumParams) -> Self {
        Self { params }
    }
}

impl Strategy for MomentumStrategy {
    fn name(&self) -> &str {
        "Momentum"
    }

    fn generate_signal(
        &mut self,
        market: &MarketView<'_>,
        _regime: &HmmPrediction,
    ) -> Result<StrategySignal, StrategyError> {
        let window = self.params.momentum_window;
        let returns = market.returns();
        if market.prices().len() < window || returns.len() < window {
            return Ok(StrategySignal::hold(0.5, 0.3));
        }
        let cumulative = finite(
            "cumulative return",
            returns[returns.len() - window..].iter().sum(),
        )?;
        let bar = self.params.threshold * window as f64;

        let signal = if cumulative > bar {
            StrategySignal::new(SignalAction::Buy, 0.9, 0.7)
        } else if cumulative < -bar {
            StrategySignal::new(SignalAction::Sell, 0.1, 0.7)
        } else {
            StrategySignal::hold(0.5, 0.5)
        };
        Ok(signal)
    }
}

// ─── Trend following ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendFollowingParams {
    pub min_history: usize,
}

impl Default for TrendFollowingParams {
    fn default() -> Self {
        Self { min_history: 20 }
    }
}

/// Price above both moving averages in a bullish regime buys; below both
/// in a bearish regime sells.
#[derive(Debug, Clone)]
pub struct TrendFollowingStrategy {
    params: TrendFollowingParams,
}

impl TrendFollowingStrategy {
    pub fn new(params: TrendFollowingParams) -> Self {
        Self { params }
    }
}

impl Strategy for TrendFollowingStrategy {
    fn name(&self) -> &str {
        "Trend Following"
    }

    fn generate_signal(
        &mut self,
        market: &MarketView<'_>,
        regime: &HmmPrediction,
    ) -> Result<StrategySignal, StrategyError> {
        let (sma, ema) = (market.sma(), market.ema());
        let (Some(&sma), Some(&ema), Some(price)) = (sma.last(), ema.last(), market.last_price())
        else {
            return Ok(StrategySignal::hold(0.5, 0.3));
        };
        if market.prices().len() < self.params.min_history {
            return Ok(StrategySignal::hold(0.5, 0.3));
        }
        let price = finite("price", price)?;
        let sma = finite("sma", sma)?;
        let ema = finite("ema", ema)?;

        let signal = if price > sma && price > ema && regime.current_state == BULLISH {
            StrategySignal::new(SignalAction::Buy, 1.0, 0.8)
        } else if price < sma && price < ema && regime.current_state == BEARISH {
            StrategySignal::new(SignalAction::Sell, 0.0, 0.8)
        } else {
            StrategySignal::hold(0.5, 0.5)
        };
        Ok(signal)
    }
}
