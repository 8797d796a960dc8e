//! Strategy bank: ten signal generators over prices, indicators and the
//! decoded regime.
//!
//! Every strategy sees a [`MarketView`], which exposes only the prices and
//! indicator values known at the evaluation step, plus the
//! [`HmmPrediction`] for that step. Strategies are built per instrument by
//! [`default_strategies`] and are not shared across instruments.

pub mod portfolio;
pub mod regime;
pub mod reversion;
pub mod trend;
pub mod volatility;

pub use portfolio::{PortfolioOptimizationParams, PortfolioOptimizationStrategy, StateTrend};
pub use regime::{
    MarketTimingParams, MarketTimingStrategy, ProbabilityThresholdParams,
    ProbabilityThresholdStrategy, StateSwitchParams, StateSwitchStrategy,
};
pub use reversion::{MeanReversionParams, MeanReversionStrategy};
pub use trend::{
    LongShortParams, LongShortStrategy, MomentumParams, MomentumStrategy, TrendFollowingParams,
    TrendFollowingStrategy,
};
pub use volatility::{RiskParityParams, RiskParityStrategy, VolatilityParams, VolatilityStrategy};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::hmm::HmmPrediction;
use crate::indicators::IndicatorSet;

/// Conventional regime labels.
pub const BULLISH: usize = 0;
pub const RANGING: usize = 1;
pub const BEARISH: usize = 2;

// ─── Signal types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
    Reduce,
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalAction::Buy => "buy",
            SignalAction::Sell => "sell",
            SignalAction::Hold => "hold",
            SignalAction::Reduce => "reduce",
        };
        f.write_str(s)
    }
}

/// A position recommendation: target exposure in `[0, 1]` and confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategySignal {
    pub action: SignalAction,
    pub position: f64,
    pub confidence: f64,
}

impl StrategySignal {
    pub fn new(action: SignalAction, position: f64, confidence: f64) -> Self {
        Self {
            action,
            position,
            confidence,
        }
    }

    pub fn hold(position: f64, confidence: f64) -> Self {
        Self::new(SignalAction::Hold, position, confidence)
    }
}

/// A strategy's signal tagged with its name; `error` is set when the
/// strategy failed and the signal is the neutral fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSignal {
    pub strategy: String,
    #[serde(flatten)]
    pub signal: StrategySignal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("{field} is not finite ({value})")]
    NonFinite { field: &'static str, value: f64 },
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },
}

/// Reject non-finite inputs before they reach a decision table.
pub(crate) fn finite(field: &'static str, value: f64) -> Result<f64, StrategyError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(StrategyError::NonFinite { field, value })
    }
}

/// Finite and strictly positive, for values used as divisors.
pub(crate) fn positive(field: &'static str, value: f64) -> Result<f64, StrategyError> {
    let value = finite(field, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(StrategyError::NonPositive { field, value })
    }
}

// ─── Market view ─────────────────────────────────────────────────────

/// Prices and indicators as known after `prices.len()` observations.
///
/// Indicator accessors return only the values computable from `prices`,
/// even when the underlying [`IndicatorSet`] covers a longer history.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    prices: &'a [f64],
    indicators: &'a IndicatorSet,
}

impl<'a> MarketView<'a> {
    pub fn new(prices: &'a [f64], indicators: &'a IndicatorSet) -> Self {
        Self { prices, indicators }
    }

    pub fn prices(&self) -> &'a [f64] {
        self.prices
    }

    pub fn last_price(&self) -> Option<f64> {
        self.prices.last().copied()
    }

    pub fn returns(&self) -> &'a [f64] {
        self.indicators.returns.visible(self.prices.len())
    }

    pub fn sma(&self) -> &'a [f64] {
        self.indicators.sma.visible(self.prices.len())
    }

    pub fn ema(&self) -> &'a [f64] {
        self.indicators.ema.visible(self.prices.len())
    }

    pub fn volatility(&self) -> &'a [f64] {
        self.indicators.volatility.visible(self.prices.len())
    }

    pub fn rsi(&self) -> &'a [f64] {
        self.indicators.rsi.visible(self.prices.len())
    }
}

// ─── Strategy trait ──────────────────────────────────────────────────

/// A signal generator.
///
/// `generate_signal` takes `&mut self` because some strategies keep a
/// bounded history between calls; [`Strategy::reset`] clears it.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn generate_signal(
        &mut self,
        market: &MarketView<'_>,
        regime: &HmmPrediction,
    ) -> Result<StrategySignal, StrategyError>;

    fn reset(&mut self) {}
}

/// Parameters for the full strategy bank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub state_switch: StateSwitchParams,
    pub probability_threshold: ProbabilityThresholdParams,
    pub long_short: LongShortParams,
    pub volatility: VolatilityParams,
    pub mean_reversion: MeanReversionParams,
    pub momentum: MomentumParams,
    pub trend_following: TrendFollowingParams,
    pub risk_parity: RiskParityParams,
    pub market_timing: MarketTimingParams,
    pub portfolio_optimization: PortfolioOptimizationParams,
}

/// The ten strategies in their canonical order.
pub fn default_strategies(params: &StrategyParams) -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(StateSwitchStrategy::new(params.state_switch.clone())),
        Box::new(ProbabilityThresholdStrategy::new(params.probability_threshold.clone())),
        Box::new(LongShortStrategy::new(params.long_short.clone())),
        Box::new(VolatilityStrategy::new(params.volatility.clone())),
        Box::new(MeanReversionStrategy::new(params.mean_reversion.clone())),
        Box::new(MomentumStrategy::new(params.momentum.clone())),
        Box::new(TrendFollowingStrategy::new(params.trend_following.clone())),
        Box::new(RiskParityStrategy::new(params.risk_parity.clone())),
        Box::new(MarketTimingStrategy::new(params.market_timing.clone())),
        Box::new(PortfolioOptimizationStrategy::new(params.portfolio_optimization.clone())),
    ]
}

/// Evaluate every strategy. A failing strategy contributes a neutral hold
/// (position 0.5, confidence 0) carrying the error text; the others run on.
pub fn apply_all_strategies(
    strategies: &mut [Box<dyn Strategy>],
    market: &MarketView<'_>,
    regime: &HmmPrediction,
) -> Vec<NamedSignal> {
    strategies
        .iter_mut()
        .map(|strategy| match strategy.generate_signal(market, regime) {
            Ok(signal) => NamedSignal {
                strategy: strategy.name().to_string(),
                signal,
                error: None,
            },
            Err(e) => {
                warn!(strategy = strategy.name(), error = %e, "strategy failed, holding");
                NamedSignal {
                    strategy: strategy.name().to_string(),
                    signal: StrategySignal::hold(0.5, 0.0),
                    error: Some(e.to_string()),
                }
            }
        })
        .collect()
}
