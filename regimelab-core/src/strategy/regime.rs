//! Strategies driven purely by the decoded regime.

use serde::{Deserialize, Serialize};

use super::{MarketView, SignalAction, Strategy, StrategyError, StrategySignal, BEARISH, BULLISH};
use crate::hmm::HmmPrediction;

// ─── State switch ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSwitchParams {
    pub bullish_state: usize,
    pub bearish_state: usize,
    pub ranging_state: usize,
}

impl Default for StateSwitchParams {
    fn default() -> Self {
        Self {
            bullish_state: 0,
            bearish_state: 2,
            ranging_state: 1,
        }
    }
}

/// Acts on transitions between the bullish and bearish regimes.
#[derive(Debug, Clone)]
pub struct StateSwitchStrategy {
    params: StateSwitchParams,
}

impl StateSwitchStrategy {
    pub fn new(params: StateSwitchParams) -> Self {
        Self { params }
    }
}

impl Strategy for StateSwitchStrategy {
    fn name(&self) -> &str {
        "State Switch"
    }

    fn generate_signal(
        &mut self,
        _market: &MarketView<'_>,
        regime: &HmmPrediction,
    ) -> Result<StrategySignal, StrategyError> {
        let p = &self.params;
        let signal = if regime.switched(p.bearish_state, p.bullish_state) {
            StrategySignal::new(SignalAction::Buy, 1.0, 0.8)
        } else if regime.switched(p.bullish_state, p.bearish_state) {
            StrategySignal::new(SignalAction::Sell, 0.0, 0.8)
        } else if regime.current_state == p.ranging_state {
            StrategySignal::new(SignalAction::Reduce, 0.3, 0.6)
        } else {
            StrategySignal::hold(0.5, 0.5)
        };
        Ok(signal)
    }
}

// ─── Probability threshold ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbabilityThresholdParams {
    pub threshold: f64,
}

impl Default for ProbabilityThresholdParams {
    fn default() -> Self {
        Self { threshold: 0.6 }
    }
}

/// Trades only when the most probable regime clears a confidence bar.
#[derive(Debug, Clone)]
pub struct ProbabilityThresholdStrategy {
    params: ProbabilityThresholdParams,
}

impl ProbabilityThresholdStrategy {
    pub fn new(params: ProbabilityThresholdParams) -> Self {
        Self { params }
    }
}

impl Strategy for ProbabilityThresholdStrategy {
    fn name(&self) -> &str {
        "Probability Threshold"
    }

    fn generate_signal(
        &mut self,
        _market: &MarketView<'_>,
        regime: &HmmPrediction,
    ) -> Result<StrategySignal, StrategyError> {
        // first index of the maximum
        let Some((state, max_prob)) = regime
            .state_probs
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, p)| match best {
                Some((_, b)) if p <= b => best,
                _ => Some((i, p)),
            })
        else {
            return Ok(StrategySignal::hold(0.4, 0.0));
        };

        let signal = if state == BULLISH && max_prob > self.params.threshold {
            StrategySignal::new(SignalAction::Buy, 0.9, max_prob)
        } else if state == BEARISH && max_prob > self.params.threshold {
            StrategySignal::new(SignalAction::Sell, 0.0, max_prob)
        } else {
            StrategySignal::hold(0.4, max_prob)
        };
        Ok(signal)
    }
}

// ─── Market timing ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketTimingParams {
    pub bullish_threshold: f64,
    pub bearish_threshold: f64,
}

impl Default for MarketTimingParams {
    fn default() -> Self {
        Self {
            bullish_threshold: 0.7,
            bearish_threshold: 0.7,
        }
    }
}

/// Combines the current regime with the predicted next one.
#[derive(Debug, Clone)]
pub struct MarketTimingStrategy {
    params: MarketTimingParams,
}

impl MarketTimingStrategy {
    pub fn new(params: MarketTimingParams) -> Self {
        Self { params }
    }
}

impl Strategy for MarketTimingStrategy {
    fn name(&self) -> &str {
        "Market Timing"
    }

    fn generate_signal(
        &mut self,
        _market: &MarketView<'_>,
        regime: &HmmPrediction,
    ) -> Result<StrategySignal, StrategyError> {
        let bullish_prob = regime.probability_of(BULLISH);
        let bearish_prob = regime.probability_of(BEARISH);
        let signal = match (regime.current_state, regime.next_state) {
            (BULLISH, BULLISH) if bullish_prob > self.params.bullish_threshold => {
                StrategySignal::new(SignalAction::Buy, 1.0, bullish_prob)
            }
            (BEARISH, BEARISH) if bearish_prob > self.params.bearish_threshold => {
                StrategySignal::new(SignalAction::Sell, 0.0, bearish_prob)
            }
            (BEARISH, BULLISH) => StrategySignal::new(SignalAction::Buy, 0.6, 0.6),
            (BULLISH, BEARISH) => StrategySignal::new(SignalAction::Reduce, 0.3, 0.6),
            _ => StrategySignal::hold(0.5, 0.4),
        };
        Ok(signal)
    }
}
