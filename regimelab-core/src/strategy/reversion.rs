//! Mean reversion around the simple moving average.

use serde::{Deserialize, Serialize};

use super::{finite, positive, MarketView, SignalAction, Strategy, StrategyError, StrategySignal};
use crate::hmm::HmmPrediction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionParams {
    /// Relative distance from the SMA that triggers a trade.
    pub deviation_threshold: f64,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self {
            deviation_threshold: 0.02,
        }
    }
}

/// Buys below the SMA band and lightens above it. Ignores the regime.
#[derive(Debug, Clone)]
pub struct MeanReversionStrategy {
    params: MeanReversionParams,
}

impl MeanReversionStrategy {
    pub fn new(params: MeanReversionParams) -> Self {
        Self { params }
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        "Mean Reversion"
    }

    fn generate_signal(
        &mut self,
        market: &MarketView<'_>,
        _regime: &HmmPrediction,
    ) -> Result<StrategySignal, StrategyError> {
        let (Some(price), Some(&sma)) = (market.last_price(), market.sma().last()) else {
            return Ok(StrategySignal::hold(0.5, 0.3));
        };
        let price = finite("price", price)?;
        let sma = positive("sma", sma)?;
        let deviation = (price - sma) / sma;
        let band = self.params.deviation_threshold;

        let signal = if deviation < -band {
            StrategySignal::new(SignalAction::Buy, 0.8, 0.6)
        } else if deviation > band {
            StrategySignal::new(SignalAction::Sell, 0.2, 0.6)
        } else {
            StrategySignal::hold(0.5, 0.5)
        };
        Ok(signal)
    }
}
