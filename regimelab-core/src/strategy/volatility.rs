//! Volatility-driven sizing: volatility targeting and inverse-volatility risk parity.

use serde::{Deserialize, Serialize};

use super::{finite, MarketView, SignalAction, Strategy, StrategyError, StrategySignal, BULLISH};
use crate::hmm::HmmPrediction;

// ─── Volatility targeting ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityParams {
    pub high_vol_threshold: f64,
    pub low_vol_threshold: f64,
}

impl Default for VolatilityParams {
    fn default() -> Self {
        Self {
            high_vol_threshold: 0.03,
            low_vol_threshold: 0.01,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VolatilityStrategy {
    params: VolatilityParams,
}

impl VolatilityStrategy {
    pub fn new(params: VolatilityParams) -> Self {
        Self { params }
    }
}

impl Strategy for VolatilityStrategy {
    fn name(&self) -> &str {
        "Volatility"
    }

    fn generate_signal(
        &mut self,
        market: &MarketView<'_>,
        regime: &HmmPrediction,
    ) -> Result<StrategySignal, StrategyError> {
        let Some(&current) = market.volatility().last() else {
            return Ok(StrategySignal::hold(0.5, 0.5));
        };
        let current = finite("volatility", current)?;

        let signal = if current > self.params.high_vol_threshold {
            StrategySignal::new(SignalAction::Reduce, 0.2, 0.6)
        } else if current < self.params.low_vol_threshold && regime.current_state == BULLISH {
            StrategySignal::new(SignalAction::Buy, 0.8, 0.7)
        } else {
            StrategySignal::hold(0.5, 0.5)
        };
        Ok(signal)
    }
}

// ─── Risk parity ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParityParams {
    pub base_position: f64,
    pub risk_multiplier: f64,
}

impl Default for RiskParityParams {
    fn default() -> Self {
        Self {
            base_position: 0.5,
            risk_multiplier: 2.0,
        }
    }
}

/// Scales exposure by average over current volatility; halved outside
/// the bullish regime.
#[derive(Debug, Clone)]
pub struct RiskParityStrategy {
    params: RiskParityParams,
}

impl RiskParityStrategy {
    pub fn new(params: RiskParityParams) -> Self {
        Self { params }
    }
}

impl Strategy for RiskParityStrategy {
    fn name(&self) -> &str {
        "Risk Parity"
    }

    fn generate_signal(
        &mut self,
        market: &MarketView<'_>,
        regime: &HmmPrediction,
    ) -> Result<StrategySignal, StrategyError> {
        let vol = market.volatility();
        let Some(&current) = vol.last() else {
            return Ok(StrategySignal::hold(self.params.base_position, 0.5));
        };
        let current = finite("volatility", current)?;
        let average = finite("average volatility", vol.iter().sum::<f64>() / vol.len() as f64)?;

        let sized = self.params.base_position * (average / (current + 1e-10)) * self.params.risk_multiplier;
        let capped = sized.clamp(0.0, 1.0);
        let position = if regime.current_state == BULLISH {
            capped
        } else {
            capped * 0.5
        };
        let action = if position > 0.5 {
            SignalAction::Buy
        } else if position < 0.3 {
            SignalAction::Sell
        } else {
            SignalAction::Hold
        };
        Ok(StrategySignal::new(action, position, 0.6))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;
    use crate::strategy::fixtures::{indicators, regime};

    const PRICES: [f64; 30] = [100.0; 30];

    fn signal(s: &mut dyn Strategy, vol: &[f64], state: usize) -> StrategySignal {
        let set = indicators(PRICES.len(), &[], &[], vol, &[], &[]);
        s.generate_signal(&MarketView::new(&PRICES, &set), &regime(state, None, state, &[1.0]))
            .unwrap()
    }

    #[test]
    fn volatility_table() {
        let mut s = VolatilityStrategy::new(VolatilityParams::default());
        assert_eq!(signal(&mut s, &[0.05], 0), StrategySignal::new(SignalAction::Reduce, 0.2, 0.6));
        assert_eq!(signal(&mut s, &[0.005], 0), StrategySignal::new(SignalAction::Buy, 0.8, 0.7));
        assert_eq!(signal(&mut s, &[0.005], 1), StrategySignal::hold(0.5, 0.5));
        assert_eq!(signal(&mut s, &[0.02], 0), StrategySignal::hold(0.5, 0.5));
        assert_eq!(signal(&mut s, &[], 0), StrategySignal::hold(0.5, 0.5));
    }

    #[test]
    fn risk_parity_sizing() {
        let mut s = RiskParityStrategy::new(RiskParityParams::default());

        let steady = signal(&mut s, &[0.01, 0.01, 0.01], 0);
        assert_eq!(steady.action, SignalAction::Buy);
        assert_approx(steady.position, 1.0, 1e-6);

        let steady_bearish = signal(&mut s, &[0.01, 0.01, 0.01], 2);
        assert_eq!(steady_bearish.action, SignalAction::Hold);
        assert_approx(steady_bearish.position, 0.5, 1e-6);

        // current vol twice the average: 0.5 * 0.5 * 2 = 0.5, halved off-regime
        let spiking = signal(&mut s, &[0.01, 0.01, 0.04], 1);
        assert_eq!(spiking.action, SignalAction::Sell);
        assert_approx(spiking.position, 0.25, 1e-6);

        // calm after turbulence caps at full exposure
        let calm = signal(&mut s, &[0.05, 0.05, 0.001], 0);
        assert_eq!(calm.position, 1.0);

        assert_eq!(signal(&mut s, &[], 0), StrategySignal::hold(0.5, 0.5));
    }

    #[test]
    fn non_finite_volatility_is_an_error() {
        let set = indicators(PRICES.len(), &[], &[], &[f64::NAN], &[], &[]);
        let view = MarketView::new(&PRICES, &set);
        let mut s = RiskParityStrategy::new(RiskParityParams::default());
        assert!(s.generate_signal(&view, &regime(0, None, 0, &[1.0])).is_err());
    }
}
