//! The full indicator bundle computed once per instrument.

use serde::{Deserialize, Serialize};

use super::{
    AlignedSeries, Bollinger, BollingerBand, BollingerBands, Ema, Indicator, LogReturns, Macd,
    MacdLine, MacdSeries, Returns, RollingStdDev, Rsi, Sma,
};

/// Window lengths for [`compute_indicators`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub sma_window: usize,
    pub ema_window: usize,
    /// Window over the returns series, not prices.
    pub volatility_window: usize,
    pub rsi_period: usize,
    /// (fast, slow, signal)
    pub macd: (usize, usize, usize),
    /// (window, stddev multiplier)
    pub bollinger: (usize, f64),
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sma_window: 20,
            ema_window: 20,
            volatility_window: 20,
            rsi_period: 14,
            macd: (12, 26, 9),
            bollinger: (20, 2.0),
        }
    }
}

/// Every indicator series for one instrument, each tagged with the price
/// index of its first value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub returns: AlignedSeries,
    pub log_returns: AlignedSeries,
    pub sma: AlignedSeries,
    pub ema: AlignedSeries,
    pub volatility: AlignedSeries,
    pub rsi: AlignedSeries,
    pub macd: MacdSeries,
    pub bollinger: BollingerBands,
}

impl IndicatorSet {
    /// The same bundle restricted to what is known after `price_count` prices.
    pub fn visible(&self, price_count: usize) -> IndicatorSet {
        let cut = |s: &AlignedSeries| AlignedSeries::new(s.offset, s.visible(price_count).to_vec());
        IndicatorSet {
            returns: cut(&self.returns),
            log_returns: cut(&self.log_returns),
            sma: cut(&self.sma),
            ema: cut(&self.ema),
            volatility: cut(&self.volatility),
            rsi: cut(&self.rsi),
            macd: MacdSeries {
                macd: cut(&self.macd.macd),
                signal: cut(&self.macd.signal),
                histogram: cut(&self.macd.histogram),
            },
            bollinger: BollingerBands {
                upper: cut(&self.bollinger.upper),
                middle: cut(&self.bollinger.middle),
                lower: cut(&self.bollinger.lower),
            },
        }
    }
}

/// Compute the indicator bundle for a close-price series.
///
/// Series whose window exceeds the available history come back empty.
pub fn compute_indicators(closes: &[f64], config: &IndicatorConfig) -> IndicatorSet {
    let returns = Returns.compute_aligned(closes);
    // volatility is a window over returns, so its offset stacks on theirs
    let vol = RollingStdDev::new(config.volatility_window);
    let volatility = AlignedSeries::new(
        returns.offset + vol.lookback(),
        vol.compute(returns.values()),
    );
    let (fast, slow, signal) = config.macd;
    let (bb_window, bb_mult) = config.bollinger;

    IndicatorSet {
        log_returns: LogReturns.compute_aligned(closes),
        sma: Sma::new(config.sma_window).compute_aligned(closes),
        ema: Ema::new(config.ema_window).compute_aligned(closes),
        rsi: Rsi::new(config.rsi_period).compute_aligned(closes),
        macd: Macd::new(fast, slow, signal, MacdLine::Macd).compute_all(closes),
        bollinger: Bollinger::new(bb_window, bb_mult, BollingerBand::Middle)
            .compute_bands(closes),
        volatility,
        returns,
    }
}
