//! Technical indicators over price and return series.
//!
//! Every indicator produces a *compact* series: a window of size `w` yields
//! `n - w + 1` values for `n` inputs and nothing at all when `n < w`. There
//! is no NaN padding. To keep step-by-step consumers honest about look-ahead,
//! [`AlignedSeries`] records the price index of each series' first value so
//! a view at step `t` can expose only values derived from prices `0..=t`.

pub mod aligned;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod normalize;
pub mod returns;
pub mod rsi;
pub mod set;
pub mod sma;
pub mod volatility;

pub use aligned::AlignedSeries;
pub use atr::{average_true_range, true_ranges};
pub use bollinger::{Bollinger, BollingerBand, BollingerBands};
pub use ema::{ema_of_series, Ema};
pub use macd::{Macd, MacdLine, MacdSeries};
pub use normalize::{minmax_normalize, normalize_prices, rank_and_score, smooth, zscore_normalize};
pub use returns::{log_returns, simple_returns, LogReturns, Returns};
pub use rsi::Rsi;
pub use set::{compute_indicators, IndicatorConfig, IndicatorSet};
pub use sma::Sma;
pub use volatility::RollingStdDev;

/// Trait for single-series indicators.
///
/// `compute` maps an input series to a compact output series. `lookback`
/// is the number of leading inputs consumed before the first output, so
/// output `j` depends only on inputs `0..=j + lookback`.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "rsi_14").
    fn name(&self) -> &str;

    fn lookback(&self) -> usize;

    fn compute(&self, values: &[f64]) -> Vec<f64>;

    /// Compute and tag the result with its offset into `values`.
    fn compute_aligned(&self, values: &[f64]) -> AlignedSeries {
        AlignedSeries::new(self.lookback(), self.compute(values))
    }
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
