//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = (x[t] - EMA[t-1]) * k + EMA[t-1], k = 2 / (period + 1).
//! Seed: the first value is the SMA of the first `period` inputs.
//! Lookback: period - 1.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    /// A period of 0 is treated as 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        ema_of_series(values, self.period)
    }
}

/// Compact EMA of an arbitrary series.
/// Used directly by composed indicators (MACD signal line).
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(values.len() - period + 1);
    result.push(seed);
    let mut prev = seed;
    for &v in &values[period..] {
        prev = (v - prev) * k + prev;
        result.push(prev);
    }
    result
}
