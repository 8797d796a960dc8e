//! Relative Strength Index (RSI).
//!
//! Wilder smoothing of average gains and losses over price changes:
//! avg[t] = (avg[t-1] * (period - 1) + x[t]) / period.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss); avg_loss == 0 → 100.
//! Lookback: period (needs period + 1 prices).

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    /// A period of 0 is treated as 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        if values.len() < self.period + 1 {
            return Vec::new();
        }
        let period = self.period as f64;
        let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
        let gain = |c: f64| if c > 0.0 { c } else { 0.0 };
        let loss = |c: f64| if c < 0.0 { -c } else { 0.0 };

        let mut avg_gain = changes[..self.period].iter().map(|&c| gain(c)).sum::<f64>() / period;
        let mut avg_loss = changes[..self.period].iter().map(|&c| loss(c)).sum::<f64>() / period;

        let mut result = Vec::with_capacity(changes.len() - self.period + 1);
        result.push(compute_rsi(avg_gain, avg_loss));
        for &c in &changes[self.period..] {
            avg_gain = (avg_gain * (period - 1.0) + gain(c)) / period;
            avg_loss = (avg_loss * (period - 1.0) + loss(c)) / period;
            result.push(compute_rsi(avg_gain, avg_loss));
        }
        result
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
