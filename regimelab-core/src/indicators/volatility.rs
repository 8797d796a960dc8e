//! Rolling population standard deviation.
//!
//! Used as "volatility" when applied to the returns series.
//! Lookback: period - 1 relative to its input.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct RollingStdDev {
    period: usize,
    name: String,
}

impl RollingStdDev {
    /// A period of 0 is treated as 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("volatility_{period}"),
        }
    }
}

impl Indicator for RollingStdDev {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        if values.len() < self.period {
            return Vec::new();
        }
        values.windows(self.period).map(population_std_dev).collect()
    }
}

pub(crate) fn population_std_dev(window: &[f64]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
