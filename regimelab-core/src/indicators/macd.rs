//! Moving Average Convergence/Divergence (MACD).
//!
//! - MACD line: EMA(fast) - EMA(slow), aligned on the slow EMA.
//! - Signal: EMA(signal) of the MACD line.
//! - Histogram: MACD line - signal, aligned on the signal line.
//!
//! Lookback: slow - 1 for the MACD line, slow + signal - 2 for signal and
//! histogram. Fewer than `slow` prices yields three empty series.

use serde::{Deserialize, Serialize};

use super::ema::ema_of_series;
use super::{AlignedSeries, Indicator};

/// Which output line of the MACD to expose through [`Indicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Macd,
    Signal,
    Histogram,
}

/// All three MACD outputs, each aligned to the price history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacdSeries {
    pub macd: AlignedSeries,
    pub signal: AlignedSeries,
    pub histogram: AlignedSeries,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
    name: String,
}

impl Macd {
    /// Zero periods are treated as 1 and `slow` is raised to at least `fast`.
    pub fn new(fast: usize, slow: usize, signal: usize, line: MacdLine) -> Self {
        let fast = fast.max(1);
        let slow = slow.max(fast);
        let signal = signal.max(1);
        let label = match line {
            MacdLine::Macd => "line",
            MacdLine::Signal => "signal",
            MacdLine::Histogram => "histogram",
        };
        Self {
            fast,
            slow,
            signal,
            line,
            name: format!("macd_{label}_{fast}_{slow}_{signal}"),
        }
    }

    /// Compute all three lines at once.
    pub fn compute_all(&self, prices: &[f64]) -> MacdSeries {
        let macd_offset = self.slow.saturating_sub(1);
        let signal_offset = macd_offset + self.signal.saturating_sub(1);
        if prices.len() < self.slow {
            return MacdSeries {
                macd: AlignedSeries::new(macd_offset, Vec::new()),
                signal: AlignedSeries::new(signal_offset, Vec::new()),
                histogram: AlignedSeries::new(signal_offset, Vec::new()),
            };
        }

        let fast = ema_of_series(prices, self.fast);
        let slow = ema_of_series(prices, self.slow);
        let skip = fast.len() - slow.len();
        let macd: Vec<f64> = fast[skip..].iter().zip(&slow).map(|(f, s)| f - s).collect();

        let signal = ema_of_series(&macd, self.signal);
        let skip = macd.len() - signal.len().min(macd.len());
        let histogram: Vec<f64> = macd[skip..].iter().zip(&signal).map(|(m, s)| m - s).collect();

        MacdSeries {
            macd: AlignedSeries::new(macd_offset, macd),
            signal: AlignedSeries::new(signal_offset, signal),
            histogram: AlignedSeries::new(signal_offset, histogram),
        }
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.line {
            MacdLine::Macd => self.slow.saturating_sub(1),
            MacdLine::Signal | MacdLine::Histogram => {
                self.slow.saturating_sub(1) + self.signal.saturating_sub(1)
            }
        }
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        let all = self.compute_all(values);
        match self.line {
            MacdLine::Macd => all.macd.values,
            MacdLine::Signal => all.signal.values,
            MacdLine::Histogram => all.histogram.values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn lengths_follow_lookbacks() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let all = Macd::new(12, 26, 9, MacdLine::Macd).compute_all(&prices);
        assert_eq!(all.macd.len(), 40 - 25);
        assert_eq!(all.signal.len(), 40 - 25 - 8);
        assert_eq!(all.histogram.len(), all.signal.len());
        assert_eq!(all.macd.offset, 25);
        assert_eq!(all.signal.offset, 33);
    }

    #[test]
    fn constant_prices_give_zero_lines() {
        let all = Macd::new(3, 6, 2, MacdLine::Macd).compute_all(&[50.0; 20]);
        assert!(all.macd.values.iter().all(|v| v.abs() < DEFAULT_EPSILON));
        assert!(all.histogram.values.iter().all(|v| v.abs() < DEFAULT_EPSILON));
    }

    #[test]
    fn histogram_is_line_minus_signal() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + ((i * 5) % 7) as f64).collect();
        let all = Macd::new(3, 6, 4, MacdLine::Macd).compute_all(&prices);
        let skip = all.macd.len() - all.signal.len();
        for (i, h) in all.histogram.values.iter().enumerate() {
            assert_approx(*h, all.macd.values[skip + i] - all.signal.values[i], DEFAULT_EPSILON);
        }
    }

    #[test]
    fn too_short_is_empty() {
        let all = Macd::new(12, 26, 9, MacdLine::Macd).compute_all(&[1.0; 25]);
        assert!(all.macd.is_empty() && all.signal.is_empty() && all.histogram.is_empty());
    }

    #[test]
    fn indicator_lines() {
        let prices: Vec<f64> = (0..40).map(|i| (i as f64).sin() + 10.0).collect();
        let signal = Macd::new(12, 26, 9, MacdLine::Signal);
        assert_eq!(signal.lookback(), 33);
        assert_eq!(signal.compute(&prices).len(), 7);
        assert_eq!(signal.name(), "macd_signal_12_26_9");
    }
}
