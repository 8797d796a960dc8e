//! Simple and logarithmic one-step returns.
//!
//! `r[t] = (p[t+1] - p[t]) / p[t]`, `lr[t] = ln(p[t+1] / p[t])`.
//! Lookback: 1. Fewer than two prices yield an empty series.

use super::Indicator;

pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect()
}

pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

#[derive(Debug, Clone, Default)]
pub struct Returns;

impl Indicator for Returns {
    fn name(&self) -> &str {
        "returns"
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        simple_returns(values)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogReturns;

impl Indicator for LogReturns {
    fn name(&self) -> &str {
        "log_returns"
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        log_returns(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn simple_returns_basic() {
        let r = simple_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert_approx(r[0], 0.1, DEFAULT_EPSILON);
        assert_approx(r[1], -0.1, DEFAULT_EPSILON);
    }

    #[test]
    fn log_returns_basic() {
        let r = log_returns(&[100.0, 200.0]);
        assert_approx(r[0], 2f64.ln(), DEFAULT_EPSILON);
    }

    #[test]
    fn too_short_is_empty() {
        assert!(simple_returns(&[]).is_empty());
        assert!(simple_returns(&[5.0]).is_empty());
        assert!(LogReturns.compute(&[5.0]).is_empty());
    }

    #[test]
    fn aligned_returns_start_at_second_price() {
        let s = Returns.compute_aligned(&[1.0, 2.0, 4.0]);
        assert_eq!(s.offset, 1);
        assert_eq!(s.visible(2), &[1.0]);
    }
}
