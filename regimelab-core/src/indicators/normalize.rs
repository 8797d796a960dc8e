//! Normalization and smoothing helpers for feature vectors and dashboards.

use super::volatility::population_std_dev;

/// Z-score each value against the population mean and stddev.
/// A flat series maps to all zeros.
pub fn zscore_normalize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let sd = population_std_dev(values);
    if sd == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / sd).collect()
}

/// Scale into `[0, 1]` using the series' own min and max.
/// A flat series maps to 0.5 everywhere.
pub fn minmax_normalize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == min {
        return vec![0.5; values.len()];
    }
    values.iter().map(|v| (v - min) / (max - min)).collect()
}

/// Linearly weighted moving average over `window` samples.
///
/// Sample `i - j` in the window gets weight `j + 1`, so the oldest sample
/// is weighted heaviest. Compact output; empty when `values.len() < window`.
pub fn smooth(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    let weight_sum = (window * (window + 1) / 2) as f64;
    (window - 1..values.len())
        .map(|i| {
            (0..window)
                .map(|j| values[i - j] * (j + 1) as f64)
                .sum::<f64>()
                / weight_sum
        })
        .collect()
}

/// Rebase a price series so its first value is 1000.
pub fn normalize_prices(prices: &[f64]) -> Vec<f64> {
    match prices.first() {
        Some(&first) if first != 0.0 => {
            let factor = 1000.0 / first;
            prices.iter().map(|p| p * factor).collect()
        }
        _ => Vec::new(),
    }
}

/// Score values by rank: best gets `max_score`, each following rank
/// `interval` less, floored at 0. Ties keep input order.
pub fn rank_and_score(values: &[f64], max_score: f64, interval: f64, higher_is_better: bool) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    if higher_is_better {
        order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    } else {
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    }
    let mut scores = vec![0.0; values.len()];
    for (rank, idx) in order.into_iter().enumerate() {
        scores[idx] = (max_score - rank as f64 * interval).max(0.0);
    }
    scores
}
