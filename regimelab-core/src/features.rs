//! Feature extraction and quantile discretization for HMM training.

use crate::indicators::IndicatorSet;

/// Flatten returns, volatility and RSI/100 into one training vector.
///
/// The three blocks are concatenated, not interleaved.
pub fn extract_features(indicators: &IndicatorSet) -> Vec<f64> {
    let mut features = Vec::with_capacity(
        indicators.returns.len() + indicators.volatility.len() + indicators.rsi.len(),
    );
    features.extend_from_slice(indicators.returns.values());
    features.extend_from_slice(indicators.volatility.values());
    features.extend(indicators.rsi.values().iter().map(|r| r / 100.0));
    features
}

/// `num_labels - 1` quantile thresholds taken from a sorted copy of `values`.
pub fn quantile_thresholds(values: &[f64], num_labels: usize) -> Vec<f64> {
    if values.is_empty() || num_labels < 2 {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    (1..num_labels)
        .map(|i| sorted[(sorted.len() * i / num_labels).min(sorted.len() - 1)])
        .collect()
}

/// Label of one value: the number of leading thresholds it is `>=`.
pub fn label_of(value: f64, thresholds: &[f64]) -> usize {
    thresholds
        .iter()
        .position(|&t| value < t)
        .unwrap_or(thresholds.len())
}

/// Map each value to a quantile label in `[0, num_labels)`.
pub fn discretize(values: &[f64], num_labels: usize) -> Vec<usize> {
    let thresholds = quantile_thresholds(values, num_labels);
    values.iter().map(|&v| label_of(v, &thresholds)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{compute_indicators, IndicatorConfig};

    #[test]
    fn discretize_uniform_ramp() {
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        assert_eq!(discretize(&values, 5), vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
        assert_eq!(discretize(&values, 10), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn discretize_is_order_independent_per_value() {
        let values = [0.3, -0.1, 0.9, 0.0, 0.5, 0.3];
        let labels = discretize(&values, 3);
        // sorted: -0.1, 0.0, 0.3, 0.3, 0.5, 0.9 → thresholds [0.3, 0.5]
        assert_eq!(labels, vec![1, 0, 2, 0, 2, 1]);
    }

    #[test]
    fn discretize_degenerate_inputs() {
        assert!(discretize(&[], 10).is_empty());
        assert_eq!(discretize(&[1.0, 2.0], 1), vec![0, 0]);
        assert_eq!(discretize(&[4.0; 5], 3), vec![2; 5]);
    }

    #[test]
    fn labels_in_range() {
        let values: Vec<f64> = (0..37).map(|i| ((i * 7919) % 101) as f64 / 10.0).collect();
        for n in 1..12 {
            assert!(discretize(&values, n).iter().all(|&l| l < n.max(1)));
        }
    }

    #[test]
    fn features_concatenate_blocks() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i % 5) as f64).collect();
        let set = compute_indicators(&closes, &IndicatorConfig::default());
        let features = extract_features(&set);
        assert_eq!(features.len(), 39 + 20 + 26);
        assert_eq!(features[0], set.returns.values[0]);
        assert_eq!(features[39], set.volatility.values[0]);
        assert_eq!(*features.last().unwrap(), set.rsi.last().unwrap() / 100.0);
    }
}
