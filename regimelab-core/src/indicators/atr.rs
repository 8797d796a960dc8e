//! Average True Range (ATR) snapshot.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! The ATR here is the plain mean of the most recent `period` true ranges,
//! a single number describing current bar-to-bar range.

use crate::domain::Bar;

/// True ranges for bars `1..n` (the first bar has no previous close).
pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| w[1].true_range(w[0].close))
        .collect()
}

/// Mean of the last `period` true ranges; 0 with fewer than `period + 1` bars.
pub fn average_true_range(bars: &[Bar], period: usize) -> f64 {
    if period == 0 || bars.len() < period + 1 {
        return 0.0;
    }
    let tr = true_ranges(bars);
    tr[tr.len() - period..].iter().sum::<f64>() / period as f64
}
