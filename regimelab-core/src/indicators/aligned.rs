//! Compact indicator series tagged with their position in the price history.

use serde::{Deserialize, Serialize};

/// A compact series whose first value was derived from prices `0..=offset`.
///
/// Value `j` depends only on prices `0..=offset + j`, so the prefix visible
/// after `n` prices is the first `n - offset` values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignedSeries {
    pub offset: usize,
    pub values: Vec<f64>,
}

impl AlignedSeries {
    pub fn new(offset: usize, values: Vec<f64>) -> Self {
        Self { offset, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Values computable once `price_count` prices have been observed.
    pub fn visible(&self, price_count: usize) -> &[f64] {
        let n = price_count.saturating_sub(self.offset).min(self.values.len());
        &self.values[..n]
    }

    /// Apply `f` elementwise, keeping the alignment.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self::new(self.offset, self.values.iter().map(|&v| f(v)).collect())
    }
}
