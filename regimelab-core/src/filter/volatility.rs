//! Fixed-capacity ring buffer of absolute price changes.

use std::collections::VecDeque;

/// Rolling window of the last `capacity` absolute price changes with a
/// running average.
#[derive(Debug, Clone)]
pub struct VolatilityWindow {
    capacity: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl VolatilityWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            values: VecDeque::new(),
            sum: 0.0,
        }
    }

    /// Push a new sample, evicting the oldest once the window is full.
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            if let Some(oldest) = self.values.pop_front() {
                self.sum -= oldest;
            }
        }
        self.values.push_back(value);
        self.sum += value;
    }

    /// Mean of the samples currently held (0 when empty).
    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        // Clamp away tiny negative drift from the running subtraction.
        (self.sum / self.values.len() as f64).max(0.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}
