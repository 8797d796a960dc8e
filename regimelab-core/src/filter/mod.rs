//! Jurik-style adaptive moving average ("JMA").
//!
//! A nine-stage cascade of one-pole smoothers whose time constant adapts to
//! recent volatility, with phase-lead compensation on the odd stages, a
//! cubic warm-up blend against the raw price, and a final inflection
//! suppression step that damps small reversals.
//!
//! The filter is a streaming transform: one [`AdaptiveFilter`] owns the
//! state for one (instrument, parameter set) and is fed with
//! [`AdaptiveFilter::push`]. Parameters are clamped silently, and
//! non-finite prices leave the state untouched.

pub mod shape;
pub mod signal;
pub mod volatility;

pub use shape::{classify_shape, classify_shapes, Shape};
pub use signal::{trading_signals, TradingSignal, TradingSignalMachine, DEFAULT_MIN_HOLD_DAYS};
pub use volatility::VolatilityWindow;

use serde::{Deserialize, Serialize};

const MIN_LENGTH: usize = 2;
const MAX_WARMUP: usize = 50;
const VOLTY_EPSILON: f64 = 1e-10;
const NUM_STAGES: usize = 9;

/// Raw filter parameters as supplied by configuration.
///
/// Out-of-range values are accepted here and clamped when the filter is
/// built: `length` is rounded and floored at 2, `phase` is clamped to
/// `[-100, 100]`, `power` to `[1, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub length: f64,
    pub phase: f64,
    pub power: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            length: 10.0,
            phase: 0.0,
            power: 1.0,
        }
    }
}

impl FilterParams {
    pub fn new(length: f64, phase: f64, power: f64) -> Self {
        Self {
            length,
            phase,
            power,
        }
    }

    /// Integer period after rounding and flooring. Non-finite input falls
    /// back to the minimum period.
    pub fn clamped_length(&self) -> usize {
        if !self.length.is_finite() {
            return MIN_LENGTH;
        }
        let rounded = self.length.round().max(MIN_LENGTH as f64);
        rounded as usize
    }

    pub fn clamped_phase(&self) -> f64 {
        if self.phase.is_nan() {
            return 0.0;
        }
        self.phase.clamp(-100.0, 100.0)
    }

    pub fn clamped_power(&self) -> f64 {
        if self.power.is_nan() {
            return 1.0;
        }
        self.power.clamp(1.0, 10.0)
    }
}

/// Mutable per-stream filter state.
#[derive(Debug, Clone)]
pub struct FilterState {
    stages: [f64; NUM_STAGES],
    volatility: VolatilityWindow,
    prev_price: f64,
    prev_output: f64,
    warmup_step: usize,
    initialized: bool,
}

impl FilterState {
    fn new(length: usize) -> Self {
        Self {
            stages: [0.0; NUM_STAGES],
            volatility: VolatilityWindow::new(length),
            prev_price: 0.0,
            prev_output: 0.0,
            warmup_step: 0,
            initialized: false,
        }
    }

    fn seed(&mut self, price: f64) {
        self.stages = [price; NUM_STAGES];
        self.volatility.clear();
        self.prev_price = price;
        self.prev_output = price;
        self.warmup_step = 0;
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Running average of recent absolute price changes.
    pub fn average_volatility(&self) -> f64 {
        self.volatility.average()
    }

    pub fn warmup_step(&self) -> usize {
        self.warmup_step
    }
}

/// Streaming adaptive filter over one price stream.
#[derive(Debug, Clone)]
pub struct AdaptiveFilter {
    length: usize,
    phase: f64,
    power: f64,
    warmup_needed: usize,
    state: FilterState,
}

impl AdaptiveFilter {
    pub fn new(params: FilterParams) -> Self {
        let length = params.clamped_length();
        Self {
            length,
            phase: params.clamped_phase(),
            power: params.clamped_power(),
            warmup_needed: (2 * length).min(MAX_WARMUP),
            state: FilterState::new(length),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    pub fn warmup_needed(&self) -> usize {
        self.warmup_needed
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Last output, or `None` before the first finite price.
    pub fn value(&self) -> Option<f64> {
        self.state.initialized.then_some(self.state.prev_output)
    }

    /// Discard all state; the next finite price re-seeds the filter.
    pub fn reset(&mut self) {
        self.state = FilterState::new(self.length);
    }

    /// Feed one price and return the smoothed value.
    pub fn push(&mut self, price: f64) -> f64 {
        if !price.is_finite() {
            return self.value().unwrap_or(0.0);
        }

        let state = &mut self.state;
        if !state.initialized {
            state.seed(price);
            return price;
        }

        let abs_change = (price - state.prev_price).abs();
        state.prev_price = price;
        state.volatility.push(abs_change);
        let avg_volty = state.volatility.average();

        let volty_ratio = if avg_volty > VOLTY_EPSILON {
            abs_change / avg_volty
        } else {
            1.0
        }
        .clamp(0.1, 10.0);

        let adaptive_factor = (self.power * (1.0 + (volty_ratio + 1.0).ln() * 0.5)).clamp(0.8, 1.8);
        let effective_length = (self.length as f64 * adaptive_factor).max(4.0);
        let alpha = 0.45 * (effective_length - 1.0) / (0.45 * (effective_length - 1.0) + 2.0);
        let phase_coeff = (1.0 + self.phase / 100.0).clamp(0.8, 1.5);

        // (1 - a) * prev + a * input, written incrementally so that a
        // stage already at its input stays there exactly.
        let ema = |prev: f64, input: f64| prev + alpha * (input - prev);
        let ma = &mut state.stages;
        ma[0] = ema(ma[0], price);
        ma[1] = ema(ma[1], ma[0]);
        // Stages 3/5/7/9 lead by the gap between the two preceding stages;
        // 4/6/8 are plain EMAs of the stage before them.
        for k in [2, 4, 6, 8] {
            let delta = ma[k - 2] - ma[k - 1];
            ma[k] = ema(ma[k], ma[k - 2] + delta * phase_coeff);
            if k + 1 < NUM_STAGES {
                ma[k + 1] = ema(ma[k + 1], ma[k]);
            }
        }

        state.warmup_step += 1;
        let mut candidate = ma[NUM_STAGES - 1];
        if state.warmup_step < self.warmup_needed {
            let f = (state.warmup_step as f64 / self.warmup_needed as f64).powi(3);
            candidate = price + (candidate - price) * f;
        }

        let delta = candidate - state.prev_output;
        let output = if delta.abs() < avg_volty * 1.5 {
            state.prev_output + delta * 0.25
        } else {
            state.prev_output + delta * 0.9
        };
        state.prev_output = output;
        output
    }

    /// Re-initialize and fold `push` over `prices`.
    pub fn compute_series(&mut self, prices: &[f64]) -> Vec<f64> {
        self.reset();
        prices.iter().map(|&p| self.push(p)).collect()
    }
}

/// Batch convenience: smooth a whole price series with fresh state.
pub fn compute_series(prices: &[f64], length: f64, phase: f64, power: f64) -> Vec<f64> {
    AdaptiveFilter::new(FilterParams::new(length, phase, power)).compute_series(prices)
}
