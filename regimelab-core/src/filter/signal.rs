//! Turning-point trading signal state machine.
//!
//! Consumes the per-day [`Shape`] of the filtered curve and emits a
//! position state. A buy fires on a trough while flat; once held, the
//! position is kept through rising stretches and only released on a peak
//! or falling stretch after a minimum calendar holding period, measured
//! from the buy date to the next trading day.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::Shape;

/// Calendar days a position must be held before a sell is allowed.
pub const DEFAULT_MIN_HOLD_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingSignal {
    Flat,
    Buy,
    Hold,
    Sell,
}

/// Stateful signal generator; one per instrument.
#[derive(Debug, Clone)]
pub struct TradingSignalMachine {
    state: TradingSignal,
    buy_date: Option<NaiveDate>,
    min_hold_days: i64,
}

impl Default for TradingSignalMachine {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_HOLD_DAYS)
    }
}

impl TradingSignalMachine {
    pub fn new(min_hold_days: i64) -> Self {
        Self {
            state: TradingSignal::Flat,
            buy_date: None,
            min_hold_days,
        }
    }

    pub fn state(&self) -> TradingSignal {
        self.state
    }

    pub fn buy_date(&self) -> Option<NaiveDate> {
        self.buy_date
    }

    /// Advance one day and return the signal for that day.
    pub fn step(&mut self, date: NaiveDate, shape: Shape) -> TradingSignal {
        self.state = match self.state {
            TradingSignal::Flat => match shape {
                Shape::Trough => TradingSignal::Buy,
                _ => TradingSignal::Flat,
            },
            TradingSignal::Buy => {
                self.buy_date = Some(date);
                TradingSignal::Hold
            }
            TradingSignal::Hold => match shape {
                Shape::Peak | Shape::Falling if self.hold_satisfied(date) => TradingSignal::Sell,
                _ => TradingSignal::Hold,
            },
            TradingSignal::Sell => match shape {
                Shape::Trough => TradingSignal::Buy,
                Shape::Falling => TradingSignal::Flat,
                _ => TradingSignal::Sell,
            },
        };
        self.state
    }

    fn hold_satisfied(&self, date: NaiveDate) -> bool {
        match self.buy_date {
            Some(bought) => (next_trading_day(date) - bought).num_days() >= self.min_hold_days,
            None => false,
        }
    }
}

/// The day a sell decided on `date` would execute: Friday rolls over the
/// weekend, every other day moves forward by one.
pub fn next_trading_day(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Fri => date + Duration::days(3),
        _ => date + Duration::days(1),
    }
}

/// Run the state machine over aligned `(date, shape)` pairs.
pub fn trading_signals(dates: &[NaiveDate], shapes: &[Shape], min_hold_days: i64) -> Vec<TradingSignal> {
    let mut machine = TradingSignalMachine::new(min_hold_days);
    dates
        .iter()
        .zip(shapes)
        .map(|(&date, &shape)| machine.step(date, shape))
        .collect()
}
