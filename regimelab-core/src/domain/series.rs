//! PriceSeries: one instrument's ascending daily bar history.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Bar;

/// Errors raised when assembling a price series.
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("dates must be strictly increasing: {previous} is followed by {current}")]
    NotAscending {
        previous: NaiveDate,
        current: NaiveDate,
    },
}

/// Identity and descriptive metadata for a tradable instrument.
///
/// `id` participates in seed derivation for HMM training, so it must be
/// stable across runs for results to be reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: u32,
    pub symbol: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub fund: String,
}

impl Instrument {
    pub fn new(id: u32, symbol: impl Into<String>) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            sector: String::new(),
            fund: String::new(),
        }
    }
}

/// Ordered daily bars for one instrument.
///
/// Invariant: dates are strictly increasing. Calendar gaps (weekends,
/// holidays) are tolerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub instrument: Instrument,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(instrument: Instrument, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(SeriesError::NotAscending {
                    previous: pair[0].date,
                    current: pair[1].date,
                });
            }
        }
        Ok(Self { instrument, bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    /// Keep only the most recent `max_len` bars.
    pub fn truncate_to_recent(&mut self, max_len: usize) {
        if self.bars.len() > max_len {
            let start = self.bars.len() - max_len;
            self.bars.drain(..start);
        }
    }
}
