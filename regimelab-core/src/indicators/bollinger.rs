//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(period)
//! - Upper: middle + mult * stddev(period)
//! - Lower: middle - mult * stddev(period)
//!
//! Uses population stddev (divide by N).
//! Lookback: period - 1.

use serde::{Deserialize, Serialize};

use super::volatility::population_std_dev;
use super::{AlignedSeries, Indicator};

/// Which band of the Bollinger Bands to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

/// All three bands, aligned to the price history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: AlignedSeries,
    pub middle: AlignedSeries,
    pub lower: AlignedSeries,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    /// A period of 0 is treated as 1.
    pub fn new(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        let period = period.max(1);
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{label}_{period}_{multiplier}"),
        }
    }

    pub fn compute_bands(&self, values: &[f64]) -> BollingerBands {
        let offset = self.lookback();
        let (mut upper, mut middle, mut lower) = (Vec::new(), Vec::new(), Vec::new());
        if values.len() >= self.period {
            for window in values.windows(self.period) {
                let mid = window.iter().sum::<f64>() / self.period as f64;
                let sd = population_std_dev(window);
                upper.push(mid + self.multiplier * sd);
                middle.push(mid);
                lower.push(mid - self.multiplier * sd);
            }
        }
        BollingerBands {
            upper: AlignedSeries::new(offset, upper),
            middle: AlignedSeries::new(offset, middle),
            lower: AlignedSeries::new(offset, lower),
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        let bands = self.compute_bands(values);
        match self.band {
            BollingerBand::Upper => bands.upper.values,
            BollingerBand::Middle => bands.middle.values,
            BollingerBand::Lower => bands.lower.values,
        }
    }
}
