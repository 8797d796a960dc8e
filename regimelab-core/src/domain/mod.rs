//! Domain types for RegimeLab

pub mod bar;
pub mod series;

pub use bar::Bar;
pub use series::{Instrument, PriceSeries, SeriesError};
