//! Local shape of the filtered curve from three consecutive outputs.

use serde::{Deserialize, Serialize};

/// Shape of the smoothed series at the latest point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// Local minimum at the middle point.
    Trough,
    /// Local maximum at the middle point.
    Peak,
    Rising,
    Falling,
    /// Flat segments and the first two points of a series.
    Unknown,
}

/// Classify `(prev_prev, prev, current)`.
pub fn classify_shape(prev_prev: f64, prev: f64, current: f64) -> Shape {
    if prev_prev > prev && current > prev {
        Shape::Trough
    } else if prev_prev < prev && current < prev {
        Shape::Peak
    } else if prev_prev < prev && prev < current {
        Shape::Rising
    } else if prev_prev > prev && prev > current {
        Shape::Falling
    } else {
        Shape::Unknown
    }
}

/// Classify every point of a filtered series. The first two points have no
/// history and are `Unknown`.
pub fn classify_shapes(values: &[f64]) -> Vec<Shape> {
    let mut shapes = vec![Shape::Unknown; values.len().min(2)];
    shapes.extend(values.windows(3).map(|w| classify_shape(w[0], w[1], w[2])));
    shapes
}
