//! Fixed-point number formatting for reports.
//!
//! Rounding is decided on the exact binary value: `1.115` is stored as
//! `1.11499999...` and prints `1.11`. Rust's `{:.N}` rounds exact ties to
//! even (`0.125` → `0.12`); reports round them away from zero (`0.13`).

/// Format with `decimals` places, exact ties away from zero.
///
/// Infinities render as `Infinity` / `-Infinity`, and a value that rounds to
/// zero never carries a minus sign.
pub fn format_fixed(value: f64, decimals: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let abs = value.abs();
    let magnitude = if is_exact_tie(abs, decimals) {
        // one ulp above the midpoint rounds up without reaching the next one
        format!("{:.*}", decimals, f64::from_bits(abs.to_bits() + 1))
    } else {
        format!("{:.*}", decimals, abs)
    };
    let is_zero = magnitude.chars().all(|c| c == '0' || c == '.');
    if value < 0.0 && !is_zero {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

/// `abs` sits exactly halfway between two `decimals`-place values.
fn is_exact_tie(abs: f64, decimals: usize) -> bool {
    terminates_within(abs, decimals + 1) && format!("{:.*}", decimals + 1, abs).ends_with('5')
}

/// The exact decimal expansion of finite `value` has at most `places`
/// fractional digits.
fn terminates_within(value: f64, places: usize) -> bool {
    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };
    mantissa == 0 || exponent + i64::from(mantissa.trailing_zeros()) >= -(places as i64)
}

/// A fraction as a percentage with two decimals: `0.1234` → `12.34%`.
pub fn format_pct(fraction: f64) -> String {
    format!("{}%", format_fixed(fraction * 100.0, 2))
}

/// A positive drawdown fraction shown as a loss: `0.05` → `-5.00%`.
pub fn format_drawdown(fraction: f64) -> String {
    format_pct(-fraction.abs())
}
