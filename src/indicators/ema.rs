//! Exponential Moving Average

/// Calculate the exponential moving average.
///
/// `k = 2 / (period + 1)`, seeded with the first raw value and recurrent
/// from there: `ema_i = x_i * k + ema_{i-1} * (1 - k)`. The series is
/// defined from index 0. Downstream consumers (and the reference tests)
/// depend on the first-value seeding; do not switch to an SMA seed.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len());
    let mut prev = values[0];
    result.push(prev);

    for &value in &values[1..] {
        prev = value * k + prev * (1.0 - k);
        result.push(prev);
    }

    result
}
