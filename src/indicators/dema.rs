//! Double Exponential Moving Average

use super::ema::ema;

/// Calculate DEMA: `2 * EMA(N) - EMA(N)(EMA(N))`.
///
/// Both EMAs use first-value seeding, so the series is defined from
/// index 0. Early values carry heavy seed bias; the engine's warm-up gate
/// keeps them out of signal evaluation.
pub fn dema(values: &[f64], period: usize) -> Vec<f64> {
    let ema1 = ema(values, period);
    let ema2 = ema(&ema1, period);

    ema1.iter()
        .zip(ema2.iter())
        .map(|(e1, e2)| 2.0 * e1 - e2)
        .collect()
}
