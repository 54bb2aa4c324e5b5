//! Relative Strength Index

use super::{IndicatorError, Result};

/// Calculate RSI with strict Wilder smoothing.
///
/// The initial average gain/loss is the simple mean over the first `period`
/// price deltas, giving the first RSI value at index `period`. Subsequent
/// averages use `avg_i = (avg_{i-1} * (period - 1) + x_i) / period`.
/// When the average loss is zero the RSI is 100.
pub fn rsi(values: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    if period == 0 {
        return Err(IndicatorError::ZeroPeriod);
    }
    if values.len() <= period {
        return Err(IndicatorError::InsufficientData {
            need: period + 1,
            got: values.len(),
        });
    }

    let mut gains = Vec::with_capacity(values.len() - 1);
    let mut losses = Vec::with_capacity(values.len() - 1);
    for i in 1..values.len() {
        let change = values[i] - values[i - 1];
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let mut result = vec![None; values.len()];

    let mut avg_gain: f64 = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[..period].iter().sum::<f64>() / period as f64;
    result[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        result[i + 1] = Some(rsi_value(avg_gain, avg_loss));
    }

    Ok(result)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
