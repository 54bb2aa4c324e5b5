//! Bollinger Bands

use super::sma::sma;
use super::{IndicatorError, Result};

#[derive(Debug, Clone)]
pub struct BollingerResult {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Calculate Bollinger Bands: SMA middle band with `num_std` population
/// standard deviations either side.
pub fn bollinger_bands(values: &[f64], period: usize, num_std: f64) -> Result<BollingerResult> {
    if period == 0 {
        return Err(IndicatorError::ZeroPeriod);
    }
    if values.len() < period {
        return Err(IndicatorError::InsufficientData {
            need: period,
            got: values.len(),
        });
    }

    let middle = sma(values, period);
    let mut upper = Vec::with_capacity(values.len());
    let mut lower = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        match middle[i] {
            Some(mid) => {
                let window = &values[i + 1 - period..=i];
                let variance = window
                    .iter()
                    .map(|&x| {
                        let diff = x - mid;
                        diff * diff
                    })
                    .sum::<f64>()
                    / period as f64;
                let std_dev = variance.sqrt();

                upper.push(Some(mid + num_std * std_dev));
                lower.push(Some(mid - num_std * std_dev));
            }
            None => {
                upper.push(None);
                lower.push(None);
            }
        }
    }

    Ok(BollingerResult {
        upper,
        middle,
        lower,
    })
}
