//! Pluggable indicator provider registry
//!
//! Each provider is a capability record: a name, the parameters it needs,
//! its minimum data requirement, and a `calculate` implementation returning
//! the latest value plus any auxiliary series. Callers look providers up by
//! name; the engine's strategies call the typed functions directly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use super::{
    adx, atr, bollinger_bands, dema, ema, macd, rsi, round2, sma, supertrend,
    support_resistance, IndicatorError, Result,
};
use crate::types::Candle;

/// Indicator identifier, keyed by its wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Ema,
    Dema,
    Sma,
    Rsi,
    Atr,
    Macd,
    Supertrend,
    Adx,
    BollingerBands,
    SupportResistance,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 10] = [
        IndicatorKind::Ema,
        IndicatorKind::Dema,
        IndicatorKind::Sma,
        IndicatorKind::Rsi,
        IndicatorKind::Atr,
        IndicatorKind::Macd,
        IndicatorKind::Supertrend,
        IndicatorKind::Adx,
        IndicatorKind::BollingerBands,
        IndicatorKind::SupportResistance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IndicatorKind::Ema => "EMA",
            IndicatorKind::Dema => "DEMA",
            IndicatorKind::Sma => "SMA",
            IndicatorKind::Rsi => "RSI",
            IndicatorKind::Atr => "ATR",
            IndicatorKind::Macd => "MACD",
            IndicatorKind::Supertrend => "SUPERTREND",
            IndicatorKind::Adx => "ADX",
            IndicatorKind::BollingerBands => "BOLLINGER_BANDS",
            IndicatorKind::SupportResistance => "SUPPORT_RESISTANCE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Parameter names the provider requires.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            IndicatorKind::Ema
            | IndicatorKind::Dema
            | IndicatorKind::Sma
            | IndicatorKind::Rsi
            | IndicatorKind::Atr
            | IndicatorKind::Adx => &["period"],
            IndicatorKind::Macd => &["fast", "slow", "signal"],
            IndicatorKind::Supertrend => &["period", "multiplier"],
            IndicatorKind::BollingerBands => &["period", "std_dev"],
            IndicatorKind::SupportResistance => &["lookback"],
        }
    }

    /// Minimum candles needed before the provider yields a value.
    pub fn min_data_points(&self, params: &IndicatorParams) -> Result<usize> {
        Ok(match self {
            IndicatorKind::Ema | IndicatorKind::Dema => 1,
            IndicatorKind::Sma
            | IndicatorKind::Atr
            | IndicatorKind::Supertrend
            | IndicatorKind::BollingerBands => params.get_usize("period")?,
            IndicatorKind::Rsi => params.get_usize("period")? + 1,
            IndicatorKind::Adx => 2 * params.get_usize("period")?,
            IndicatorKind::Macd => 1,
            IndicatorKind::SupportResistance => params.get_usize("lookback")?,
        })
    }
}

/// Numeric parameter bag for a registry call.
#[derive(Debug, Clone, Default)]
pub struct IndicatorParams(HashMap<String, f64>);

impl IndicatorParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &'static str) -> Result<f64> {
        self.0
            .get(name)
            .copied()
            .ok_or(IndicatorError::MissingParam(name))
    }

    pub fn get_usize(&self, name: &'static str) -> Result<usize> {
        Ok(self.get(name)? as usize)
    }
}

/// Latest reading of an indicator plus auxiliary series values.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorOutput {
    pub value: f64,
    pub additional_data: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

/// Registry of indicator providers keyed by name.
#[derive(Debug, Default)]
pub struct IndicatorRegistry;

impl IndicatorRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn kinds(&self) -> &'static [IndicatorKind] {
        &IndicatorKind::ALL
    }

    /// Calculate the named indicator over the candle series.
    ///
    /// SMA and RSI values are rounded to two decimals for external
    /// consumption; everything else reports full precision.
    pub fn calculate(
        &self,
        name: &str,
        candles: &[Candle],
        params: &IndicatorParams,
    ) -> Result<IndicatorOutput> {
        let kind = IndicatorKind::from_name(name)
            .ok_or_else(|| IndicatorError::UnknownIndicator(name.to_string()))?;
        self.calculate_kind(kind, candles, params)
    }

    pub fn calculate_kind(
        &self,
        kind: IndicatorKind,
        candles: &[Candle],
        params: &IndicatorParams,
    ) -> Result<IndicatorOutput> {
        let need = kind.min_data_points(params)?;
        if candles.len() < need {
            return Err(IndicatorError::InsufficientData {
                need,
                got: candles.len(),
            });
        }

        let timestamp = candles
            .last()
            .map(|c| c.timestamp)
            .ok_or(IndicatorError::InsufficientData { need: 1, got: 0 })?;

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

        let mut additional_data = Map::new();
        let value = match kind {
            IndicatorKind::Ema => {
                let series = ema(&closes, params.get_usize("period")?);
                series
                    .last()
                    .copied()
                    .ok_or(IndicatorError::InsufficientData { need: 1, got: 0 })?
            }
            IndicatorKind::Dema => {
                let series = dema(&closes, params.get_usize("period")?);
                series
                    .last()
                    .copied()
                    .ok_or(IndicatorError::InsufficientData { need: 1, got: 0 })?
            }
            IndicatorKind::Sma => {
                let series = sma(&closes, params.get_usize("period")?);
                let last = series
                    .last()
                    .copied()
                    .flatten()
                    .ok_or(IndicatorError::InsufficientData {
                        need,
                        got: candles.len(),
                    })?;
                round2(last)
            }
            IndicatorKind::Rsi => {
                let series = rsi(&closes, params.get_usize("period")?)?;
                let last = series
                    .last()
                    .copied()
                    .flatten()
                    .ok_or(IndicatorError::InsufficientData {
                        need,
                        got: candles.len(),
                    })?;
                round2(last)
            }
            IndicatorKind::Atr => {
                let series = atr(&highs, &lows, &closes, params.get_usize("period")?)?;
                series.last().copied().flatten().unwrap_or(0.0)
            }
            IndicatorKind::Macd => {
                let result = macd(
                    &closes,
                    params.get_usize("fast")?,
                    params.get_usize("slow")?,
                    params.get_usize("signal")?,
                )?;
                additional_data.insert("signal".into(), json!(result.signal.last()));
                additional_data.insert("histogram".into(), json!(result.histogram.last()));
                result
                    .macd
                    .last()
                    .copied()
                    .ok_or(IndicatorError::InsufficientData { need: 1, got: 0 })?
            }
            IndicatorKind::Supertrend => {
                let result = supertrend(
                    &highs,
                    &lows,
                    &closes,
                    params.get_usize("period")?,
                    params.get("multiplier")?,
                )?;
                let last = result.value.last().copied().flatten().unwrap_or(0.0);
                additional_data.insert(
                    "is_uptrend".into(),
                    json!(result.is_uptrend.last().copied().flatten()),
                );
                last
            }
            IndicatorKind::Adx => {
                let series = adx(&highs, &lows, &closes, params.get_usize("period")?)?;
                series.last().copied().flatten().unwrap_or(0.0)
            }
            IndicatorKind::BollingerBands => {
                let result =
                    bollinger_bands(&closes, params.get_usize("period")?, params.get("std_dev")?)?;
                additional_data.insert("upper".into(), json!(result.upper.last().copied().flatten()));
                additional_data.insert("lower".into(), json!(result.lower.last().copied().flatten()));
                result.middle.last().copied().flatten().unwrap_or(0.0)
            }
            IndicatorKind::SupportResistance => {
                let result = support_resistance(&highs, &lows, params.get_usize("lookback")?)?;
                let support = result.support.last().copied().flatten().unwrap_or(0.0);
                additional_data.insert(
                    "resistance".into(),
                    json!(result.resistance.last().copied().flatten()),
                );
                support
            }
        };

        Ok(IndicatorOutput {
            value,
            additional_data,
            timestamp,
        })
    }
}
