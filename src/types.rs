//! Core data types used across the backtesting engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Error)]
pub enum CandleValidationError {
    #[error("inverted range: low {low} exceeds high {high}")]
    InvertedRange { low: f64, high: f64 },

    #[error("prices must be strictly positive (o={open} h={high} l={low} c={close})")]
    NonPositivePrices {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("{field} price {value} falls outside the candle range [{low}, {high}]")]
    PriceOutsideRange {
        field: &'static str,
        value: f64,
        low: f64,
        high: f64,
    },

    #[error("negative volume: {0}")]
    NegativeVolume(f64),
}

/// Candle interval. The wire form is the short string ("1m", "15m", "1d").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    /// Nominal candle duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        match self {
            Timeframe::M1 => 60_000,
            Timeframe::M3 => 180_000,
            Timeframe::M5 => 300_000,
            Timeframe::M15 => 900_000,
            Timeframe::M30 => 1_800_000,
            Timeframe::H1 => 3_600_000,
            Timeframe::H4 => 14_400_000,
            Timeframe::D1 => 86_400_000,
        }
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| format!("unknown timeframe: {}", s))
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OHLCV candlestick data. Timestamps serialize as epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timeframe: Timeframe,
}

impl Candle {
    /// Create a new candle with validation
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        timeframe: Timeframe,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            timeframe,
        };
        candle.validate()?;
        Ok(candle)
    }

    /// Validate the candle invariants: a non-inverted range, strictly
    /// positive prices, open/close inside [low, high], non-negative volume.
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        if self.low > self.high {
            return Err(CandleValidationError::InvertedRange {
                low: self.low,
                high: self.high,
            });
        }

        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| *p <= 0.0) {
            return Err(CandleValidationError::NonPositivePrices {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        for (field, value) in [("open", self.open), ("close", self.close)] {
            if !(self.low..=self.high).contains(&value) {
                return Err(CandleValidationError::PriceOutsideRange {
                    field,
                    value,
                    low: self.low,
                    high: self.high,
                });
            }
        }

        if self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Ratio of candle body to full range, in [0, 1]. Zero-range candles yield 0.
    pub fn body_ratio(&self) -> f64 {
        let range = self.high - self.low;
        if range <= 0.0 {
            return 0.0;
        }
        (self.close - self.open).abs() / range
    }
}

/// Instrument symbol using Arc<str> for cheap cloning
///
/// Symbols are cloned into every trade and order; Arc<str> keeps those
/// clones allocation-free.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

/// Direction selector for exit signals. `Both` closes every open trade and
/// is only expressible on exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitDirection {
    Long,
    Short,
    Both,
}

impl ExitDirection {
    pub fn matches(&self, direction: Direction) -> bool {
        match self {
            ExitDirection::Both => true,
            ExitDirection::Long => direction == Direction::Long,
            ExitDirection::Short => direction == Direction::Short,
        }
    }
}

/// Why a trade was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TrailingStop,
    ProfitTarget,
    TimeExit,
    SupertrendFlip,
    PriceAction,
    CircuitBreaker,
    EndOfData,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationReason {
    Completed,
    CapitalProtection,
    CircuitBreaker,
}

// ============================================================================
// Signals
// ============================================================================

/// What produced an exit signal; decides the exit reason stamped on the trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitTrigger {
    Rule,
    SupertrendFlip,
}

/// Request to open a new trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrySignal {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub direction: Direction,
    pub price: f64,
    /// Signal strength in [0, 100]
    pub strength: f64,
    /// Signal confidence in [0, 100]
    pub confidence: f64,
    /// Free-form numeric payload copied onto the trade (e.g. `atr`,
    /// `entry_supertrend`).
    #[serde(default)]
    pub metadata: HashMap<String, f64>,
}

/// Request to close open trades
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitSignal {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub direction: ExitDirection,
    pub price: f64,
    pub strength: f64,
    pub confidence: f64,
    pub trigger: ExitTrigger,
}

/// A strategy decision for the current candle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Signal {
    Entry(EntrySignal),
    Exit(ExitSignal),
}

/// Clamp a strength/confidence score into [0, 100].
pub fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

// ============================================================================
// Trades and equity
// ============================================================================

/// Metadata key carrying the ATR observed at entry time.
pub const META_ATR: &str = "atr";
/// Metadata key carrying the Supertrend value of the entry bar.
pub const META_ENTRY_SUPERTREND: &str = "entry_supertrend";

/// An open trade owned by the orchestrator's trade book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveTrade {
    pub id: u64,
    pub symbol: Symbol,
    pub direction: Direction,
    pub entry_price: f64,
    pub quantity: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub entry_time: DateTime<Utc>,
    /// ATR at entry, used for ATR-based stops and trailing offsets
    pub atr_at_entry: f64,
    pub highest_seen: f64,
    pub lowest_seen: f64,
    pub trailing_stop_price: Option<f64>,
    pub trailing_active: bool,
    #[serde(default)]
    pub metadata: HashMap<String, f64>,
}

impl ActiveTrade {
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.direction {
            Direction::Long => (price - self.entry_price) * self.quantity,
            Direction::Short => (self.entry_price - price) * self.quantity,
        }
    }

    pub fn unrealized_pnl_pct(&self, price: f64) -> f64 {
        let notional = self.entry_price * self.quantity;
        if notional == 0.0 {
            return 0.0;
        }
        self.unrealized_pnl(price) / notional * 100.0
    }

    pub fn entry_supertrend(&self) -> Option<f64> {
        self.metadata.get(META_ENTRY_SUPERTREND).copied()
    }
}

/// Completed trade record, append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTrade {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub entry_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub exit_time: DateTime<Utc>,
    pub symbol: Symbol,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub duration_ms: i64,
    pub exit_reason: ExitReason,
}

/// One equity-curve sample per processed candle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityPoint {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub cash_balance: f64,
    pub equity: f64,
    pub drawdown: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_candle_validation_accepts_well_formed() {
        let candle = Candle::new(ts(0), 100.0, 105.0, 95.0, 102.0, 1000.0, Timeframe::M15);
        assert!(candle.is_ok());
    }

    #[test]
    fn test_candle_validation_rejects_inverted_range() {
        let err = Candle::new(ts(0), 100.0, 90.0, 95.0, 92.0, 1000.0, Timeframe::M15);
        assert!(matches!(
            err,
            Err(CandleValidationError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_candle_validation_rejects_close_outside_range() {
        let err = Candle::new(ts(0), 100.0, 105.0, 95.0, 110.0, 1000.0, Timeframe::M15);
        assert!(matches!(
            err,
            Err(CandleValidationError::PriceOutsideRange { field: "close", .. })
        ));
    }

    #[test]
    fn test_candle_validation_rejects_non_positive_price() {
        let err = Candle::new(ts(0), 0.0, 105.0, 95.0, 100.0, 1000.0, Timeframe::M15);
        assert!(matches!(
            err,
            Err(CandleValidationError::NonPositivePrices { .. })
        ));
    }

    #[test]
    fn test_candle_validation_rejects_negative_volume() {
        let err = Candle::new(ts(0), 100.0, 105.0, 95.0, 102.0, -1.0, Timeframe::M15);
        assert!(matches!(err, Err(CandleValidationError::NegativeVolume(_))));
    }

    #[test]
    fn test_timeframe_round_trip() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
        assert!("7m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_unrealized_pnl_directions() {
        let trade = ActiveTrade {
            id: 1,
            symbol: Symbol::new("RELIANCE"),
            direction: Direction::Long,
            entry_price: 100.0,
            quantity: 5.0,
            entry_time: ts(0),
            atr_at_entry: 1.0,
            highest_seen: 100.0,
            lowest_seen: 100.0,
            trailing_stop_price: None,
            trailing_active: false,
            metadata: HashMap::new(),
        };
        assert_eq!(trade.unrealized_pnl(104.0), 20.0);
        assert!((trade.unrealized_pnl_pct(104.0) - 4.0).abs() < 1e-12);

        let short = ActiveTrade {
            direction: Direction::Short,
            ..trade
        };
        assert_eq!(short.unrealized_pnl(104.0), -20.0);
        assert_eq!(short.unrealized_pnl(96.0), 20.0);
    }

    #[test]
    fn test_exit_direction_matching() {
        assert!(ExitDirection::Both.matches(Direction::Long));
        assert!(ExitDirection::Both.matches(Direction::Short));
        assert!(ExitDirection::Long.matches(Direction::Long));
        assert!(!ExitDirection::Long.matches(Direction::Short));
    }

    #[test]
    fn test_body_ratio() {
        let candle =
            Candle::new(ts(0), 100.0, 110.0, 100.0, 108.0, 0.0, Timeframe::M15).unwrap();
        assert!((candle.body_ratio() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_exit_reason_serializes_screaming_snake() {
        let json = serde_json::to_string(&ExitReason::TrailingStop).unwrap();
        assert_eq!(json, "\"TRAILING_STOP\"");
        let json = serde_json::to_string(&ExitReason::EndOfData).unwrap();
        assert_eq!(json, "\"END_OF_DATA\"");
    }
}
