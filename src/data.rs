//! Data loading and management
//!
//! The reference market-data provider reads `<SYMBOL>_<TIMEFRAME>.csv`
//! files with `timestamp|date, open, high, low, close, volume` columns,
//! drops rows failing the OHLC invariants, and returns candles sorted by
//! timestamp. Gaps in the series are allowed but logged.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use itertools::Itertools;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::{Candle, Symbol, Timeframe};

/// Historical candle source consumed by the engine
pub trait MarketDataProvider {
    fn get_historical_candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>>;
}

/// Parse a CLI date argument (YYYY-MM-DD, with an optional time part).
pub fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(s).with_context(|| format!("Invalid date: {}", s))
}

// =============================================================================
// CSV Data Loading
// =============================================================================

/// Parse a timestamp cell: epoch milliseconds or a datetime/date string.
fn parse_timestamp(cell: &str) -> Result<DateTime<Utc>> {
    if let Ok(epoch_ms) = cell.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(epoch_ms)
            .single()
            .with_context(|| format!("Epoch millis out of range: {}", cell));
    }
    if let Ok(dt) = cell.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(cell, "%Y-%m-%d") {
        let ndt = date
            .and_hms_opt(0, 0, 0)
            .context("Invalid midnight timestamp")?;
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }
    bail!("Failed to parse timestamp: {}", cell)
}

/// Read candles from any CSV source. Rows violating the OHLC invariants
/// are dropped with a warning; the result is sorted by timestamp.
pub fn read_candles(reader: impl Read, timeframe: Timeframe) -> Result<Vec<Candle>> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    let headers = csv_reader
        .headers()
        .context("Missing CSV header row")?
        .clone();
    let col = |names: &[&str]| -> Option<usize> {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    };

    let ts_col = col(&["timestamp", "date", "datetime"])
        .context("Missing timestamp/date column")?;
    let open_col = col(&["open"]).context("Missing open column")?;
    let high_col = col(&["high"]).context("Missing high column")?;
    let low_col = col(&["low"]).context("Missing low column")?;
    let close_col = col(&["close"]).context("Missing close column")?;
    let volume_col = col(&["volume"]).context("Missing volume column")?;

    let mut candles = Vec::new();
    let mut dropped = 0usize;

    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let cell = |idx: usize| -> Result<&str> {
            record
                .get(idx)
                .with_context(|| format!("Row {} is missing column {}", row_idx + 1, idx))
        };

        let timestamp = parse_timestamp(cell(ts_col)?)
            .with_context(|| format!("Row {}", row_idx + 1))?;
        let open: f64 = cell(open_col)?.parse().context("Failed to parse open")?;
        let high: f64 = cell(high_col)?.parse().context("Failed to parse high")?;
        let low: f64 = cell(low_col)?.parse().context("Failed to parse low")?;
        let close: f64 = cell(close_col)?.parse().context("Failed to parse close")?;
        let volume: f64 = cell(volume_col)?.parse().context("Failed to parse volume")?;

        match Candle::new(timestamp, open, high, low, close, volume, timeframe) {
            Ok(candle) => candles.push(candle),
            Err(err) => {
                dropped += 1;
                warn!(row = row_idx + 1, %err, "Dropping invalid candle");
            }
        }
    }

    if dropped > 0 {
        warn!(dropped, kept = candles.len(), "Candles failed validation");
    }

    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

/// Load OHLCV data from a CSV file
pub fn load_csv(path: impl AsRef<Path>, timeframe: Timeframe) -> Result<Vec<Candle>> {
    let file = std::fs::File::open(path.as_ref())
        .with_context(|| format!("Failed to open CSV file: {}", path.as_ref().display()))?;
    read_candles(file, timeframe)
}

/// Log non-uniform spacing in a sorted candle series.
pub fn log_gaps(candles: &[Candle], timeframe: Timeframe) -> usize {
    let expected = timeframe.duration_ms();
    let mut gaps = 0usize;

    for (prev, next) in candles.iter().tuple_windows() {
        let delta = (next.timestamp - prev.timestamp).num_milliseconds();
        if delta > expected {
            gaps += 1;
            warn!(
                from = %prev.timestamp,
                to = %next.timestamp,
                missing = delta / expected - 1,
                "Gap in candle series"
            );
        }
    }

    gaps
}

/// Aggregate candles into larger buckets (e.g. 1m -> 15m): first open,
/// max high, min low, last close, summed volume. Bucket boundaries align to
/// the target duration on the epoch clock.
pub fn aggregate_candles(candles: &[Candle], target: Timeframe) -> Vec<Candle> {
    let bucket_ms = target.duration_ms();
    let mut result: Vec<Candle> = Vec::new();

    for candle in candles {
        let bucket_start = candle.timestamp.timestamp_millis().div_euclid(bucket_ms) * bucket_ms;
        let bucket_ts = Utc
            .timestamp_millis_opt(bucket_start)
            .single()
            .unwrap_or(candle.timestamp);

        match result.last_mut() {
            Some(last) if last.timestamp == bucket_ts => {
                last.high = last.high.max(candle.high);
                last.low = last.low.min(candle.low);
                last.close = candle.close;
                last.volume += candle.volume;
            }
            _ => {
                result.push(Candle {
                    timestamp: bucket_ts,
                    open: candle.open,
                    high: candle.high,
                    low: candle.low,
                    close: candle.close,
                    volume: candle.volume,
                    timeframe: target,
                });
            }
        }
    }

    result
}

// =============================================================================
// CSV-backed provider
// =============================================================================

/// Reference `MarketDataProvider` reading `<SYMBOL>_<TIMEFRAME>.csv` files
/// from a data directory.
pub struct CsvDataProvider {
    data_dir: PathBuf,
}

impl CsvDataProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn file_path(&self, symbol: &Symbol, timeframe: Timeframe) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}.csv", symbol.as_str(), timeframe.as_str()))
    }
}

impl MarketDataProvider for CsvDataProvider {
    fn get_historical_candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>> {
        let path = self.file_path(symbol, timeframe);
        if !path.exists() {
            bail!("Data file not found: {}", path.display());
        }

        let mut candles = load_csv(&path, timeframe)
            .with_context(|| format!("Failed to load data for {}", symbol))?;

        if let Some(start) = start {
            candles.retain(|c| c.timestamp >= start);
        }
        if let Some(end) = end {
            candles.retain(|c| c.timestamp <= end);
        }

        log_gaps(&candles, timeframe);
        info!("Loaded {} candles for {}", candles.len(), symbol);
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV_FIXTURE: &str = "\
timestamp,open,high,low,close,volume
1704186000000,100.0,105.0,95.0,102.0,1000
1704186900000,102.0,104.0,100.0,103.0,1200
1704185100000,99.0,101.0,97.0,100.0,900
1704187800000,103.0,90.0,95.0,104.0,1100
";

    #[test]
    fn test_read_candles_sorts_and_drops_invalid() {
        // Row 4 has high < low and must be dropped; rows are out of order.
        let candles = read_candles(CSV_FIXTURE.as_bytes(), Timeframe::M15).unwrap();
        assert_eq!(candles.len(), 3);
        assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(candles[0].close, 100.0);
    }

    #[test]
    fn test_read_candles_date_column() {
        let csv = "\
date,open,high,low,close,volume
2024-01-02 09:15:00,100.0,101.0,99.0,100.5,1000
2024-01-02 09:30:00,100.5,102.0,100.0,101.5,1500
";
        let candles = read_candles(csv.as_bytes(), Timeframe::M15).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, 100.0);
    }

    #[test]
    fn test_read_candles_missing_column() {
        let csv = "timestamp,open,high,low\n1,2,3,4\n";
        assert!(read_candles(csv.as_bytes(), Timeframe::M15).is_err());
    }

    #[test]
    fn test_log_gaps_counts_missing_intervals() {
        let candles = read_candles(CSV_FIXTURE.as_bytes(), Timeframe::M15).unwrap();
        // Sorted: 08:45, 09:00, 09:15 UTC at 15m spacing -> no gaps
        assert_eq!(log_gaps(&candles, Timeframe::M15), 0);

        let sparse: Vec<Candle> = candles
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, mut c)| {
                c.timestamp = c.timestamp + chrono::Duration::minutes(15 * i as i64);
                c
            })
            .collect();
        assert_eq!(log_gaps(&sparse, Timeframe::M15), 2);
    }

    #[test]
    fn test_aggregate_one_minute_to_fifteen() {
        let base = Utc.timestamp_millis_opt(1_704_186_000_000).single().unwrap();
        let candles: Vec<Candle> = (0..30)
            .map(|i| Candle {
                timestamp: base + chrono::Duration::minutes(i),
                open: 100.0 + i as f64,
                high: 101.0 + i as f64,
                low: 99.0 + i as f64,
                close: 100.5 + i as f64,
                volume: 10.0,
                timeframe: Timeframe::M1,
            })
            .collect();

        let aggregated = aggregate_candles(&candles, Timeframe::M15);
        assert_eq!(aggregated.len(), 2);

        let first = &aggregated[0];
        assert_eq!(first.open, 100.0);
        assert_eq!(first.high, 101.0 + 14.0);
        assert_eq!(first.low, 99.0);
        assert_eq!(first.close, 100.5 + 14.0);
        assert_eq!(first.volume, 150.0);
        assert_eq!(first.timeframe, Timeframe::M15);
    }
}
