//! Validation and safety gate
//!
//! Two-phase admission control. Phase one checks schema and parameter
//! ranges and yields hard errors plus advisory warnings. Phase two runs the
//! severity-graded safety checks; a run proceeds only when no CRITICAL and
//! no failing HIGH checks remain.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Config, StrategyParams, TrailingMode};
use crate::error::BacktestError;
use crate::types::Timeframe;

/// Severity grade for safety checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One safety check outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub severity: Severity,
}

/// Full safety report with per-check outcomes and recommendations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyReport {
    pub checks: Vec<SafetyCheck>,
    pub recommendations: Vec<String>,
}

impl SafetyReport {
    /// The run may proceed: nothing CRITICAL, and no failing HIGH check.
    pub fn approved(&self) -> bool {
        !self.checks.iter().any(|c| {
            !c.passed && matches!(c.severity, Severity::Critical | Severity::High)
        })
    }

    pub fn failing(&self) -> Vec<&SafetyCheck> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }
}

/// Parameter validation outcome
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn log(&self) {
        for error in &self.errors {
            tracing::error!("Config validation error: {}", error);
        }
        for warning in &self.warnings {
            tracing::warn!("Config validation warning: {}", warning);
        }
    }
}

/// Phase one: schema and parameter-range validation.
pub fn validate_config(config: &Config) -> ValidationReport {
    let mut report = ValidationReport::default();
    let trading = &config.trading;

    if trading.symbol.trim().is_empty() {
        report.errors.push("symbol must not be empty".to_string());
    }

    if trading.timeframe.parse::<Timeframe>().is_err() {
        report.errors.push(format!(
            "timeframe '{}' is not supported (expected one of {})",
            trading.timeframe,
            Timeframe::ALL
                .iter()
                .map(|tf| tf.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    if let (Some(start), Some(end)) = (trading.start, trading.end) {
        if end <= start {
            report
                .errors
                .push(format!("end ({}) must be after start ({})", end, start));
        }
    }

    if trading.capital <= 0.0 {
        report
            .errors
            .push(format!("capital must be positive, got {}", trading.capital));
    }

    if !(0.0..=1.0).contains(&trading.max_loss_pct) {
        report.errors.push(format!(
            "max_loss_pct must be in [0, 1], got {}",
            trading.max_loss_pct
        ));
    }

    if !(1.0..=20.0).contains(&trading.max_lots) {
        report
            .errors
            .push(format!("max_lots must be in [1, 20], got {}", trading.max_lots));
    }

    if trading.position_size <= 0.0 {
        report.errors.push(format!(
            "position_size must be positive, got {}",
            trading.position_size
        ));
    }

    if trading.dynamic_position_sizing && trading.base_position_size <= 0.0 {
        report.warnings.push(
            "dynamic sizing with a non-positive base_position_size can produce zero-quantity entries"
                .to_string(),
        );
    }

    match &config.strategy {
        StrategyParams::EmaGapAtr(params) => {
            if !(1..=200).contains(&params.ema_fast) || !(1..=200).contains(&params.ema_slow) {
                report.errors.push(format!(
                    "EMA periods must be in [1, 200], got fast={} slow={}",
                    params.ema_fast, params.ema_slow
                ));
            }
            if params.ema_fast >= params.ema_slow {
                report.errors.push(format!(
                    "ema_fast ({}) must be less than ema_slow ({})",
                    params.ema_fast, params.ema_slow
                ));
            }
            if !(1..=100).contains(&params.atr_period) {
                report.errors.push(format!(
                    "atr_period must be in [1, 100], got {}",
                    params.atr_period
                ));
            }
            for (name, value) in [
                ("rsi_entry_long", params.rsi_entry_long),
                ("rsi_entry_short", params.rsi_entry_short),
                ("rsi_exit_long", params.rsi_exit_long),
                ("rsi_exit_short", params.rsi_exit_short),
            ] {
                if !(0.0..=100.0).contains(&value) {
                    report
                        .errors
                        .push(format!("{} must be in [0, 100], got {}", name, value));
                }
            }
        }
        StrategyParams::TrendFollowing(params) => {
            if !(1..=200).contains(&params.dema_period) {
                report.errors.push(format!(
                    "dema_period must be in [1, 200], got {}",
                    params.dema_period
                ));
            }
            if !(1..=100).contains(&params.supertrend_period) {
                report.errors.push(format!(
                    "supertrend_period must be in [1, 100], got {}",
                    params.supertrend_period
                ));
            }
        }
        StrategyParams::PriceAction(params) => {
            if !(1..=100).contains(&params.supertrend_period) {
                report.errors.push(format!(
                    "supertrend_period must be in [1, 100], got {}",
                    params.supertrend_period
                ));
            }
            if params.macd_fast == 0 || params.macd_slow == 0 || params.macd_signal == 0 {
                report
                    .errors
                    .push("MACD periods must be positive".to_string());
            } else if params.macd_fast >= params.macd_slow {
                report.errors.push(format!(
                    "macd_fast ({}) must be less than macd_slow ({})",
                    params.macd_fast, params.macd_slow
                ));
            }
        }
    }

    report
}

/// Phase two: severity-graded safety checks. `now` anchors the date checks.
pub fn safety_report(config: &Config, now: DateTime<Utc>) -> SafetyReport {
    let trading = &config.trading;
    let mut checks = Vec::new();

    let mut check = |name: &str, passed: bool, message: String, severity: Severity| {
        checks.push(SafetyCheck {
            name: name.to_string(),
            passed,
            message,
            severity,
        });
    };

    // ---- CRITICAL ----

    check(
        "capital_protection_configured",
        trading.max_loss_pct > 0.0,
        if trading.max_loss_pct > 0.0 {
            format!("max_loss_pct = {:.2}% of capital", trading.max_loss_pct * 100.0)
        } else {
            "max_loss_pct = 0 disables capital protection (unlimited risk)".to_string()
        },
        Severity::Critical,
    );

    check(
        "max_lots_bounded",
        trading.max_lots <= 15.0,
        format!("max_lots = {}", trading.max_lots),
        Severity::Critical,
    );

    let dates_in_past = trading.start.map_or(true, |s| s <= now)
        && trading.end.map_or(true, |e| e <= now);
    check(
        "dates_not_in_future",
        dates_in_past,
        if dates_in_past {
            "backtest range lies in the past".to_string()
        } else {
            "start or end date is in the future".to_string()
        },
        Severity::Critical,
    );

    // ---- HIGH ----

    if let StrategyParams::EmaGapAtr(params) = &config.strategy {
        check(
            "ema_fast_meaningful",
            params.ema_fast >= 2,
            format!("ema_fast = {}", params.ema_fast),
            Severity::High,
        );

        let filtered = params.atr_multiplier_entry > 0.0
            || params.rsi_entry_long > 0.0
            || params.rsi_entry_short < 100.0;
        check(
            "entry_filtering_present",
            filtered,
            if filtered {
                "entries are gated by gap and RSI thresholds".to_string()
            } else {
                "every crossover would be taken: no gap or RSI filtering".to_string()
            },
            Severity::High,
        );
    }

    check(
        "initial_balance_plausible",
        trading.capital <= 100_000_000.0,
        format!("capital = {:.2}", trading.capital),
        Severity::High,
    );

    if let TrailingMode::Atr { multiplier } = trading.trailing.mode {
        check(
            "trailing_stop_width",
            multiplier <= 5.0,
            format!("trailing stop at {:.1}x ATR", multiplier),
            Severity::High,
        );
    }

    // ---- MEDIUM ----

    if let StrategyParams::EmaGapAtr(params) = &config.strategy {
        check(
            "ema_slow_reasonable",
            params.ema_slow <= 100,
            format!("ema_slow = {}", params.ema_slow),
            Severity::Medium,
        );

        let extreme_rsi = [params.rsi_entry_long, params.rsi_entry_short]
            .iter()
            .any(|v| *v < 20.0 || *v > 80.0);
        check(
            "rsi_thresholds_moderate",
            !extreme_rsi,
            format!(
                "RSI entry thresholds: long {} / short {}",
                params.rsi_entry_long, params.rsi_entry_short
            ),
            Severity::Medium,
        );
    }

    let range = match (trading.start, trading.end) {
        (Some(start), Some(end)) if end > start => Some(end - start),
        _ => None,
    };

    if let Some(range) = range {
        if trading.timeframe == Timeframe::M1.as_str() {
            check(
                "one_minute_range_bounded",
                range <= Duration::days(30),
                format!("1m data over {} days", range.num_days()),
                Severity::Medium,
            );
        }

        check(
            "range_not_too_short",
            range > Duration::days(3),
            format!("range spans {} days", range.num_days()),
            Severity::Medium,
        );

        // ---- LOW ----

        check(
            "range_not_excessive",
            range <= Duration::days(365 * 3),
            format!("range spans {} days", range.num_days()),
            Severity::Low,
        );

        check(
            "range_statistically_useful",
            !(range > Duration::days(3) && range <= Duration::days(30)),
            format!("range spans {} days", range.num_days()),
            Severity::Low,
        );
    }

    if let Some(start) = trading.start {
        check(
            "start_date_recent",
            now - start <= Duration::days(365),
            format!("start date {} ", start.format("%Y-%m-%d")),
            Severity::Medium,
        );
    }

    let recommendations = checks
        .iter()
        .filter(|c| !c.passed)
        .map(|c| match c.severity {
            Severity::Critical => format!("Fix before running: {} ({})", c.name, c.message),
            Severity::High => format!("Strongly reconsider: {} ({})", c.name, c.message),
            Severity::Medium | Severity::Low => {
                format!("Review: {} ({})", c.name, c.message)
            }
        })
        .collect();

    SafetyReport {
        checks,
        recommendations,
    }
}

/// Run both phases; the error carries the first blocking reason.
pub fn admit(config: &Config, now: DateTime<Utc>) -> Result<SafetyReport, BacktestError> {
    let validation = validate_config(config);
    validation.log();
    if !validation.is_valid() {
        return Err(BacktestError::ConfigInvalid(validation.errors.join("; ")));
    }

    let report = safety_report(config, now);
    if !report.approved() {
        let blocking: Vec<String> = report
            .failing()
            .iter()
            .filter(|c| matches!(c.severity, Severity::Critical | Severity::High))
            .map(|c| format!("{} [{}]", c.name, c.message))
            .collect();
        return Err(BacktestError::SafetyBlocked(blocking.join("; ")));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::ema_gap_atr::EmaGapAtrConfig;
    use crate::strategies::trend_following::TrendFollowingConfig;
    use chrono::TimeZone;

    fn base_config() -> Config {
        serde_json::from_str(
            r#"{
                "trading": { "symbol": "SBIN", "timeframe": "15m" },
                "strategy": { "kind": "trend_following" }
            }"#,
        )
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_base_config_admitted() {
        let report = admit(&base_config(), now()).unwrap();
        assert!(report.approved());
    }

    #[test]
    fn test_empty_symbol_rejected() {
        let mut config = base_config();
        config.trading.symbol = "  ".to_string();
        let report = validate_config(&config);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_bad_timeframe_rejected() {
        let mut config = base_config();
        config.trading.timeframe = "7m".to_string();
        assert!(!validate_config(&config).is_valid());
    }

    #[test]
    fn test_zero_max_loss_pct_blocks() {
        let mut config = base_config();
        config.trading.max_loss_pct = 0.0;
        let err = admit(&config, now());
        assert!(matches!(err, Err(BacktestError::SafetyBlocked(_))));
    }

    #[test]
    fn test_max_lots_over_15_blocks() {
        let mut config = base_config();
        config.trading.max_lots = 16.0;
        let err = admit(&config, now());
        assert!(matches!(err, Err(BacktestError::SafetyBlocked(_))));
    }

    #[test]
    fn test_future_dates_block() {
        let mut config = base_config();
        config.trading.start = Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
        config.trading.end = Some(Utc.with_ymd_and_hms(2030, 2, 1, 0, 0, 0).unwrap());
        let err = admit(&config, now());
        assert!(matches!(err, Err(BacktestError::SafetyBlocked(_))));
    }

    #[test]
    fn test_ema_fast_below_two_blocks() {
        let mut config = base_config();
        config.strategy = StrategyParams::EmaGapAtr(EmaGapAtrConfig {
            ema_fast: 1,
            ..EmaGapAtrConfig::default()
        });
        let err = admit(&config, now());
        assert!(matches!(err, Err(BacktestError::SafetyBlocked(_))));
    }

    #[test]
    fn test_fast_not_below_slow_is_config_error() {
        let mut config = base_config();
        config.strategy = StrategyParams::EmaGapAtr(EmaGapAtrConfig {
            ema_fast: 30,
            ema_slow: 20,
            ..EmaGapAtrConfig::default()
        });
        let err = admit(&config, now());
        assert!(matches!(err, Err(BacktestError::ConfigInvalid(_))));
    }

    #[test]
    fn test_wide_trailing_stop_blocks() {
        let mut config = base_config();
        config.trading.trailing.mode = TrailingMode::Atr { multiplier: 6.0 };
        let err = admit(&config, now());
        assert!(matches!(err, Err(BacktestError::SafetyBlocked(_))));
    }

    #[test]
    fn test_medium_and_low_findings_do_not_block() {
        let mut config = base_config();
        // 10-day range: "not statistically useful" (LOW) but admissible
        config.trading.start = Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        config.trading.end = Some(Utc.with_ymd_and_hms(2024, 5, 11, 0, 0, 0).unwrap());

        let report = admit(&config, now()).unwrap();
        assert!(report.approved());
        assert!(report.failing().iter().any(|c| c.severity == Severity::Low));
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn test_old_start_is_medium_finding() {
        let mut config = base_config();
        config.trading.start = Some(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap());
        config.trading.end = Some(Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap());

        let report = admit(&config, now()).unwrap();
        assert!(report
            .failing()
            .iter()
            .any(|c| c.name == "start_date_recent" && c.severity == Severity::Medium));
    }

    #[test]
    fn test_trend_following_period_ranges() {
        let mut config = base_config();
        config.strategy = StrategyParams::TrendFollowing(TrendFollowingConfig {
            dema_period: 0,
            ..TrendFollowingConfig::default()
        });
        assert!(!validate_config(&config).is_valid());
    }
}
