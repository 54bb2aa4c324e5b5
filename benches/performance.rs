//! Performance benchmarks for stock-strategies
//!
//! Run with: `cargo bench`
//! View results: `open target/criterion/report/index.html`

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use stock_strategies::backtest::Backtester;
use stock_strategies::config::Config;
use stock_strategies::indicators::{adx, atr, dema, ema, rsi, supertrend};
use stock_strategies::types::{Candle, Timeframe};

fn synthetic_candles(count: usize) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            let close = 100.0 + ((i as f64) * 0.11).sin() * 5.0 + i as f64 * 0.01;
            Candle {
                timestamp: Utc
                    .timestamp_millis_opt(1_704_186_000_000 + i as i64 * 900_000)
                    .single()
                    .unwrap(),
                open: close - 0.2,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000.0,
                timeframe: Timeframe::M15,
            }
        })
        .collect()
}

fn benchmark_indicators(c: &mut Criterion) {
    let candles = synthetic_candles(5000);
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

    c.bench_function("ema_5000", |b| {
        b.iter(|| ema(black_box(&closes), black_box(21)))
    });
    c.bench_function("dema_5000", |b| {
        b.iter(|| dema(black_box(&closes), black_box(20)))
    });
    c.bench_function("rsi_5000", |b| {
        b.iter(|| rsi(black_box(&closes), black_box(14)))
    });
    c.bench_function("atr_5000", |b| {
        b.iter(|| atr(black_box(&highs), black_box(&lows), black_box(&closes), 14))
    });
    c.bench_function("supertrend_5000", |b| {
        b.iter(|| {
            supertrend(
                black_box(&highs),
                black_box(&lows),
                black_box(&closes),
                10,
                3.0,
            )
        })
    });
    c.bench_function("adx_5000", |b| {
        b.iter(|| adx(black_box(&highs), black_box(&lows), black_box(&closes), 14))
    });
}

fn benchmark_backtest(c: &mut Criterion) {
    let candles = synthetic_candles(2000);
    let config: Config = serde_json::from_str(
        r#"{
            "trading": { "symbol": "BENCH", "timeframe": "15m" },
            "strategy": { "kind": "trend_following" }
        }"#,
    )
    .expect("bench config");

    c.bench_function("backtest_trend_following_2000", |b| {
        b.iter(|| {
            let mut backtester = Backtester::from_config(config.clone());
            backtester.run(black_box(&candles)).expect("bench run")
        })
    });
}

criterion_group!(benches, benchmark_indicators, benchmark_backtest);
criterion_main!(benches);
