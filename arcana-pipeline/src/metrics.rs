//! Pipeline metrics, in the same per-domain free-function style as
//! `common::metrics::market_data`.

use ::metrics::{counter, gauge, histogram};

pub fn record_trades_ingested(pair: &str, source: &str, count: u64) {
    counter!("arcana_trades_ingested_total", "pair" => pair.to_string(), "source" => source.to_string())
        .increment(count);
}

pub fn record_bars_emitted(bar_type: &str, pair: &str, count: u64) {
    counter!("arcana_bars_emitted_total", "bar_type" => bar_type.to_string(), "pair" => pair.to_string())
        .increment(count);
}

pub fn record_daemon_cycle_duration(pair: &str, duration_ms: f64) {
    histogram!("arcana_daemon_cycle_duration_ms", "pair" => pair.to_string()).record(duration_ms);
}

pub fn record_fetch_error(pair: &str, source: &str) {
    counter!("arcana_source_fetch_errors_total", "pair" => pair.to_string(), "source" => source.to_string())
        .increment(1);
}

pub fn set_backfill_rate(pair: &str, trades_per_sec: f64) {
    gauge!("arcana_backfill_trades_per_sec", "pair" => pair.to_string()).set(trades_per_sec);
}
