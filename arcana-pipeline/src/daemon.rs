//! Long-running polling daemon (spec §4.5), grounded on
//! `original_source/src/arcana/pipeline.py::run_daemon`.

use crate::backfill::ingest_backfill;
use crate::metrics;
use crate::shutdown::ShutdownToken;
use arcana_common::{ArcanaError, Result};
use arcana_ingestion::DataSource;
use arcana_storage::Storage;
use chrono::{Duration, Utc};
use std::time::Instant;

pub const DAEMON_INTERVAL_SECONDS: u64 = 15 * 60;

/// Polls `source` for new trades every `interval_seconds`, inserting them
/// into `storage`. Fails fast if `pair` has no stored trades yet — the
/// daemon only ever extends an existing log, it does not perform the
/// initial backfill itself.
pub async fn run_daemon(
    source: &dyn DataSource,
    storage: &dyn Storage,
    pair: &str,
    interval_seconds: u64,
    rate_delay: std::time::Duration,
    shutdown: &ShutdownToken,
) -> Result<()> {
    let mut last_ts = storage
        .last_trade_timestamp(pair, source.name(), None)
        .await?
        .ok_or_else(|| {
            ArcanaError::configuration(format!(
                "no trades found for {pair}. run 'arcana ingest {pair} --since <date>' first"
            ))
        })?;

    tracing::info!(
        "daemon starting for {} {} | last trade: {} | poll interval: {}s",
        source.name(),
        pair,
        last_ts.to_rfc3339(),
        interval_seconds
    );

    let gap = Utc::now() - last_ts;
    if gap > Duration::seconds(interval_seconds as i64) {
        tracing::info!("catching up: {:?} gap detected", gap);
        ingest_backfill(
            source,
            storage,
            pair,
            last_ts,
            None,
            crate::backfill::DEFAULT_WINDOW,
            rate_delay,
            shutdown,
        )
        .await?;
        if let Some(new_last) = storage.last_trade_timestamp(pair, source.name(), None).await? {
            last_ts = new_last;
        }
    }

    let mut cycle = 0u64;
    while !shutdown.should_stop() {
        cycle += 1;
        let now = Utc::now();
        let cycle_start = Instant::now();

        match source.fetch_all_trades(pair, last_ts, now).await {
            Ok(trades) if !trades.is_empty() => {
                let fetched = trades.len();
                let inserted = storage.insert_trades(&trades).await?;
                if let Some(new_last) = storage.last_trade_timestamp(pair, source.name(), None).await? {
                    last_ts = new_last;
                }
                tracing::info!(
                    "cycle {} | {} trades fetched, {} new | last: {}",
                    cycle,
                    fetched,
                    inserted,
                    last_ts.to_rfc3339()
                );
                metrics::record_trades_ingested(pair, source.name(), inserted);
            }
            Ok(_) => {
                tracing::info!("cycle {} | no new trades", cycle);
            }
            Err(e) => {
                tracing::error!("cycle {} failed: {}. will retry next cycle", cycle, e);
                metrics::record_fetch_error(pair, source.name());
            }
        }
        metrics::record_daemon_cycle_duration(pair, cycle_start.elapsed().as_secs_f64() * 1000.0);

        // Sleep in one-second increments so shutdown stays responsive
        // (spec §4.5's "broken into one-second increments").
        for _ in 0..interval_seconds {
            if shutdown.should_stop() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }

    tracing::info!("daemon stopped for {}", pair);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_common::{Side, Trade};
    use arcana_ingestion::InMemoryDataSource;
    use arcana_storage::DuckDbStorage;
    use rust_decimal_macros::dec;

    fn trade(id: &str, secs: i64) -> Trade {
        Trade::new(
            Utc::now() - Duration::seconds(secs),
            id,
            "fixture",
            "ETH-USD",
            dec!(100),
            dec!(1),
            Side::Buy,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn daemon_fails_fast_with_no_stored_trades() {
        let source = InMemoryDataSource::new("fixture");
        let storage = DuckDbStorage::in_memory().await.unwrap();
        let shutdown = ShutdownToken::new();

        let err = run_daemon(
            &source,
            &storage,
            "ETH-USD",
            1,
            std::time::Duration::from_millis(0),
            &shutdown,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("arcana ingest"));
    }

    #[tokio::test]
    async fn daemon_exits_immediately_when_already_shut_down() {
        let source = InMemoryDataSource::new("fixture");
        let storage = DuckDbStorage::in_memory().await.unwrap();
        storage.insert_trades(&[trade("1", 5)]).await.unwrap();
        let shutdown = ShutdownToken::new();
        shutdown.trigger();

        run_daemon(
            &source,
            &storage,
            "ETH-USD",
            1,
            std::time::Duration::from_millis(0),
            &shutdown,
        )
        .await
        .unwrap();
    }
}
