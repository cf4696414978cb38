//! Windowed historical ingestion with checkpointing and resume (spec §4.4),
//! grounded on `original_source/src/arcana/pipeline.py::ingest_backfill`.

use crate::eta::format_eta;
use crate::metrics;
use crate::shutdown::ShutdownToken;
use arcana_common::{Result, Trade};
use arcana_ingestion::DataSource;
use arcana_storage::Storage;
use chrono::{DateTime, Duration, Utc};
use std::time::Instant;

/// Trades committed to storage per checkpoint (spec §4.4's "commit batch
/// size (1000 by default)").
pub const COMMIT_BATCH_SIZE: usize = 1000;

pub const DEFAULT_WINDOW: Duration = Duration::minutes(15);

/// Bulk backfill trades from `since` to `until` (defaults to now), walking
/// forward in `window`-sized steps and committing to storage idempotently.
/// Returns the number of *newly inserted* rows.
pub async fn ingest_backfill(
    source: &dyn DataSource,
    storage: &dyn Storage,
    pair: &str,
    since: DateTime<Utc>,
    until: Option<DateTime<Utc>>,
    window: Duration,
    rate_delay: std::time::Duration,
    shutdown: &ShutdownToken,
) -> Result<u64> {
    let end = until.unwrap_or_else(Utc::now);

    // Resume from the latest stored trade within the backfill range, so
    // re-running this call is safe and makes concurrent disjoint-range
    // workers possible (spec §4.4 step 1, §5 "swarm" model).
    let mut since = since;
    if let Some(last_ts) = storage.last_trade_timestamp(pair, source.name(), Some(end)).await? {
        if last_ts > since {
            tracing::info!("resuming backfill from {} (found existing data)", last_ts.to_rfc3339());
            since = last_ts;
        }
    }

    let total_windows = ((end - since).num_seconds() as f64 / window.num_seconds() as f64)
        .ceil()
        .max(1.0) as u64;
    let mut current = since;
    let mut window_num = 0u64;
    let mut total_inserted = 0u64;
    let mut buffer: Vec<Trade> = Vec::new();
    let start_time = Instant::now();

    tracing::info!(
        "starting backfill: {} {} from {} to {} (~{} windows)",
        source.name(),
        pair,
        since.to_rfc3339(),
        end.to_rfc3339(),
        total_windows
    );

    while current < end {
        if shutdown.should_stop() {
            tracing::info!("shutdown requested — committing remaining buffer");
            if !buffer.is_empty() {
                total_inserted += storage.insert_trades(&buffer).await?;
                buffer.clear();
            }
            break;
        }

        let window_end = (current + window).min(end);
        window_num += 1;

        let fetched = match source.fetch_all_trades(pair, current, window_end).await {
            Ok(trades) => trades,
            Err(e) => {
                tracing::error!(
                    "failed to fetch window {} ({} -> {}): {}. halting backfill",
                    window_num,
                    current.to_rfc3339(),
                    window_end.to_rfc3339(),
                    e
                );
                metrics::record_fetch_error(pair, source.name());
                if !buffer.is_empty() {
                    total_inserted += storage.insert_trades(&buffer).await?;
                }
                return Err(e);
            }
        };
        let fetched_count = fetched.len();
        buffer.extend(fetched);

        if buffer.len() >= COMMIT_BATCH_SIZE {
            total_inserted += storage.insert_trades(&buffer).await?;
            buffer.clear();
        }

        let elapsed = start_time.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 { total_inserted as f64 / elapsed } else { 0.0 };
        let remaining_windows = total_windows.saturating_sub(window_num);
        let eta_seconds = if elapsed > 0.0 {
            remaining_windows as f64 * elapsed / window_num as f64
        } else {
            0.0
        };

        tracing::info!(
            "window {}/{} | {} -> {} | {} trades this window | total: {} stored | {:.1} trades/sec | eta: {}",
            window_num,
            total_windows,
            current.to_rfc3339(),
            window_end.to_rfc3339(),
            fetched_count,
            total_inserted + buffer.len() as u64,
            rate,
            format_eta(eta_seconds)
        );
        metrics::set_backfill_rate(pair, rate);

        current = window_end;
        tokio::time::sleep(rate_delay).await;
    }

    if !buffer.is_empty() {
        total_inserted += storage.insert_trades(&buffer).await?;
    }

    tracing::info!(
        "backfill complete: {} trades inserted in {}",
        total_inserted,
        format_eta(start_time.elapsed().as_secs_f64())
    );
    metrics::record_trades_ingested(pair, source.name(), total_inserted);
    Ok(total_inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_common::Side;
    use arcana_ingestion::InMemoryDataSource;
    use arcana_storage::DuckDbStorage;
    use rust_decimal_macros::dec;

    fn trade(id: &str, secs: i64) -> Trade {
        Trade::new(
            Utc::now() - Duration::days(1) + Duration::seconds(secs),
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
    async fn backfill_is_idempotent_on_rerun() {
        let source = InMemoryDataSource::new("fixture");
        source.seed(
            "ETH-USD",
            (0..10).map(|i| trade(&i.to_string(), i * 60)).collect(),
        );
        let storage = DuckDbStorage::in_memory().await.unwrap();
        let shutdown = ShutdownToken::new();

        let since = Utc::now() - Duration::days(1) - Duration::minutes(1);
        let until = Utc::now();

        let first = ingest_backfill(
            &source,
            &storage,
            "ETH-USD",
            since,
            Some(until),
            Duration::minutes(5),
            std::time::Duration::from_millis(0),
            &shutdown,
        )
        .await
        .unwrap();
        assert_eq!(first, 10);

        let second = ingest_backfill(
            &source,
            &storage,
            "ETH-USD",
            since,
            Some(until),
            Duration::minutes(5),
            std::time::Duration::from_millis(0),
            &shutdown,
        )
        .await
        .unwrap();
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn backfill_respects_shutdown_token() {
        let source = InMemoryDataSource::new("fixture");
        source.seed(
            "ETH-USD",
            (0..10).map(|i| trade(&i.to_string(), i * 60)).collect(),
        );
        let storage = DuckDbStorage::in_memory().await.unwrap();
        let shutdown = ShutdownToken::new();
        shutdown.trigger();

        let since = Utc::now() - Duration::days(1) - Duration::minutes(1);
        let inserted = ingest_backfill(
            &source,
            &storage,
            "ETH-USD",
            since,
            Some(Utc::now()),
            Duration::minutes(5),
            std::time::Duration::from_millis(0),
            &shutdown,
        )
        .await
        .unwrap();
        assert_eq!(inserted, 0);
    }
}
