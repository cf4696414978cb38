//! Bar construction loop (spec §4.5), grounded on
//! `original_source/src/arcana/pipeline.py::build_bars`.

use crate::eta::format_eta;
use crate::metrics;
use crate::shutdown::ShutdownToken;
use arcana_bars::BarBuilder;
use arcana_common::Result;
use arcana_storage::{Storage, TradeCursor};
use chrono::Duration;
use std::time::Instant;

/// Trades fetched per storage round-trip while building bars (spec §4.5
/// step 3's "limit of 100 000 rows").
pub const TRADE_BATCH: u32 = 100_000;

/// Drives `builder` to exhaustion over the stored trade log for
/// `(pair, source)`, storing emitted bars. Resumable: restarts from the
/// last emitted bar's `time_end` and restores the builder's EWMA state
/// from that bar's metadata before trimming any stale partial bar.
pub async fn build_bars(
    builder: &mut dyn BarBuilder,
    storage: &dyn Storage,
    pair: &str,
    source: &str,
    rebuild: bool,
    shutdown: &ShutdownToken,
) -> Result<u64> {
    let bar_type = builder.bar_type().to_string();

    if rebuild {
        storage
            .delete_bars_since(&bar_type, pair, chrono::DateTime::<chrono::Utc>::MIN_UTC)
            .await?;
        tracing::info!("rebuild: cleared existing {} bars for {}", bar_type, pair);
    }

    // `cursor_trade_id` is `None` until we've actually replayed a trade row:
    // the initial resume point is a bar/trade-log boundary, not a row, so the
    // first query must use a strict `timestamp > cursor_ts` with no tie-break
    // (otherwise the trade that closed the last bar would be replayed again).
    let mut cursor_ts: chrono::DateTime<chrono::Utc>;
    let mut cursor_trade_id: Option<String> = None;

    if let Some(last_bar) = storage.last_bar(&bar_type, pair).await? {
        // Restore EWMA state *before* deleting stale bars — the last bar's
        // metadata is the only place that state lives (spec §4.3).
        if let Some(metadata) = &last_bar.metadata {
            builder.restore_state(metadata)?;
            tracing::info!("restored builder state from last bar metadata: {:?}", metadata);
        }

        storage.delete_bars_since(&bar_type, pair, last_bar.time_end).await?;
        tracing::info!(
            "resuming {} bar construction from {}",
            bar_type,
            last_bar.time_end.to_rfc3339()
        );
        cursor_ts = last_bar.time_end;
    } else {
        let Some(first_ts) = storage.first_trade_timestamp(pair, source).await? else {
            tracing::error!("no trades found for {}. run 'arcana ingest' first", pair);
            return Ok(0);
        };
        tracing::info!("building {} bars from first trade at {}", bar_type, first_ts.to_rfc3339());
        cursor_ts = first_ts - Duration::microseconds(1);
    }

    let mut total_bars = 0u64;
    let mut total_trades = 0u64;
    let start_time = Instant::now();

    while !shutdown.should_stop() {
        let trade_cursor = TradeCursor {
            timestamp: cursor_ts,
            trade_id: cursor_trade_id.as_deref(),
        };
        let trades = storage.scan_trades(pair, source, Some(trade_cursor), TRADE_BATCH).await?;
        if trades.is_empty() {
            break;
        }

        let bars = builder.process_trades(&trades)?;
        if !bars.is_empty() {
            storage.insert_bars(&bars).await?;
            total_bars += bars.len() as u64;
        }

        total_trades += trades.len() as u64;
        let last = trades.last().unwrap();
        cursor_ts = last.timestamp;
        cursor_trade_id = Some(last.trade_id.clone());

        let elapsed = start_time.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 { total_trades as f64 / elapsed } else { 0.0 };
        tracing::info!(
            "processed {} trades | {} bars emitted | {:.0} trades/sec",
            total_trades,
            total_bars,
            rate
        );

        if (trades.len() as u32) < TRADE_BATCH {
            break;
        }
    }

    if !shutdown.should_stop() {
        if let Some(final_bar) = builder.flush()? {
            storage.insert_bars(std::slice::from_ref(&final_bar)).await?;
            total_bars += 1;
        }
    }

    tracing::info!(
        "bar construction complete: {} {} bars from {} trades in {}",
        total_bars,
        bar_type,
        total_trades,
        format_eta(start_time.elapsed().as_secs_f64())
    );
    metrics::record_bars_emitted(&bar_type, pair, total_bars);
    Ok(total_bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_bars::TickBarBuilder;
    use arcana_common::{Side, Trade};
    use arcana_storage::DuckDbStorage;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn trade(id: &str, secs: i64, price: rust_decimal::Decimal) -> Trade {
        Trade::new(
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            id,
            "coinbase",
            "ETH-USD",
            price,
            dec!(1),
            Side::Buy,
        )
        .unwrap()
    }

    fn new_builder() -> TickBarBuilder {
        TickBarBuilder::new(4, "coinbase", "ETH-USD").unwrap()
    }

    #[tokio::test]
    async fn build_bars_is_idempotent_without_rebuild() {
        let storage = DuckDbStorage::in_memory().await.unwrap();
        let trades: Vec<Trade> = (0..8).map(|i| trade(&i.to_string(), i, dec!(100))).collect();
        storage.insert_trades(&trades).await.unwrap();

        let shutdown = ShutdownToken::new();
        let mut builder = new_builder();
        let first_count = build_bars(&mut builder, &storage, "ETH-USD", "coinbase", false, &shutdown)
            .await
            .unwrap();
        assert_eq!(first_count, 2);

        let mut builder2 = new_builder();
        let second_count = build_bars(&mut builder2, &storage, "ETH-USD", "coinbase", false, &shutdown)
            .await
            .unwrap();
        assert_eq!(second_count, 0);
    }

    #[tokio::test]
    async fn rebuild_clears_existing_bars_first() {
        let storage = DuckDbStorage::in_memory().await.unwrap();
        let trades: Vec<Trade> = (0..4).map(|i| trade(&i.to_string(), i, dec!(100))).collect();
        storage.insert_trades(&trades).await.unwrap();

        let shutdown = ShutdownToken::new();
        let mut builder = new_builder();
        build_bars(&mut builder, &storage, "ETH-USD", "coinbase", false, &shutdown)
            .await
            .unwrap();

        let mut builder2 = new_builder();
        let rebuilt = build_bars(&mut builder2, &storage, "ETH-USD", "coinbase", true, &shutdown)
            .await
            .unwrap();
        assert_eq!(rebuilt, 1);
    }
}
