use arcana_common::{Bar, Side, Trade};
use arcana_storage::{DuckDbStorage, Storage, TradeCursor};
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;

fn trade(id: &str, secs: i64, price: rust_decimal::Decimal, side: Side) -> Trade {
    Trade::new(
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        id,
        "coinbase",
        "ETH-USD",
        price,
        dec!(1),
        side,
    )
    .unwrap()
}

fn bar(bar_type: &str, start_secs: i64) -> Bar {
    let start = Utc.timestamp_opt(1_700_000_000 + start_secs, 0).unwrap();
    Bar {
        time_start: start,
        time_end: start + chrono::Duration::seconds(1),
        bar_type: bar_type.to_string(),
        source: "coinbase".to_string(),
        pair: "ETH-USD".to_string(),
        open: dec!(100),
        high: dec!(110),
        low: dec!(90),
        close: dec!(105),
        vwap: dec!(104.5),
        volume: dec!(5),
        dollar_volume: dec!(522.5),
        tick_count: 4,
        metadata: None,
    }
}

#[tokio::test]
async fn insert_trades_is_idempotent_on_source_trade_id() {
    let storage = DuckDbStorage::in_memory().await.unwrap();
    let trades = vec![
        trade("1", 0, dec!(100), Side::Buy),
        trade("2", 1, dec!(101), Side::Sell),
    ];

    let first_pass = storage.insert_trades(&trades).await.unwrap();
    assert_eq!(first_pass, 2);

    // re-ingesting the same window (a backfill re-run) inserts nothing new.
    let second_pass = storage.insert_trades(&trades).await.unwrap();
    assert_eq!(second_pass, 0);

    let stats = storage.trade_stats("ETH-USD", "coinbase").await.unwrap().unwrap();
    assert_eq!(stats.trade_count, 2);
}

#[tokio::test]
async fn scan_trades_paginates_by_composite_cursor() {
    let storage = DuckDbStorage::in_memory().await.unwrap();
    let trades: Vec<Trade> = (0..5)
        .map(|i| trade(&i.to_string(), i, dec!(100), Side::Buy))
        .collect();
    storage.insert_trades(&trades).await.unwrap();

    let first_page = storage
        .scan_trades("ETH-USD", "coinbase", None, 2)
        .await
        .unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(first_page[0].trade_id, "0");
    assert_eq!(first_page[1].trade_id, "1");

    let cursor = TradeCursor {
        timestamp: first_page[1].timestamp,
        trade_id: Some(&first_page[1].trade_id),
    };
    let second_page = storage
        .scan_trades("ETH-USD", "coinbase", Some(cursor), 2)
        .await
        .unwrap();
    assert_eq!(second_page.len(), 2);
    assert_eq!(second_page[0].trade_id, "2");
    assert_eq!(second_page[1].trade_id, "3");
}

#[tokio::test]
async fn first_and_last_timestamp_track_stored_range() {
    let storage = DuckDbStorage::in_memory().await.unwrap();
    storage
        .insert_trades(&[
            trade("1", 0, dec!(100), Side::Buy),
            trade("2", 100, dec!(101), Side::Sell),
        ])
        .await
        .unwrap();

    let first = storage
        .first_trade_timestamp("ETH-USD", "coinbase")
        .await
        .unwrap()
        .unwrap();
    let last = storage
        .last_trade_timestamp("ETH-USD", "coinbase", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((last - first).num_seconds(), 100);

    let bounded = storage
        .last_trade_timestamp("ETH-USD", "coinbase", Some(first))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bounded, first);
}

#[tokio::test]
async fn unknown_pair_has_no_stats() {
    let storage = DuckDbStorage::in_memory().await.unwrap();
    assert!(storage
        .trade_stats("BTC-USD", "coinbase")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn bars_are_isolated_per_bar_type_table() {
    let storage = DuckDbStorage::in_memory().await.unwrap();
    storage.insert_bars(&[bar("tick_500", 0)]).await.unwrap();
    storage.insert_bars(&[bar("time_5m", 0)]).await.unwrap();

    let tick_last = storage.last_bar("tick_500", "ETH-USD").await.unwrap().unwrap();
    assert_eq!(tick_last.bar_type, "tick_500");
    let time_last = storage.last_bar("time_5m", "ETH-USD").await.unwrap().unwrap();
    assert_eq!(time_last.bar_type, "time_5m");

    assert!(storage.last_bar("dollar_200000", "ETH-USD").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_bars_since_clears_resumed_window() {
    let storage = DuckDbStorage::in_memory().await.unwrap();
    storage
        .insert_bars(&[bar("tick_500", 0), bar("tick_500", 10), bar("tick_500", 20)])
        .await
        .unwrap();

    let cutoff = Utc.timestamp_opt(1_700_000_000 + 10, 0).unwrap();
    storage
        .delete_bars_since("tick_500", "ETH-USD", cutoff)
        .await
        .unwrap();

    let last = storage.last_bar("tick_500", "ETH-USD").await.unwrap().unwrap();
    assert_eq!(last.time_start, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
}

#[tokio::test]
async fn table_name_rejects_malformed_identifiers() {
    let storage = DuckDbStorage::in_memory().await.unwrap();
    let mut malformed = bar("tick_500", 0);
    malformed.pair = "DROP TABLE raw_trades;--".to_string();
    assert!(storage.insert_bars(&[malformed]).await.is_err());
}
