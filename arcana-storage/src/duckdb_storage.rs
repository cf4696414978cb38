//! A `duckdb` + `r2d2`-backed [`Storage`] implementation, following the
//! pooling and string-round-trip idioms of `database::DatabaseManager`
//! exactly (no `spawn_blocking`: these `async fn`s call the synchronous
//! DuckDB driver directly, matching the teacher's own style).

use crate::contract::{Storage, TradeCursor, TradeStats};
use arcana_common::{ArcanaError, Bar, BarMetadata, Result, Side, Trade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{Config, Connection};
use r2d2::Pool;
use regex::Regex;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

pub struct ConnectionManager {
    path: PathBuf,
}

impl ConnectionManager {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl r2d2::ManageConnection for ConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = Config::default()
            .access_mode(duckdb::AccessMode::ReadWrite)?
            .enable_object_cache(true)?;
        Connection::open_with_flags(&self.path, config)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.execute_batch("SELECT 1")
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

fn storage_err(e: impl std::fmt::Display) -> ArcanaError {
    ArcanaError::storage(e.to_string())
}

/// A DuckDB-backed `Storage`. Owns a connection pool over a single database
/// file (or `:memory:`), matching `database::DatabaseManager`'s shape.
pub struct DuckDbStorage {
    pool: Arc<Pool<ConnectionManager>>,
}

impl DuckDbStorage {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let manager = ConnectionManager::new(path);
        let pool = Pool::builder()
            .max_size(10)
            .min_idle(Some(1))
            .build(manager)
            .map_err(storage_err)?;
        let storage = Self { pool: Arc::new(pool) };
        storage.initialize_trades_table()?;
        Ok(storage)
    }

    /// Opens an in-memory database, for tests and scratch tooling.
    pub async fn in_memory() -> Result<Self> {
        Self::new(":memory:").await
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<ConnectionManager>> {
        self.pool.get().map_err(storage_err)
    }

    fn initialize_trades_table(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS raw_trades (
                timestamp VARCHAR NOT NULL,
                trade_id VARCHAR NOT NULL,
                source VARCHAR NOT NULL,
                pair VARCHAR NOT NULL,
                price VARCHAR NOT NULL,
                size VARCHAR NOT NULL,
                side VARCHAR NOT NULL,
                PRIMARY KEY (source, trade_id)
            );
            CREATE INDEX IF NOT EXISTS idx_raw_trades_pair_source_ts
                ON raw_trades(pair, source, timestamp, trade_id);",
        )
        .map_err(storage_err)
    }

    /// Derives the table name for a `(bar_type, pair)` pair, rejecting
    /// anything that isn't a well-formed bar-type/pair label — the only
    /// defense against identifier injection into dynamically-built DDL/DML,
    /// since DuckDB (like most engines) has no bind-parameter support for
    /// table names.
    fn table_name(bar_type: &str, pair: &str) -> Result<String> {
        let bar_type_re = Regex::new(r"^[a-z0-9_.]+$").unwrap();
        let pair_re = Regex::new(r"^[A-Za-z0-9]+-[A-Za-z0-9]+$").unwrap();
        if !bar_type_re.is_match(bar_type) {
            return Err(ArcanaError::invariant(format!(
                "refusing to derive a table name from bar_type '{bar_type}'"
            )));
        }
        if !pair_re.is_match(pair) {
            return Err(ArcanaError::invariant(format!(
                "refusing to derive a table name from pair '{pair}'"
            )));
        }
        Ok(format!(
            "bars_{}_{}",
            bar_type.replace('.', "_"),
            pair.to_lowercase().replace('-', "_")
        ))
    }

    fn ensure_bar_table(&self, table: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                time_start VARCHAR NOT NULL,
                time_end VARCHAR NOT NULL,
                bar_type VARCHAR NOT NULL,
                source VARCHAR NOT NULL,
                pair VARCHAR NOT NULL,
                open VARCHAR NOT NULL,
                high VARCHAR NOT NULL,
                low VARCHAR NOT NULL,
                close VARCHAR NOT NULL,
                vwap VARCHAR NOT NULL,
                volume VARCHAR NOT NULL,
                dollar_volume VARCHAR NOT NULL,
                tick_count BIGINT NOT NULL,
                metadata VARCHAR
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_time_start ON {table}(time_start);"
        ))
        .map_err(storage_err)
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?")
            .map_err(storage_err)?;
        let count: i64 = stmt.query_row([table], |row| row.get(0)).map_err(storage_err)?;
        Ok(count > 0)
    }

    fn row_to_trade(
        timestamp: String,
        trade_id: String,
        source: String,
        pair: String,
        price: String,
        size: String,
        side: String,
    ) -> Result<Trade> {
        let timestamp: DateTime<Utc> = timestamp.parse().map_err(storage_err)?;
        let price = Decimal::from_str(&price).map_err(storage_err)?;
        let size = Decimal::from_str(&size).map_err(storage_err)?;
        let side = match side.as_str() {
            "buy" => Side::Buy,
            "sell" => Side::Sell,
            _ => Side::Unknown,
        };
        Trade::new(timestamp, trade_id, source, pair, price, size, side)
    }

    fn row_to_bar(
        time_start: String,
        time_end: String,
        bar_type: String,
        source: String,
        pair: String,
        open: String,
        high: String,
        low: String,
        close: String,
        vwap: String,
        volume: String,
        dollar_volume: String,
        tick_count: u64,
        metadata: Option<String>,
    ) -> Result<Bar> {
        let metadata: Option<BarMetadata> = metadata.map(|m| serde_json::from_str(&m)).transpose()?;
        let bar = Bar {
            time_start: time_start.parse().map_err(storage_err)?,
            time_end: time_end.parse().map_err(storage_err)?,
            bar_type,
            source,
            pair,
            open: Decimal::from_str(&open).map_err(storage_err)?,
            high: Decimal::from_str(&high).map_err(storage_err)?,
            low: Decimal::from_str(&low).map_err(storage_err)?,
            close: Decimal::from_str(&close).map_err(storage_err)?,
            vwap: Decimal::from_str(&vwap).map_err(storage_err)?,
            volume: Decimal::from_str(&volume).map_err(storage_err)?,
            dollar_volume: Decimal::from_str(&dollar_volume).map_err(storage_err)?,
            tick_count,
            metadata,
        };
        bar.validate()?;
        Ok(bar)
    }

    fn side_str(side: Side) -> &'static str {
        match side {
            Side::Buy => "buy",
            Side::Sell => "sell",
            Side::Unknown => "unknown",
        }
    }
}

#[async_trait]
impl Storage for DuckDbStorage {
    async fn insert_trades(&self, trades: &[Trade]) -> Result<u64> {
        if trades.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage_err)?;
        let mut inserted = 0u64;
        for trade in trades {
            let changed = tx
                .execute(
                    "INSERT INTO raw_trades (timestamp, trade_id, source, pair, price, size, side)
                     VALUES (?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT (source, trade_id) DO NOTHING",
                    duckdb::params![
                        trade.timestamp.to_rfc3339(),
                        trade.trade_id,
                        trade.source,
                        trade.pair,
                        trade.price.to_string(),
                        trade.size.to_string(),
                        Self::side_str(trade.side),
                    ],
                )
                .map_err(storage_err)?;
            inserted += changed as u64;
        }
        tx.commit().map_err(storage_err)?;
        Ok(inserted)
    }

    async fn first_trade_timestamp(&self, pair: &str, source: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT MIN(timestamp) FROM raw_trades WHERE pair = ? AND source = ?")
            .map_err(storage_err)?;
        let ts: Option<String> = stmt
            .query_row(duckdb::params![pair, source], |row| row.get(0))
            .map_err(storage_err)?;
        ts.map(|s| s.parse().map_err(storage_err)).transpose()
    }

    async fn last_trade_timestamp(
        &self,
        pair: &str,
        source: &str,
        before: Option<DateTime<Utc>>,
    ) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let ts: Option<String> = match before {
            Some(before) => {
                let mut stmt = conn
                    .prepare(
                        "SELECT MAX(timestamp) FROM raw_trades
                         WHERE pair = ? AND source = ? AND timestamp <= ?",
                    )
                    .map_err(storage_err)?;
                stmt.query_row(duckdb::params![pair, source, before.to_rfc3339()], |row| row.get(0))
                    .map_err(storage_err)?
            }
            None => {
                let mut stmt = conn
                    .prepare("SELECT MAX(timestamp) FROM raw_trades WHERE pair = ? AND source = ?")
                    .map_err(storage_err)?;
                stmt.query_row(duckdb::params![pair, source], |row| row.get(0))
                    .map_err(storage_err)?
            }
        };
        ts.map(|s| s.parse().map_err(storage_err)).transpose()
    }

    async fn scan_trades(
        &self,
        pair: &str,
        source: &str,
        cursor: Option<TradeCursor<'_>>,
        limit: u32,
    ) -> Result<Vec<Trade>> {
        let conn = self.conn()?;
        // LIMIT is interpolated (not bound) following `QueryBuilder`'s style in
        // `database/src/query.rs`; it is always a trusted `u32`, never user text.
        let rows = match cursor {
            Some(TradeCursor { timestamp, trade_id: Some(trade_id) }) => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT timestamp, trade_id, source, pair, price, size, side FROM raw_trades
                         WHERE pair = ? AND source = ?
                           AND (timestamp > ? OR (timestamp = ? AND trade_id > ?))
                         ORDER BY timestamp, trade_id
                         LIMIT {limit}"
                    ))
                    .map_err(storage_err)?;
                let ts = timestamp.to_rfc3339();
                let mut collected = Vec::new();
                let result = stmt
                    .query_map(duckdb::params![pair, source, ts, ts, trade_id], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, String>(6)?,
                        ))
                    })
                    .map_err(storage_err)?;
                for row in result {
                    collected.push(row.map_err(storage_err)?);
                }
                collected
            }
            Some(TradeCursor { timestamp, trade_id: None }) => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT timestamp, trade_id, source, pair, price, size, side FROM raw_trades
                         WHERE pair = ? AND source = ? AND timestamp > ?
                         ORDER BY timestamp, trade_id
                         LIMIT {limit}"
                    ))
                    .map_err(storage_err)?;
                let ts = timestamp.to_rfc3339();
                let mut collected = Vec::new();
                let result = stmt
                    .query_map(duckdb::params![pair, source, ts], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, String>(6)?,
                        ))
                    })
                    .map_err(storage_err)?;
                for row in result {
                    collected.push(row.map_err(storage_err)?);
                }
                collected
            }
            None => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT timestamp, trade_id, source, pair, price, size, side FROM raw_trades
                         WHERE pair = ? AND source = ?
                         ORDER BY timestamp, trade_id
                         LIMIT {limit}"
                    ))
                    .map_err(storage_err)?;
                let mut collected = Vec::new();
                let result = stmt
                    .query_map(duckdb::params![pair, source], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, String>(6)?,
                        ))
                    })
                    .map_err(storage_err)?;
                for row in result {
                    collected.push(row.map_err(storage_err)?);
                }
                collected
            }
        };

        rows.into_iter()
            .map(|(timestamp, trade_id, source, pair, price, size, side)| {
                Self::row_to_trade(timestamp, trade_id, source, pair, price, size, side)
            })
            .collect()
    }

    async fn trade_stats(&self, pair: &str, source: &str) -> Result<Option<TradeStats>> {
        let mut trade_count = 0u64;
        let mut sum_size = Decimal::ZERO;
        let mut sum_dollar_volume = Decimal::ZERO;
        let mut buy_count = 0u64;
        let mut first_timestamp = None;
        let mut last_timestamp = None;
        let mut owned_cursor: Option<(DateTime<Utc>, String)> = None;
        const BATCH: u32 = 10_000;

        loop {
            let cursor = owned_cursor.as_ref().map(|(timestamp, trade_id)| TradeCursor {
                timestamp: *timestamp,
                trade_id: Some(trade_id.as_str()),
            });
            let batch = self.scan_trades(pair, source, cursor, BATCH).await?;
            if batch.is_empty() {
                break;
            }
            for trade in &batch {
                trade_count += 1;
                sum_size += trade.size;
                sum_dollar_volume += trade.dollar_volume();
                if trade.side == Side::Buy {
                    buy_count += 1;
                }
                if first_timestamp.is_none() {
                    first_timestamp = Some(trade.timestamp);
                }
                last_timestamp = Some(trade.timestamp);
            }
            let tail = batch.last().unwrap();
            owned_cursor = Some((tail.timestamp, tail.trade_id.clone()));
            if (batch.len() as u32) < BATCH {
                break;
            }
        }

        match (first_timestamp, last_timestamp) {
            (Some(first_timestamp), Some(last_timestamp)) => Ok(Some(TradeStats {
                trade_count,
                sum_size,
                sum_dollar_volume,
                first_timestamp,
                last_timestamp,
                buy_count,
            })),
            _ => Ok(None),
        }
    }

    async fn insert_bars(&self, bars: &[Bar]) -> Result<()> {
        use std::collections::BTreeMap;

        let mut by_table: BTreeMap<String, Vec<&Bar>> = BTreeMap::new();
        for bar in bars {
            let table = Self::table_name(&bar.bar_type, &bar.pair)?;
            by_table.entry(table).or_default().push(bar);
        }

        for (table, bars) in by_table {
            self.ensure_bar_table(&table)?;
            let mut conn = self.conn()?;
            let tx = conn.transaction().map_err(storage_err)?;
            for bar in bars {
                let metadata_json = bar.metadata.as_ref().map(serde_json::to_string).transpose()?;
                tx.execute(
                    &format!(
                        "INSERT INTO {table} (time_start, time_end, bar_type, source, pair, open, high, low, \
                         close, vwap, volume, dollar_volume, tick_count, metadata)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                    ),
                    duckdb::params![
                        bar.time_start.to_rfc3339(),
                        bar.time_end.to_rfc3339(),
                        bar.bar_type,
                        bar.source,
                        bar.pair,
                        bar.open.to_string(),
                        bar.high.to_string(),
                        bar.low.to_string(),
                        bar.close.to_string(),
                        bar.vwap.to_string(),
                        bar.volume.to_string(),
                        bar.dollar_volume.to_string(),
                        bar.tick_count as i64,
                        metadata_json,
                    ],
                )
                .map_err(storage_err)?;
            }
            tx.commit().map_err(storage_err)?;
        }
        Ok(())
    }

    async fn last_bar(&self, bar_type: &str, pair: &str) -> Result<Option<Bar>> {
        let table = Self::table_name(bar_type, pair)?;
        if !self.table_exists(&table)? {
            return Ok(None);
        }
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT time_start, time_end, bar_type, source, pair, open, high, low, close, vwap, \
                 volume, dollar_volume, tick_count, metadata
                 FROM {table} ORDER BY time_start DESC LIMIT 1"
            ))
            .map_err(storage_err)?;
        let query_result = stmt.query_row([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, String>(10)?,
                row.get::<_, String>(11)?,
                row.get::<_, i64>(12)?,
                row.get::<_, Option<String>>(13)?,
            ))
        });

        let row = match query_result {
            Ok(row) => row,
            Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(storage_err(e)),
        };

        let (
            time_start,
            time_end,
            bar_type,
            source,
            pair,
            open,
            high,
            low,
            close,
            vwap,
            volume,
            dollar_volume,
            tick_count,
            metadata,
        ) = row;
        Self::row_to_bar(
            time_start,
            time_end,
            bar_type,
            source,
            pair,
            open,
            high,
            low,
            close,
            vwap,
            volume,
            dollar_volume,
            tick_count as u64,
            metadata,
        )
        .map(Some)
    }

    async fn delete_bars_since(&self, bar_type: &str, pair: &str, cutoff: DateTime<Utc>) -> Result<()> {
        let table = Self::table_name(bar_type, pair)?;
        if !self.table_exists(&table)? {
            return Ok(());
        }
        let conn = self.conn()?;
        conn.execute(
            &format!("DELETE FROM {table} WHERE time_start >= ?"),
            duckdb::params![cutoff.to_rfc3339()],
        )
        .map_err(storage_err)?;
        Ok(())
    }
}
