//! An in-memory `DataSource`, used in pipeline tests in place of a real
//! exchange HTTP client (spec §1 treats that client as out of scope).

use crate::source::DataSource;
use arcana_common::{ArcanaError, Result, Trade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

pub struct InMemoryDataSource {
    name: String,
    /// Trades per pair, kept sorted by `(timestamp, trade_id)`.
    trades: Mutex<BTreeMap<String, Vec<Trade>>>,
}

impl InMemoryDataSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trades: Mutex::new(BTreeMap::new()),
        }
    }

    /// Seeds the fixture with trades for a pair. Trades are sorted into
    /// `(timestamp, trade_id)` order, matching the ordering guarantee the
    /// real source's pagination is expected to uphold.
    pub fn seed(&self, pair: &str, mut trades: Vec<Trade>) {
        trades.sort_by(|a, b| (a.timestamp, &a.trade_id).cmp(&(b.timestamp, &b.trade_id)));
        self.trades.lock().unwrap().insert(pair.to_string(), trades);
    }
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_trades(
        &self,
        pair: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Trade>> {
        let trades = self.trades.lock().unwrap();
        let Some(for_pair) = trades.get(pair) else {
            return Ok(Vec::new());
        };
        Ok(for_pair
            .iter()
            .filter(|t| t.timestamp >= start && t.timestamp <= end)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_supported_pairs(&self) -> Result<Vec<String>> {
        Ok(self.trades.lock().unwrap().keys().cloned().collect())
    }
}

/// A `DataSource` that always fails, for exercising backfill/daemon error
/// handling (spec §4.7).
pub struct FailingDataSource {
    name: String,
}

impl FailingDataSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl DataSource for FailingDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_trades(
        &self,
        _pair: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _limit: u32,
    ) -> Result<Vec<Trade>> {
        Err(ArcanaError::source("simulated transport failure"))
    }

    async fn get_supported_pairs(&self) -> Result<Vec<String>> {
        Err(ArcanaError::source("simulated transport failure"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_common::Side;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn trade(id: &str, secs: i64) -> Trade {
        Trade::new(
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
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
    async fn fetch_trades_filters_by_window_and_limit() {
        let source = InMemoryDataSource::new("fixture");
        source.seed("ETH-USD", vec![trade("1", 0), trade("2", 10), trade("3", 20)]);

        let window = source
            .fetch_trades(
                "ETH-USD",
                Utc.timestamp_opt(1_700_000_005, 0).unwrap(),
                Utc.timestamp_opt(1_700_000_025, 0).unwrap(),
                10,
            )
            .await
            .unwrap();
        assert_eq!(window.len(), 2);

        let limited = source
            .fetch_trades(
                "ETH-USD",
                Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                Utc.timestamp_opt(1_700_000_025, 0).unwrap(),
                1,
            )
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].trade_id, "1");
    }

    #[tokio::test]
    async fn fetch_all_trades_paginates_to_completion() {
        let source = InMemoryDataSource::new("fixture");
        let trades: Vec<Trade> = (0..5).map(|i| trade(&i.to_string(), i * 10)).collect();
        source.seed("ETH-USD", trades);

        let all = source
            .fetch_all_trades(
                "ETH-USD",
                Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                Utc.timestamp_opt(1_700_000_040, 0).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn unseeded_pair_returns_empty() {
        let source = InMemoryDataSource::new("fixture");
        let result = source
            .fetch_trades(
                "BTC-USD",
                Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
                10,
            )
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
