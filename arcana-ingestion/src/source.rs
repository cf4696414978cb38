//! The `DataSource` contract (spec §6): the exchange HTTP client is an
//! external collaborator consumed only through this trait (spec §1) — the
//! core never talks to a concrete exchange directly.

use arcana_common::{Result, Trade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short identifier persisted with each trade (spec's `Trade::source`).
    fn name(&self) -> &str;

    /// A single request, which may return fewer than `limit` trades if the
    /// window is smaller than the exchange's page size. Callers needing
    /// complete coverage of a window use `fetch_all_trades` instead.
    async fn fetch_trades(
        &self,
        pair: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Trade>>;

    /// Complete coverage of `[start, end]`, via whatever pagination the
    /// source requires. The default implementation repeatedly calls
    /// `fetch_trades` and stops once a page returns fewer than `limit` rows.
    async fn fetch_all_trades(&self, pair: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Trade>> {
        const PAGE: u32 = 1000;
        let mut all = Vec::new();
        let mut cursor = start;
        loop {
            let page = self.fetch_trades(pair, cursor, end, PAGE).await?;
            let page_len = page.len();
            if let Some(last) = page.last() {
                cursor = last.timestamp + chrono::Duration::microseconds(1);
            }
            all.extend(page);
            if page_len < PAGE as usize || cursor > end {
                break;
            }
        }
        Ok(all)
    }

    async fn get_supported_pairs(&self) -> Result<Vec<String>>;
}
