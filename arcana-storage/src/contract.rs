//! The storage contract (spec §6): the one seam between the bar-building
//! core and whatever time-series engine actually holds the data. Anything
//! satisfying [`Storage`] can stand in for [`DuckDbStorage`](crate::DuckDbStorage).

use arcana_common::{Bar, Result, Trade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A cursor into the trade stream: `(timestamp, trade_id)`, matching the
/// composite ordering used to break ties among same-timestamp trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeCursor<'a> {
    pub timestamp: DateTime<Utc>,
    /// `None` means "resume strictly after `timestamp`, no tie-break" — used
    /// when resuming from a bar boundary rather than an actual trade row, so
    /// the trade that closed the previous bar isn't replayed a second time.
    pub trade_id: Option<&'a str>,
}

/// Aggregate statistics over a `(pair, source)`'s stored trades, used by the
/// calibrators (spec §4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct TradeStats {
    pub trade_count: u64,
    pub sum_size: Decimal,
    pub sum_dollar_volume: Decimal,
    pub first_timestamp: DateTime<Utc>,
    pub last_timestamp: DateTime<Utc>,
    pub buy_count: u64,
}

impl TradeStats {
    pub fn mean_size(&self) -> Decimal {
        if self.trade_count == 0 {
            Decimal::ZERO
        } else {
            self.sum_size / Decimal::from(self.trade_count)
        }
    }

    pub fn mean_dollar_volume(&self) -> Decimal {
        if self.trade_count == 0 {
            Decimal::ZERO
        } else {
            self.sum_dollar_volume / Decimal::from(self.trade_count)
        }
    }

    /// Fraction of trades tagged `Side::Buy` (ignores `Unknown`), used by the
    /// direction-bias heuristic called out in spec §9 Open Questions.
    pub fn buy_fraction(&self) -> f64 {
        if self.trade_count == 0 {
            0.0
        } else {
            self.buy_count as f64 / self.trade_count as f64
        }
    }

    /// Span between the first and last stored trade, in days (fractional).
    pub fn span_days(&self) -> f64 {
        (self.last_timestamp - self.first_timestamp).num_milliseconds() as f64
            / (1000.0 * 60.0 * 60.0 * 24.0)
    }
}

/// The storage contract: idempotent trade ingestion, a composite-cursor scan
/// for replay/bar-building, aggregate stats for calibration, and
/// lazily-created per-`(bar_type, pair)` bar tables (spec §6's redesign —
/// see `DESIGN.md` open question 3).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Inserts trades, skipping any whose `(source, trade_id)` already
    /// exists. Returns the number of rows actually inserted (may be less
    /// than `trades.len()` on a re-run over overlapping history — this is
    /// what makes backfill idempotent, spec §8 scenario 6).
    async fn insert_trades(&self, trades: &[Trade]) -> Result<u64>;

    /// Earliest stored trade timestamp for `(pair, source)`, or `None` if
    /// nothing has been ingested yet.
    async fn first_trade_timestamp(&self, pair: &str, source: &str) -> Result<Option<DateTime<Utc>>>;

    /// Latest stored trade timestamp for `(pair, source)` at or before
    /// `before` (or unconditionally, if `before` is `None`). Used to resume
    /// backfill and to bound the daemon's next fetch window.
    async fn last_trade_timestamp(
        &self,
        pair: &str,
        source: &str,
        before: Option<DateTime<Utc>>,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Scans trades for `(pair, source)` in `(timestamp, trade_id)` order,
    /// starting strictly after `cursor` (or from the beginning, if `None`),
    /// returning at most `limit` rows. This is the pagination primitive
    /// `build_bars` replays trades through.
    async fn scan_trades(
        &self,
        pair: &str,
        source: &str,
        cursor: Option<TradeCursor<'_>>,
        limit: u32,
    ) -> Result<Vec<Trade>>;

    /// Aggregate statistics over all stored trades for `(pair, source)`,
    /// feeding the four calibrators.
    async fn trade_stats(&self, pair: &str, source: &str) -> Result<Option<TradeStats>>;

    /// Inserts bars into the lazily-created table for `(bar_type, pair)`.
    /// Table name is derived and validated — see `DuckDbStorage::table_name`.
    async fn insert_bars(&self, bars: &[Bar]) -> Result<()>;

    /// Most recently emitted bar for `(bar_type, pair)`, used by
    /// `build_bars` to resume a builder's accumulator state via
    /// `BarBuilder::restore_state` rather than starting cold (spec §8
    /// scenario 7).
    async fn last_bar(&self, bar_type: &str, pair: &str) -> Result<Option<Bar>>;

    /// Deletes bars for `(bar_type, pair)` with `time_start >= cutoff`.
    /// `build_bars` calls this before replaying from `cutoff` so a resumed
    /// run never double-emits a partially-built bar left over from a prior
    /// crash.
    async fn delete_bars_since(&self, bar_type: &str, pair: &str, cutoff: DateTime<Utc>) -> Result<()>;
}
