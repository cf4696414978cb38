//! Running OHLCV state for one in-flight bar.

use crate::bar::Bar;
use crate::error::Result;
use crate::metadata::BarMetadata;
use crate::trade::Trade;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Mutable, lifetime bounded by one in-flight bar. Exclusively owned by a
/// single builder; never shared. Reset to a fresh value after every
/// emission (§3).
#[derive(Debug, Clone)]
pub struct Accumulator {
    open: Option<Decimal>,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    /// Σ size.
    volume: Decimal,
    /// Σ price·size.
    dollar_volume: Decimal,
    time_start: Option<DateTime<Utc>>,
    time_end: Option<DateTime<Utc>>,
    tick_count: u64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            open: None,
            high: Decimal::MIN,
            low: Decimal::MAX,
            close: Decimal::ZERO,
            volume: Decimal::ZERO,
            dollar_volume: Decimal::ZERO,
            time_start: None,
            time_end: None,
            tick_count: 0,
        }
    }
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn volume(&self) -> Decimal {
        self.volume
    }

    pub fn dollar_volume(&self) -> Decimal {
        self.dollar_volume
    }

    /// Folds one trade into the running state.
    pub fn add(&mut self, trade: &Trade) {
        if self.open.is_none() {
            self.open = Some(trade.price);
            self.high = trade.price;
            self.low = trade.price;
            self.time_start = Some(trade.timestamp);
        } else {
            self.high = self.high.max(trade.price);
            self.low = self.low.min(trade.price);
        }
        self.close = trade.price;
        self.volume += trade.size;
        self.dollar_volume += trade.dollar_volume();
        self.time_end = Some(trade.timestamp);
        self.tick_count += 1;
    }

    /// Assembles a `Bar` from the accumulated state. `vwap` falls back to
    /// the final trade price when `volume` totals to zero (degenerate but
    /// not reachable in practice since `Trade::size > 0`).
    pub fn to_bar(
        &self,
        bar_type: impl Into<String>,
        source: impl Into<String>,
        pair: impl Into<String>,
        metadata: Option<BarMetadata>,
    ) -> Result<Bar> {
        let vwap = if self.volume > Decimal::ZERO {
            self.dollar_volume / self.volume
        } else {
            self.close
        };

        let bar = Bar {
            time_start: self.time_start.expect("accumulator has at least one trade"),
            time_end: self.time_end.expect("accumulator has at least one trade"),
            bar_type: bar_type.into(),
            source: source.into(),
            pair: pair.into(),
            open: self.open.expect("accumulator has at least one trade"),
            high: self.high,
            low: self.low,
            close: self.close,
            vwap,
            volume: self.volume,
            dollar_volume: self.dollar_volume,
            tick_count: self.tick_count,
            metadata,
        };
        bar.validate()?;
        Ok(bar)
    }
}
