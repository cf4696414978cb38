//! The bar record: an immutable OHLCV summary emitted by a builder.

use crate::error::{ArcanaError, Result};
use crate::metadata::BarMetadata;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    /// e.g. `tick_500`, `tib_20`, `time_5m`.
    pub bar_type: String,
    pub source: String,
    pub pair: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub vwap: Decimal,
    /// Sum of trade sizes.
    pub volume: Decimal,
    /// Sum of `price * size`.
    pub dollar_volume: Decimal,
    pub tick_count: u64,
    pub metadata: Option<BarMetadata>,
}

impl Bar {
    /// `time_end - time_start`.
    pub fn time_span(&self) -> chrono::Duration {
        self.time_end - self.time_start
    }

    /// Checks the universal invariants from spec §3/§8. Called once, at
    /// construction, by every builder's emission path.
    pub fn validate(&self) -> Result<()> {
        if self.low > self.open || self.open > self.high {
            return Err(ArcanaError::invariant(format!(
                "bar {} violates low <= open <= high ({} <= {} <= {})",
                self.bar_type, self.low, self.open, self.high
            )));
        }
        if self.low > self.close || self.close > self.high {
            return Err(ArcanaError::invariant(format!(
                "bar {} violates low <= close <= high ({} <= {} <= {})",
                self.bar_type, self.low, self.close, self.high
            )));
        }
        if self.low > self.vwap || self.vwap > self.high {
            return Err(ArcanaError::invariant(format!(
                "bar {} violates low <= vwap <= high ({} <= {} <= {})",
                self.bar_type, self.low, self.vwap, self.high
            )));
        }
        if self.tick_count < 1 {
            return Err(ArcanaError::invariant(format!(
                "bar {} has tick_count {} < 1",
                self.bar_type, self.tick_count
            )));
        }
        if self.volume < Decimal::ZERO {
            return Err(ArcanaError::invariant(format!(
                "bar {} has negative volume {}",
                self.bar_type, self.volume
            )));
        }
        if self.dollar_volume < Decimal::ZERO {
            return Err(ArcanaError::invariant(format!(
                "bar {} has negative dollar_volume {}",
                self.bar_type, self.dollar_volume
            )));
        }
        if self.time_start > self.time_end {
            return Err(ArcanaError::invariant(format!(
                "bar {} has time_start after time_end",
                self.bar_type
            )));
        }
        Ok(())
    }
}
