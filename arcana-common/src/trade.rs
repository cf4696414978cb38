//! The trade record: an immutable print from a `DataSource`.

use crate::error::{ArcanaError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side of the book initiated a trade, as reported by the source.
/// `Unknown` triggers the tick-rule fallback in the information-driven
/// builders (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
    Unknown,
}

/// A single executed trade print.
///
/// Construction validates the universal invariants (`price > 0`, `size > 0`,
/// `timestamp` not in the future); builders and storage never see an
/// invalid `Trade`. `(source, trade_id)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub trade_id: String,
    pub source: String,
    pub pair: String,
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
}

impl Trade {
    pub fn new(
        timestamp: DateTime<Utc>,
        trade_id: impl Into<String>,
        source: impl Into<String>,
        pair: impl Into<String>,
        price: Decimal,
        size: Decimal,
        side: Side,
    ) -> Result<Self> {
        if price <= Decimal::ZERO {
            return Err(ArcanaError::invariant(format!(
                "trade price must be positive, got {price}"
            )));
        }
        if size <= Decimal::ZERO {
            return Err(ArcanaError::invariant(format!(
                "trade size must be positive, got {size}"
            )));
        }
        if timestamp > Utc::now() {
            return Err(ArcanaError::invariant(
                "trade timestamp is in the future".to_string(),
            ));
        }

        Ok(Self {
            timestamp,
            trade_id: trade_id.into(),
            source: source.into(),
            pair: pair.into(),
            price,
            size,
            side,
        })
    }

    /// `price * size`.
    pub fn dollar_volume(&self) -> Decimal {
        self.price * self.size
    }

    /// `+1` for a buy, `-1` for a sell, `0` when the side is unknown — the
    /// resolution of `0` into a direction is the tick rule's job, not this
    /// method's.
    pub fn sign(&self) -> i8 {
        match self.side {
            Side::Buy => 1,
            Side::Sell => -1,
            Side::Unknown => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ts() -> DateTime<Utc> {
        Utc::now() - chrono::Duration::seconds(1)
    }

    #[test]
    fn rejects_nonpositive_price() {
        let err = Trade::new(ts(), "1", "coinbase", "ETH-USD", dec!(0), dec!(1), Side::Buy);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_nonpositive_size() {
        let err = Trade::new(ts(), "1", "coinbase", "ETH-USD", dec!(100), dec!(0), Side::Buy);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_future_timestamp() {
        let future = Utc::now() + chrono::Duration::seconds(3600);
        let err = Trade::new(future, "1", "coinbase", "ETH-USD", dec!(100), dec!(1), Side::Buy);
        assert!(err.is_err());
    }

    #[test]
    fn sign_matches_side() {
        let buy = Trade::new(ts(), "1", "coinbase", "ETH-USD", dec!(100), dec!(1), Side::Buy).unwrap();
        let sell = Trade::new(ts(), "2", "coinbase", "ETH-USD", dec!(100), dec!(1), Side::Sell).unwrap();
        let unknown =
            Trade::new(ts(), "3", "coinbase", "ETH-USD", dec!(100), dec!(1), Side::Unknown).unwrap();
        assert_eq!(buy.sign(), 1);
        assert_eq!(sell.sign(), -1);
        assert_eq!(unknown.sign(), 0);
    }

    #[test]
    fn dollar_volume_is_price_times_size() {
        let t = Trade::new(ts(), "1", "coinbase", "ETH-USD", dec!(100), dec!(2.5), Side::Buy).unwrap();
        assert_eq!(t.dollar_volume(), dec!(250.0));
    }
}
