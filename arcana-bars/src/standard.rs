//! Fixed-threshold sampling: tick-count, volume, dollar-volume and
//! wall-clock time bars (spec §4.2).

use crate::builder::BarBuilder;
use arcana_common::{Accumulator, ArcanaError, Bar, Result, Trade};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

/// Emits when `tick_count >= threshold` after the current trade.
pub struct TickBarBuilder {
    threshold: u64,
    bar_type: String,
    source: String,
    pair: String,
    acc: Accumulator,
}

impl TickBarBuilder {
    pub fn new(threshold: u64, source: impl Into<String>, pair: impl Into<String>) -> Result<Self> {
        if threshold == 0 {
            return Err(ArcanaError::configuration("tick threshold must be positive"));
        }
        Ok(Self {
            threshold,
            bar_type: format!("tick_{threshold}"),
            source: source.into(),
            pair: pair.into(),
            acc: Accumulator::new(),
        })
    }
}

impl BarBuilder for TickBarBuilder {
    fn bar_type(&self) -> &str {
        &self.bar_type
    }

    fn process_trade(&mut self, trade: &Trade) -> Result<Option<Bar>> {
        self.acc.add(trade);
        if self.acc.tick_count() >= self.threshold {
            let bar = self.acc.to_bar(&self.bar_type, &self.source, &self.pair, None)?;
            self.acc = Accumulator::new();
            return Ok(Some(bar));
        }
        Ok(None)
    }

    fn flush(&mut self) -> Result<Option<Bar>> {
        if self.acc.tick_count() == 0 {
            return Ok(None);
        }
        let bar = self.acc.to_bar(&self.bar_type, &self.source, &self.pair, None)?;
        self.acc = Accumulator::new();
        Ok(Some(bar))
    }
}

/// Emits when running `Σ size >= threshold`.
pub struct VolumeBarBuilder {
    threshold: Decimal,
    bar_type: String,
    source: String,
    pair: String,
    acc: Accumulator,
}

impl VolumeBarBuilder {
    pub fn new(threshold: Decimal, source: impl Into<String>, pair: impl Into<String>) -> Result<Self> {
        if threshold <= Decimal::ZERO {
            return Err(ArcanaError::configuration("volume threshold must be positive"));
        }
        Ok(Self {
            threshold,
            bar_type: format!("volume_{threshold}"),
            source: source.into(),
            pair: pair.into(),
            acc: Accumulator::new(),
        })
    }
}

impl BarBuilder for VolumeBarBuilder {
    fn bar_type(&self) -> &str {
        &self.bar_type
    }

    fn process_trade(&mut self, trade: &Trade) -> Result<Option<Bar>> {
        self.acc.add(trade);
        if self.acc.volume() >= self.threshold {
            let bar = self.acc.to_bar(&self.bar_type, &self.source, &self.pair, None)?;
            self.acc = Accumulator::new();
            return Ok(Some(bar));
        }
        Ok(None)
    }

    fn flush(&mut self) -> Result<Option<Bar>> {
        if self.acc.tick_count() == 0 {
            return Ok(None);
        }
        let bar = self.acc.to_bar(&self.bar_type, &self.source, &self.pair, None)?;
        self.acc = Accumulator::new();
        Ok(Some(bar))
    }
}

/// Emits when running `Σ price·size >= threshold`.
pub struct DollarBarBuilder {
    threshold: Decimal,
    bar_type: String,
    source: String,
    pair: String,
    acc: Accumulator,
}

impl DollarBarBuilder {
    pub fn new(threshold: Decimal, source: impl Into<String>, pair: impl Into<String>) -> Result<Self> {
        if threshold <= Decimal::ZERO {
            return Err(ArcanaError::configuration("dollar threshold must be positive"));
        }
        Ok(Self {
            threshold,
            bar_type: format!("dollar_{threshold}"),
            source: source.into(),
            pair: pair.into(),
            acc: Accumulator::new(),
        })
    }
}

impl BarBuilder for DollarBarBuilder {
    fn bar_type(&self) -> &str {
        &self.bar_type
    }

    fn process_trade(&mut self, trade: &Trade) -> Result<Option<Bar>> {
        self.acc.add(trade);
        if self.acc.dollar_volume() >= self.threshold {
            let bar = self.acc.to_bar(&self.bar_type, &self.source, &self.pair, None)?;
            self.acc = Accumulator::new();
            return Ok(Some(bar));
        }
        Ok(None)
    }

    fn flush(&mut self) -> Result<Option<Bar>> {
        if self.acc.tick_count() == 0 {
            return Ok(None);
        }
        let bar = self.acc.to_bar(&self.bar_type, &self.source, &self.pair, None)?;
        self.acc = Accumulator::new();
        Ok(Some(bar))
    }
}

/// Epoch-aligned wall-clock buckets: the bucket containing timestamp `t` is
/// `[floor(t/I)*I, floor(t/I)*I + I)`, in Unix epoch seconds — aligned to
/// the epoch, not the first trade.
pub struct TimeBarBuilder {
    interval_secs: i64,
    bar_type: String,
    source: String,
    pair: String,
    acc: Accumulator,
    current_bucket_end: Option<DateTime<Utc>>,
}

impl TimeBarBuilder {
    pub fn new(
        interval: chrono::Duration,
        label: impl Into<String>,
        source: impl Into<String>,
        pair: impl Into<String>,
    ) -> Result<Self> {
        let interval_secs = interval.num_seconds();
        if interval_secs <= 0 {
            return Err(ArcanaError::configuration("time bar interval must be positive"));
        }
        Ok(Self {
            interval_secs,
            bar_type: format!("time_{}", label.into()),
            source: source.into(),
            pair: pair.into(),
            acc: Accumulator::new(),
            current_bucket_end: None,
        })
    }

    fn bucket_end(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let epoch_secs = ts.timestamp();
        let bucket_start = epoch_secs.div_euclid(self.interval_secs) * self.interval_secs;
        Utc.timestamp_opt(bucket_start + self.interval_secs, 0).unwrap()
    }

    fn emit_if_nonempty(&mut self) -> Result<Option<Bar>> {
        if self.acc.tick_count() == 0 {
            return Ok(None);
        }
        let bar = self.acc.to_bar(&self.bar_type, &self.source, &self.pair, None)?;
        self.acc = Accumulator::new();
        Ok(Some(bar))
    }
}

impl BarBuilder for TimeBarBuilder {
    fn bar_type(&self) -> &str {
        &self.bar_type
    }

    fn process_trade(&mut self, trade: &Trade) -> Result<Option<Bar>> {
        let bucket_end = self.bucket_end(trade.timestamp);

        if self.current_bucket_end.is_none() {
            self.current_bucket_end = Some(bucket_end);
            self.acc.add(trade);
            return Ok(None);
        }

        if self.current_bucket_end != Some(bucket_end) {
            let emitted = self.emit_if_nonempty()?;
            self.current_bucket_end = Some(bucket_end);
            self.acc.add(trade);
            return Ok(emitted);
        }

        self.acc.add(trade);
        Ok(None)
    }

    fn flush(&mut self) -> Result<Option<Bar>> {
        self.emit_if_nonempty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_common::Side;
    use rust_decimal_macros::dec;

    fn trade_at(ts: DateTime<Utc>, price: Decimal, size: Decimal, id: u64) -> Trade {
        Trade::new(ts, id.to_string(), "coinbase", "ETH-USD", price, size, Side::Buy).unwrap()
    }

    #[test]
    fn scenario_tick_bar_ohlcv() {
        let base = Utc::now() - chrono::Duration::seconds(10);
        let mut builder = TickBarBuilder::new(4, "coinbase", "ETH-USD").unwrap();
        let trades = [
            trade_at(base, dec!(100), dec!(1), 0),
            trade_at(base + chrono::Duration::seconds(1), dec!(110), dec!(2), 1),
            trade_at(base + chrono::Duration::seconds(2), dec!(90), dec!(0.5), 2),
            trade_at(base + chrono::Duration::seconds(3), dec!(105), dec!(1.5), 3),
        ];
        let bars = builder.process_trades(&trades).unwrap();
        assert_eq!(bars.len(), 1);
        let bar = &bars[0];
        assert_eq!(bar.open, dec!(100));
        assert_eq!(bar.high, dec!(110));
        assert_eq!(bar.low, dec!(90));
        assert_eq!(bar.close, dec!(105));
        assert_eq!(bar.volume, dec!(5.0));
        assert_eq!(bar.dollar_volume, dec!(522.50));
        assert_eq!(bar.tick_count, 4);
        assert_eq!(bar.time_span(), chrono::Duration::seconds(3));
    }

    #[test]
    fn scenario_dollar_bar_threshold_crossing() {
        let base = Utc::now() - chrono::Duration::seconds(10);
        let mut builder = DollarBarBuilder::new(dec!(500), "coinbase", "ETH-USD").unwrap();
        let trades = [
            trade_at(base, dec!(100), dec!(2.0), 0),
            trade_at(base + chrono::Duration::seconds(1), dec!(100), dec!(1.5), 1),
            trade_at(base + chrono::Duration::seconds(2), dec!(100), dec!(2.0), 2),
        ];
        let bars = builder.process_trades(&trades).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].dollar_volume, dec!(550.0));
    }

    #[test]
    fn scenario_time_bar_bucket_alignment() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 14, 0, 0).unwrap();
        let mut builder = TimeBarBuilder::new(
            chrono::Duration::minutes(5),
            "5m",
            "coinbase",
            "ETH-USD",
        )
        .unwrap();

        let mut emitted = None;
        for (offset, id) in [(0, 0), (60, 1), (120, 2), (300, 3)] {
            let trade = trade_at(base + chrono::Duration::seconds(offset), dec!(100), dec!(1), id);
            let bar = builder.process_trade(&trade).unwrap();
            if offset == 300 {
                emitted = bar;
            } else {
                assert!(bar.is_none());
            }
        }
        let bar = emitted.expect("fourth trade should emit the first bucket's bar");
        assert_eq!(bar.tick_count, 3);

        let partial = builder.flush().unwrap().expect("final bucket has one trade");
        assert_eq!(partial.tick_count, 1);
    }

    #[test]
    fn empty_bucket_produces_no_bar() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 14, 0, 0).unwrap();
        let mut builder =
            TimeBarBuilder::new(chrono::Duration::minutes(5), "5m", "coinbase", "ETH-USD").unwrap();
        assert!(builder.flush().unwrap().is_none());
        let _ = base;
    }
}
