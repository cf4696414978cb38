//! Imbalance bars: emit when the signed cumulative contribution crosses
//! an adaptive EWMA threshold (spec §4.3).

use crate::builder::BarBuilder;
use arcana_common::{tick_rule, Accumulator, Bar, BarMetadata, EwmaEstimator, Result, Trade};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Which scalar a trade contributes to the cumulative imbalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImbalanceKind {
    /// `tib_W`: contribution is `sign`.
    Tick,
    /// `vib_W`: contribution is `sign * size`.
    Volume,
    /// `dib_W`: contribution is `sign * price * size`.
    Dollar,
}

impl ImbalanceKind {
    fn label(self) -> &'static str {
        match self {
            Self::Tick => "tib",
            Self::Volume => "vib",
            Self::Dollar => "dib",
        }
    }

    fn contribution(self, sign: i8, trade: &Trade) -> f64 {
        let signed = sign as f64;
        match self {
            Self::Tick => signed,
            Self::Volume => signed * trade.size.to_f64().unwrap_or(0.0),
            Self::Dollar => signed * trade.dollar_volume().to_f64().unwrap_or(0.0),
        }
    }
}

/// Shared by `tib_W`, `vib_W`, `dib_W` — the three differ only in
/// [`ImbalanceKind::contribution`], mirroring the private-base-class-plus-
/// three-subclasses shape of the reference implementation without the
/// inheritance (Design Notes, spec §9).
pub struct ImbalanceBarBuilder {
    kind: ImbalanceKind,
    bar_type: String,
    source: String,
    pair: String,
    acc: Accumulator,
    ewma: EwmaEstimator,
    cum_imbalance: f64,
    prev_price: Option<Decimal>,
    prev_sign: i8,
}

impl ImbalanceBarBuilder {
    pub fn new(
        kind: ImbalanceKind,
        window: u32,
        initial_expected: f64,
        source: impl Into<String>,
        pair: impl Into<String>,
    ) -> Result<Self> {
        let ewma = EwmaEstimator::new(window, initial_expected)?;
        Ok(Self {
            kind,
            bar_type: format!("{}_{window}", kind.label()),
            source: source.into(),
            pair: pair.into(),
            acc: Accumulator::new(),
            ewma,
            cum_imbalance: 0.0,
            prev_price: None,
            prev_sign: 1,
        })
    }

    /// Resolves a trade's direction: the reported side if known, else the
    /// tick rule against the last observed price, else `+1` as the default
    /// for the very first trade when its side is unknown.
    fn resolve_sign(&mut self, trade: &Trade) -> i8 {
        let raw = trade.sign();
        let sign = if raw != 0 {
            raw
        } else {
            match self.prev_price {
                Some(prev) => tick_rule(trade.price, prev, self.prev_sign),
                None => 1,
            }
        };
        self.prev_sign = sign;
        self.prev_price = Some(trade.price);
        sign
    }

    fn emit(&mut self) -> Result<Bar> {
        self.ewma.update(self.cum_imbalance.abs());
        let metadata = Some(self.ewma.to_metadata());
        let bar = self.acc.to_bar(&self.bar_type, &self.source, &self.pair, metadata)?;
        self.acc = Accumulator::new();
        self.cum_imbalance = 0.0;
        Ok(bar)
    }
}

impl BarBuilder for ImbalanceBarBuilder {
    fn bar_type(&self) -> &str {
        &self.bar_type
    }

    fn process_trade(&mut self, trade: &Trade) -> Result<Option<Bar>> {
        let sign = self.resolve_sign(trade);
        self.acc.add(trade);
        self.cum_imbalance += self.kind.contribution(sign, trade);

        if self.cum_imbalance.abs() >= self.ewma.expected() && self.acc.tick_count() > 0 {
            return Ok(Some(self.emit()?));
        }
        Ok(None)
    }

    fn flush(&mut self) -> Result<Option<Bar>> {
        if self.acc.tick_count() == 0 {
            return Ok(None);
        }
        let metadata: Option<BarMetadata> = Some(self.ewma.to_metadata());
        let bar = self.acc.to_bar(&self.bar_type, &self.source, &self.pair, metadata)?;
        self.acc = Accumulator::new();
        self.cum_imbalance = 0.0;
        Ok(Some(bar))
    }

    fn restore_state(&mut self, metadata: &BarMetadata) -> Result<()> {
        self.ewma = EwmaEstimator::from_metadata(metadata)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_common::Side;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn buy_at(offset: i64, id: u64) -> Trade {
        Trade::new(
            Utc::now() - chrono::Duration::seconds(3600 - offset),
            id.to_string(),
            "coinbase",
            "ETH-USD",
            dec!(100),
            dec!(1),
            Side::Buy,
        )
        .unwrap()
    }

    fn sell_at(offset: i64, id: u64) -> Trade {
        Trade::new(
            Utc::now() - chrono::Duration::seconds(3600 - offset),
            id.to_string(),
            "coinbase",
            "ETH-USD",
            dec!(100),
            dec!(1),
            Side::Sell,
        )
        .unwrap()
    }

    #[test]
    fn scenario_imbalance_adaptive_threshold() {
        let mut all_buy =
            ImbalanceBarBuilder::new(ImbalanceKind::Tick, 10, 5.0, "coinbase", "ETH-USD").unwrap();
        let all_buy_trades: Vec<Trade> = (0..30).map(|i| buy_at(i, i as u64)).collect();
        let bars_all_buy = all_buy.process_trades(&all_buy_trades).unwrap();

        let mut alternating =
            ImbalanceBarBuilder::new(ImbalanceKind::Tick, 10, 5.0, "coinbase", "ETH-USD").unwrap();
        let alternating_trades: Vec<Trade> = (0..30)
            .map(|i| {
                if i % 2 == 0 {
                    buy_at(i, i as u64)
                } else {
                    sell_at(i, i as u64)
                }
            })
            .collect();
        let bars_alternating = alternating.process_trades(&alternating_trades).unwrap();

        assert!(bars_all_buy.len() > bars_alternating.len());
    }

    #[test]
    fn restart_uses_restored_ewma_not_cold_start() {
        let mut builder =
            ImbalanceBarBuilder::new(ImbalanceKind::Tick, 10, 0.0, "coinbase", "ETH-USD").unwrap();
        let trades: Vec<Trade> = (0..30).map(|i| buy_at(i, i as u64)).collect();
        let bars = builder.process_trades(&trades).unwrap();
        let last_metadata = bars.last().unwrap().metadata.clone().unwrap();

        let mut restored =
            ImbalanceBarBuilder::new(ImbalanceKind::Tick, 10, 0.0, "coinbase", "ETH-USD").unwrap();
        restored.restore_state(&last_metadata).unwrap();
        assert_eq!(restored.ewma.expected(), EwmaEstimator::from_metadata(&last_metadata).unwrap().expected());
    }
}
