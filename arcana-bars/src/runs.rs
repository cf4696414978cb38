//! Run bars: emit when the longest same-direction cumulative contribution
//! crosses an adaptive EWMA threshold (spec §4.3).

use crate::builder::BarBuilder;
use arcana_common::{tick_rule, Accumulator, Bar, BarMetadata, EwmaEstimator, Result, Trade};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Which unsigned scalar a trade contributes to its direction's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// `trb_W`: contribution is `1`.
    Tick,
    /// `vrb_W`: contribution is `size`.
    Volume,
    /// `drb_W`: contribution is `price * size`.
    Dollar,
}

impl RunKind {
    fn label(self) -> &'static str {
        match self {
            Self::Tick => "trb",
            Self::Volume => "vrb",
            Self::Dollar => "drb",
        }
    }

    fn contribution(self, trade: &Trade) -> f64 {
        match self {
            Self::Tick => 1.0,
            Self::Volume => trade.size.to_f64().unwrap_or(0.0),
            Self::Dollar => trade.dollar_volume().to_f64().unwrap_or(0.0),
        }
    }
}

/// Shared by `trb_W`, `vrb_W`, `drb_W`.
pub struct RunBarBuilder {
    kind: RunKind,
    bar_type: String,
    source: String,
    pair: String,
    acc: Accumulator,
    ewma: EwmaEstimator,
    buy_run: f64,
    sell_run: f64,
    prev_price: Option<Decimal>,
    prev_sign: i8,
}

impl RunBarBuilder {
    pub fn new(
        kind: RunKind,
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
            buy_run: 0.0,
            sell_run: 0.0,
            prev_price: None,
            prev_sign: 1,
        })
    }

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
}

impl BarBuilder for RunBarBuilder {
    fn bar_type(&self) -> &str {
        &self.bar_type
    }

    fn process_trade(&mut self, trade: &Trade) -> Result<Option<Bar>> {
        let sign = self.resolve_sign(trade);
        self.acc.add(trade);
        let contribution = self.kind.contribution(trade);

        if sign >= 0 {
            self.buy_run += contribution;
            self.sell_run = 0.0;
        } else {
            self.sell_run += contribution;
            self.buy_run = 0.0;
        }

        let max_run = self.buy_run.max(self.sell_run);
        if max_run >= self.ewma.expected() && self.acc.tick_count() > 0 {
            self.ewma.update(max_run);
            let metadata = Some(self.ewma.to_metadata());
            let bar = self.acc.to_bar(&self.bar_type, &self.source, &self.pair, metadata)?;
            self.acc = Accumulator::new();
            self.buy_run = 0.0;
            self.sell_run = 0.0;
            return Ok(Some(bar));
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
        self.buy_run = 0.0;
        self.sell_run = 0.0;
        Ok(Some(bar))
    }

    fn restore_state(&mut self, metadata: &BarMetadata) -> Result<()> {
        self.ewma = EwmaEstimator::from_metadata(metadata)?;
        Ok(())
    }
}
