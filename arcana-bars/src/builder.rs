//! The shared builder contract (spec §4.1).

use arcana_common::{Bar, BarMetadata, Result, Trade};

/// A stateful transducer from an ordered stream of trades into a sparser
/// stream of bars. Every concrete builder (standard, imbalance, run) owns
/// exactly one [`arcana_common::Accumulator`] and, if information-driven,
/// one [`arcana_common::EwmaEstimator`]; nothing is shared between builders
/// (spec §3, §5).
pub trait BarBuilder {
    /// A label derived from configuration, e.g. `tick_500`, `time_5m`.
    fn bar_type(&self) -> &str;

    /// Feeds one trade. Returns a completed bar if this trade closed one.
    fn process_trade(&mut self, trade: &Trade) -> Result<Option<Bar>>;

    /// Emits any partial bar carried in the accumulator, used at
    /// end-of-data and before a graceful shutdown so the next run can
    /// restore state.
    fn flush(&mut self) -> Result<Option<Bar>>;

    /// Rehydrates adaptive-estimator state from a previously-flushed
    /// bar's metadata. No-op for standard builders.
    fn restore_state(&mut self, _metadata: &BarMetadata) -> Result<()> {
        Ok(())
    }

    /// Convenience over [`BarBuilder::process_trade`]; preserves order.
    /// `batch` must be ascending in `(timestamp, trade_id)`.
    fn process_trades(&mut self, batch: &[Trade]) -> Result<Vec<Bar>> {
        let mut bars = Vec::new();
        for trade in batch {
            if let Some(bar) = self.process_trade(trade)? {
                bars.push(bar);
            }
        }
        Ok(bars)
    }
}
