//! Auto-calibration of bar thresholds from stored trade history (spec
//! §4.6), grounded on
//! `original_source/src/arcana/pipeline.py::calibrate_*`.

use arcana_common::{ArcanaError, Result};
use arcana_storage::Storage;
use rust_decimal::prelude::ToPrimitive;

/// Target bars/day used when the caller doesn't specify one, matching the
/// original's `bars_per_day: int = 50` default.
pub const DEFAULT_BARS_PER_DAY: f64 = 50.0;

/// Rounds `raw` to its nearest power-of-ten significant digit, e.g.
/// `213847.0 → 200000.0`, `58312.0 → 50000.0`. `raw` must be positive.
fn round_to_significant_digit(raw: f64) -> f64 {
    let magnitude = 10f64.powi(raw.log10().floor() as i32);
    (raw / magnitude).round() * magnitude
}

async fn trade_stats_or_err(storage: &dyn Storage, pair: &str, source: &str) -> Result<arcana_storage::TradeStats> {
    storage
        .trade_stats(pair, source)
        .await?
        .ok_or_else(|| ArcanaError::calibration(format!("no trade data for {pair}. run 'arcana ingest' first")))
}

/// `threshold = total_dollar_volume / (days * bars_per_day)`, rounded to a
/// clean power-of-ten significant digit.
pub async fn calibrate_dollar_threshold(
    storage: &dyn Storage,
    pair: &str,
    source: &str,
    bars_per_day: f64,
) -> Result<u64> {
    let stats = trade_stats_or_err(storage, pair, source).await?;
    let days = stats.span_days().max(1.0 / 24.0);
    let total_dollar_volume = stats.sum_dollar_volume.to_f64().unwrap_or(f64::MAX);
    let raw = total_dollar_volume / (days * bars_per_day);
    let threshold = round_to_significant_digit(raw).max(1.0) as u64;

    tracing::info!(
        "calibrated dollar threshold for {}: ${} ({:.1} days, ${:.0}M total vol, target {} bars/day)",
        pair,
        threshold,
        days,
        total_dollar_volume / 1e6,
        bars_per_day
    );
    Ok(threshold)
}

/// `threshold = total_trades / (days * bars_per_day)`, floored at 1.
pub async fn calibrate_tick_threshold(
    storage: &dyn Storage,
    pair: &str,
    source: &str,
    bars_per_day: f64,
) -> Result<u64> {
    let stats = trade_stats_or_err(storage, pair, source).await?;
    let days = stats.span_days().max(1.0 / 24.0);
    let raw = stats.trade_count as f64 / (days * bars_per_day);
    let threshold = raw.round().max(1.0) as u64;

    tracing::info!(
        "calibrated tick threshold for {}: {} ticks ({:.1} days, {} total trades, target {} bars/day)",
        pair,
        threshold,
        days,
        stats.trade_count,
        bars_per_day
    );
    Ok(threshold)
}

/// `threshold = total_volume / (days * bars_per_day)`, rounded to a clean
/// value (power-of-ten significant digit above 1.0, else 4 decimal places),
/// floored at `0.0001`.
pub async fn calibrate_volume_threshold(
    storage: &dyn Storage,
    pair: &str,
    source: &str,
    bars_per_day: f64,
) -> Result<f64> {
    let stats = trade_stats_or_err(storage, pair, source).await?;
    let days = stats.span_days().max(1.0 / 24.0);
    let total_volume = stats.sum_size.to_f64().unwrap_or(f64::MAX);
    let raw = total_volume / (days * bars_per_day);

    let threshold = if raw >= 1.0 {
        round_to_significant_digit(raw)
    } else {
        (raw * 10_000.0).round() / 10_000.0
    };
    let threshold = threshold.max(0.0001);

    tracing::info!(
        "calibrated volume threshold for {}: {:.4} ({:.1} days, {:.0} total volume, target {} bars/day)",
        pair,
        threshold,
        days,
        total_volume,
        bars_per_day
    );
    Ok(threshold)
}

/// The six information-driven bar variants `calibrate_info_bar_initial_expected`
/// accepts, matching the original's string literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoBarKind {
    TickImbalance,
    VolumeImbalance,
    DollarImbalance,
    TickRun,
    VolumeRun,
    DollarRun,
}

impl InfoBarKind {
    fn is_imbalance(self) -> bool {
        matches!(self, Self::TickImbalance | Self::VolumeImbalance | Self::DollarImbalance)
    }

    fn is_tick(self) -> bool {
        matches!(self, Self::TickImbalance | Self::TickRun)
    }

    fn is_volume(self) -> bool {
        matches!(self, Self::VolumeImbalance | Self::VolumeRun)
    }
}

/// Calibrates `E_0`, the initial expected-value estimate an information-
/// driven builder's EWMA tracks (spec §4.3, Prado ch. 2).
///
/// Imbalance bars: `E_0 = E[T] * max(|2p-1|, 0.1) * E[|contribution|]`.
/// Run bars: `E_0 = p_same/(1-p_same) * E[|contribution|]`, with `p_same`
/// clipped to `[0.55, 0.95]`.
pub async fn calibrate_info_bar_initial_expected(
    storage: &dyn Storage,
    pair: &str,
    source: &str,
    bar_kind: InfoBarKind,
    bars_per_day: f64,
) -> Result<f64> {
    let stats = trade_stats_or_err(storage, pair, source).await?;
    let days = stats.span_days().max(1.0 / 24.0);
    let expected_ticks_per_bar = stats.trade_count as f64 / (days * bars_per_day);

    let avg_size = stats.mean_size().to_f64().unwrap_or(0.0);
    let avg_dollar = stats.mean_dollar_volume().to_f64().unwrap_or(0.0);
    let buy_fraction = stats.buy_fraction();

    let avg_contribution = if bar_kind.is_tick() {
        1.0
    } else if bar_kind.is_volume() {
        avg_size
    } else {
        avg_dollar
    };

    let e0 = if bar_kind.is_imbalance() {
        let direction_bias = (2.0 * buy_fraction - 1.0).abs().max(0.1);
        let e0 = expected_ticks_per_bar * direction_bias * avg_contribution;
        tracing::info!(
            "calibrated E0 for {:?} on {}: {:.2} (E[T]={:.0} ticks, P[buy]={:.3}, bias={:.3}, E[|c|]={:.4})",
            bar_kind,
            pair,
            e0,
            expected_ticks_per_bar,
            buy_fraction,
            direction_bias,
            avg_contribution
        );
        e0
    } else {
        let p_same = buy_fraction.max(1.0 - buy_fraction).clamp(0.55, 0.95);
        let expected_run_length = p_same / (1.0 - p_same);
        let e0 = expected_run_length * avg_contribution;
        tracing::info!(
            "calibrated E0 for {:?} on {}: {:.2} (P[same]={:.3}, E[run]={:.1} trades, E[|c|]={:.4})",
            bar_kind,
            pair,
            e0,
            p_same,
            expected_run_length,
            avg_contribution
        );
        e0
    };

    Ok(e0)
}
