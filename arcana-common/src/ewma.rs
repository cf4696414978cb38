//! Adaptive threshold estimator shared by the information-driven builders.

use crate::error::{ArcanaError, Result};
use crate::metadata::BarMetadata;

/// Exponentially-weighted moving average of observed imbalance/run
/// magnitudes. `window` fixes the smoothing factor `alpha = 2 / (window + 1)`;
/// `window = 1` degenerates to "last value wins" (tolerated), `window < 1`
/// is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EwmaEstimator {
    window: u32,
    alpha: f64,
    expected: f64,
}

impl EwmaEstimator {
    pub fn new(window: u32, initial_value: f64) -> Result<Self> {
        if window < 1 {
            return Err(ArcanaError::configuration(format!(
                "EWMA window must be >= 1, got {window}"
            )));
        }
        Ok(Self {
            window,
            alpha: 2.0 / (window as f64 + 1.0),
            expected: initial_value,
        })
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn expected(&self) -> f64 {
        self.expected
    }

    /// `E <- alpha * observed + (1 - alpha) * E`.
    pub fn update(&mut self, observed: f64) {
        self.expected = self.alpha * observed + (1.0 - self.alpha) * self.expected;
    }

    pub fn to_metadata(&self) -> BarMetadata {
        BarMetadata::ewma(self.window, self.expected)
    }

    pub fn from_metadata(metadata: &BarMetadata) -> Result<Self> {
        let (window, expected) = metadata.as_ewma().ok_or_else(|| {
            ArcanaError::invariant("expected EWMA metadata to restore estimator state".to_string())
        })?;
        Self::new(window, expected)
    }
}

/// Direction of the last non-zero price change, carried forward when a
/// trade's reported side is unknown (`sign() == 0`). `+1` on an uptick,
/// `-1` on a downtick, `prev_sign` unchanged.
pub fn tick_rule(price: rust_decimal::Decimal, prev_price: rust_decimal::Decimal, prev_sign: i8) -> i8 {
    use std::cmp::Ordering;
    match price.cmp(&prev_price) {
        Ordering::Greater => 1,
        Ordering::Less => -1,
        Ordering::Equal => prev_sign,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_zero_window() {
        assert!(EwmaEstimator::new(0, 0.0).is_err());
    }

    #[test]
    fn worked_example_from_spec() {
        let mut ewma = EwmaEstimator::new(4, 0.0).unwrap();
        ewma.update(10.0);
        assert!((ewma.expected() - 4.0).abs() < 1e-9);
        ewma.update(20.0);
        assert!((ewma.expected() - 10.4).abs() < 1e-9);

        let mut ewma = EwmaEstimator::new(4, 0.0).unwrap();
        for _ in 0..200 {
            ewma.update(50.0);
        }
        assert!((ewma.expected() - 50.0).abs() < 0.01);
    }

    #[test]
    fn window_one_is_last_value_wins() {
        let mut ewma = EwmaEstimator::new(1, 0.0).unwrap();
        ewma.update(7.0);
        assert!((ewma.expected() - 7.0).abs() < 1e-9);
        ewma.update(3.0);
        assert!((ewma.expected() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn tick_rule_matches_spec() {
        assert_eq!(tick_rule(dec!(101), dec!(100), -1), 1);
        assert_eq!(tick_rule(dec!(99), dec!(100), 1), -1);
        assert_eq!(tick_rule(dec!(100), dec!(100), -1), -1);
    }

    #[test]
    fn round_trips_through_metadata() {
        let mut ewma = EwmaEstimator::new(20, 0.0).unwrap();
        ewma.update(12.5);
        let meta = ewma.to_metadata();
        let restored = EwmaEstimator::from_metadata(&meta).unwrap();
        assert_eq!(restored.window(), ewma.window());
        assert!((restored.expected() - ewma.expected()).abs() < 1e-12);
    }
}
