//! Simple and exponential moving averages.

use crate::domain::signal::{Signal, SignalValue};

use super::{ema, mean};

/// Simple moving average over the last `period` prices.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    /// Create an SMA named `SMA_{period}`.
    #[must_use]
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("SMA_{period}"),
        }
    }
}

impl Signal for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_period(&self) -> usize {
        self.period
    }

    fn compute(&self, history: &[f64]) -> SignalValue {
        if history.len() < self.period {
            return SignalValue::InsufficientData;
        }
        SignalValue::Scalar(mean(&history[history.len() - self.period..]))
    }
}

/// Exponential moving average.
///
/// Seeded with the SMA of the oldest `period` prices in the window, then
/// smoothed over the rest of the lookback window.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    lookback: usize,
    name: String,
}

impl Ema {
    /// Create an EMA named `EMA_{period}` whose window equals its period.
    #[must_use]
    pub fn new(period: usize) -> Self {
        Self::with_lookback(period, period)
    }

    /// Create an EMA that smooths over a longer window of `lookback` prices.
    #[must_use]
    pub fn with_lookback(period: usize, lookback: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            lookback: lookback.max(period),
            name: format!("EMA_{period}"),
        }
    }
}

impl Signal for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_period(&self) -> usize {
        self.lookback
    }

    fn compute(&self, history: &[f64]) -> SignalValue {
        if history.len() < self.lookback {
            return SignalValue::InsufficientData;
        }
        let window = &history[history.len() - self.lookback..];
        SignalValue::Scalar(ema(window, self.period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_period_is_named_after_clamped_period() {
        let sma = Sma::new(0);
        assert_eq!(sma.name(), "SMA_1");
        assert_eq!(sma.required_period(), 1);
        assert_eq!(Ema::new(0).name(), "EMA_1");
    }

    #[test]
    fn sma_of_last_period() {
        let sma = Sma::new(3);
        assert_eq!(sma.name(), "SMA_3");
        assert_eq!(
            sma.compute(&[1.0, 100.0, 105.0, 110.0]),
            SignalValue::Scalar(105.0)
        );
    }

    #[test]
    fn sma_insufficient() {
        assert!(Sma::new(5).compute(&[1.0, 2.0]).is_insufficient());
    }

    #[test]
    fn ema_equals_sma_when_window_is_period() {
        let ema = Ema::new(4);
        assert_eq!(
            ema.compute(&[2.0, 4.0, 6.0, 8.0]),
            SignalValue::Scalar(5.0)
        );
    }

    #[test]
    fn ema_smooths_over_lookback() {
        // Seed = mean(1, 2, 3) = 2, multiplier = 0.5
        // 4 -> 3.0, 5 -> 4.0
        let ema = Ema::with_lookback(3, 5);
        assert_eq!(ema.required_period(), 5);
        let value = ema.compute(&[1.0, 2.0, 3.0, 4.0, 5.0]).as_scalar().unwrap();
        assert!((value - 4.0).abs() < 1e-12);
    }

    #[test]
    fn ema_insufficient() {
        assert!(Ema::with_lookback(3, 10).compute(&[1.0; 9]).is_insufficient());
    }
}
