//! Relative strength index.

use crate::domain::signal::{Signal, SignalValue};

/// Relative strength index over the last `period` prices.
///
/// Gains and losses are summed over consecutive changes in the window and
/// averaged over the period. A window with no losses reads 100.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    /// Create an RSI named `RSI_{period}`.
    #[must_use]
    pub fn new(period: usize) -> Self {
        let period = period.max(2);
        Self {
            period,
            name: format!("RSI_{period}"),
        }
    }
}

impl Signal for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_period(&self) -> usize {
        self.period
    }

    #[allow(clippy::cast_precision_loss)]
    fn compute(&self, history: &[f64]) -> SignalValue {
        if history.len() < self.period {
            return SignalValue::InsufficientData;
        }

        let window = &history[history.len() - self.period..];
        let (gain, loss) = window
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .fold((0.0, 0.0), |(gain, loss), change| {
                if change > 0.0 {
                    (gain + change, loss)
                } else {
                    (gain, loss - change)
                }
            });

        if loss == 0.0 {
            return SignalValue::Scalar(100.0);
        }

        let period = self.period as f64;
        let rs = (gain / period) / (loss / period);
        SignalValue::Scalar(100.0 - 100.0 / (1.0 + rs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_period_is_named_after_clamped_period() {
        let rsi = Rsi::new(1);
        assert_eq!(rsi.name(), "RSI_2");
        assert_eq!(rsi.required_period(), 2);
    }

    #[test]
    fn only_gains_is_100() {
        let rsi = Rsi::new(4);
        assert_eq!(rsi.compute(&[1.0, 2.0, 3.0, 4.0]), SignalValue::Scalar(100.0));
    }

    #[test]
    fn balanced_moves_is_50() {
        let rsi = Rsi::new(3);
        let value = rsi.compute(&[10.0, 12.0, 10.0]).as_scalar().unwrap();
        assert!((value - 50.0).abs() < 1e-9);
    }

    #[test]
    fn only_losses_is_0() {
        let rsi = Rsi::new(3);
        let value = rsi.compute(&[3.0, 2.0, 1.0]).as_scalar().unwrap();
        assert!(value.abs() < 1e-9);
    }

    #[test]
    fn insufficient() {
        assert!(Rsi::new(14).compute(&[1.0; 13]).is_insufficient());
    }
}
