//! Bollinger bands.

use crate::domain::signal::{Signal, SignalValue};

use super::mean;

/// Bollinger bands as `[upper, middle, lower]`.
///
/// Middle is the SMA of the last `period` prices; the bands sit
/// `multiplier` population standard deviations above and below it.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    multiplier: f64,
    name: String,
}

impl BollingerBands {
    /// Create bands named `BollingerBands_{period}`.
    #[must_use]
    pub fn new(period: usize, multiplier: f64) -> Self {
        let period = period.max(1);
        Self {
            period,
            multiplier,
            name: format!("BollingerBands_{period}"),
        }
    }
}

impl Signal for BollingerBands {
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

        let window = &history[history.len() - self.period..];
        let middle = mean(window);
        let variance = mean(
            &window
                .iter()
                .map(|p| (p - middle).powi(2))
                .collect::<Vec<_>>(),
        );
        let band = self.multiplier * variance.sqrt();

        SignalValue::Vector(vec![middle + band, middle, middle - band])
    }
}
