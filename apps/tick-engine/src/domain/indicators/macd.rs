//! Moving average convergence divergence.

use crate::domain::signal::{Signal, SignalValue};

use super::ema;

/// MACD line: fast EMA minus slow EMA over the slow window.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    name: String,
}

impl Macd {
    /// Create a MACD named `MACD_{fast}_{slow}_{signal}`.
    ///
    /// The signal-line period only names the indicator; the computed value
    /// is the MACD line.
    #[must_use]
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        let fast = fast.max(1);
        let slow = slow.max(fast);
        Self {
            fast,
            slow,
            name: format!("MACD_{fast}_{slow}_{signal}"),
        }
    }
}

impl Signal for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_period(&self) -> usize {
        self.slow
    }

    fn compute(&self, history: &[f64]) -> SignalValue {
        if history.len() < self.slow {
            return SignalValue::InsufficientData;
        }
        let window = &history[history.len() - self.slow..];
        SignalValue::Scalar(ema(window, self.fast) - ema(window, self.slow))
    }
}
