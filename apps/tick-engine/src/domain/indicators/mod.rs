//! Technical Indicators
//!
//! Pure [`Signal`](crate::domain::signal::Signal) implementations over price
//! history. Every indicator returns `InsufficientData` until it has seen at
//! least its required period.

mod bollinger;
mod macd;
mod moving_average;
mod rsi;

pub use bollinger::BollingerBands;
pub use macd::Macd;
pub use moving_average::{Ema, Sma};
pub use rsi::Rsi;

/// Arithmetic mean. Caller guarantees `values` is non-empty.
#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values. Caller guarantees `values.len() >= period > 0`.
#[allow(clippy::cast_precision_loss)]
fn ema(values: &[f64], period: usize) -> f64 {
    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = mean(&values[..period]);
    values[period..]
        .iter()
        .fold(seed, |acc, price| (price - acc).mul_add(multiplier, acc))
}
