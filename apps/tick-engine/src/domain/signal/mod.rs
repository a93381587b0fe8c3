//! Signal Computation Contract
//!
//! A signal is a pure function of price history. Each computation declares
//! a name (the key handlers look it up by) and the number of prices it
//! needs.

use serde::{Deserialize, Serialize};

/// Result of a signal computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalValue {
    /// Single value (moving average, RSI, ...).
    Scalar(f64),
    /// Multiple values (bands, ...).
    Vector(Vec<f64>),
    /// Not enough history to compute the signal yet.
    InsufficientData,
}

impl SignalValue {
    /// The scalar value, if this is a scalar.
    #[must_use]
    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// The vector values, if this is a vector.
    #[must_use]
    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Whether the computation lacked history.
    #[must_use]
    pub const fn is_insufficient(&self) -> bool {
        matches!(self, Self::InsufficientData)
    }
}

/// A named computation over price history.
///
/// Implementations receive a read-only copy of the most recent prices,
/// oldest first, and must return [`SignalValue::InsufficientData`] when the
/// history is shorter than [`Signal::required_period`].
pub trait Signal: Send + Sync {
    /// Name the result is stored under.
    fn name(&self) -> &str;

    /// Number of most recent prices the computation needs.
    fn required_period(&self) -> usize;

    /// Compute the signal from price history (oldest first).
    fn compute(&self, history: &[f64]) -> SignalValue;
}
