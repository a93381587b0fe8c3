//! Domain Layer - Core market data types and pure computations.
//!
//! Nothing in this layer performs I/O. Types here are shared by the
//! application services and the infrastructure adapters.

/// Ticks and the composite market key.
pub mod market;

/// Fixed-capacity ring buffer backing the fast store tier.
pub mod ring_buffer;

/// Signal computation contract.
pub mod signal;

/// Technical indicator implementations.
pub mod indicators;

/// Order request types.
pub mod order;
