//! Application Layer - Use cases and port definitions.
//!
//! Holds the tiered store, the dispatch engine and the engine lifecycle,
//! plus the port interfaces infrastructure adapters implement.

/// Port interfaces for connectors, the durable tier, handlers and orders.
pub mod ports;

/// Fast/durable tiered price history store.
pub mod store;

/// Per-market signal and handler dispatch.
pub mod dispatch;

/// Connector lifecycle and tick routing.
pub mod engine;

/// Built-in tick handlers.
pub mod strategies;
