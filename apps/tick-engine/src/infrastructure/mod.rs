//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Reconnecting WebSocket streaming client.
pub mod stream;

/// REST order execution.
pub mod rest;

/// Venue connectors (Binance, local).
pub mod connectors;

/// Durable tier adapters.
pub mod persistence;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber and OpenTelemetry integration.
pub mod telemetry;
