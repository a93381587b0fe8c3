#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Tick Engine - Real-time Market Data Ingestion Core
//!
//! Maintains one long-lived WebSocket connection per venue, records every
//! tick into a two-tier store and runs per-market signal and handler chains
//! on each tick.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and computations
//!   - `market`: ticks and market keys
//!   - `ring_buffer`: fixed-capacity history
//!   - `signal`, `indicators`: signal contract and SMA/EMA/RSI/MACD/Bollinger
//!   - `order`: order requests
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: durable store, connector, handler and order placement seams
//!   - `store`: fast/durable tiered store
//!   - `dispatch`: signal computation and handler fan-out
//!   - `engine`: connector lifecycle and record-then-dispatch
//!   - `strategies`: built-in handlers
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `stream`: reconnecting streaming client with heartbeat and rate gate
//!   - `connectors`: Binance, Kraken and local venue codecs
//!   - `rest`: order submission over HTTP
//!   - `persistence`: in-memory and journal durable tiers
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//! venue WS ──► StreamingClient ──► codec ──► TickEngine
//!                                              │
//!                          ┌───────────────────┤
//!                          ▼                   ▼
//!                     TieredStore ◄──── DispatchEngine ──► handlers ──► REST
//!                   (ring | journal)      (signals)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Market types and pure computations.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::indicators::{BollingerBands, Ema, Macd, Rsi, Sma};
pub use domain::market::{MarketKey, Tick};
pub use domain::order::{OrderRequest, OrderSide, OrderType};
pub use domain::ring_buffer::RingBuffer;
pub use domain::signal::{Signal, SignalValue};

// Application
pub use application::dispatch::{DispatchContext, DispatchEngine, DispatchReport, require_signal};
pub use application::engine::{EngineError, TickEngine};
pub use application::ports::{
    Connector, ConnectorError, DurableStore, HandlerError, OrderError, OrderPlacer, StoreError,
    TickHandler, TickSink, handler_fn,
};
pub use application::store::TieredStore;
pub use application::strategies::{MovingAverageCrossover, TickLogger};

// Infrastructure config
pub use infrastructure::config::{ConfigError, Credentials, EngineConfig, Venue};

// Durable tiers
pub use infrastructure::persistence::{InMemoryDurableStore, JournalDurableStore};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
