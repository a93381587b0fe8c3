//! Tick Engine
//!
//! Top-level lifecycle owner. Holds the venue connectors, the tiered store
//! and the dispatch engine, and wires each connector's tick stream into
//! record-then-dispatch.
//!
//! # Lifecycle
//!
//! Construction and registration have no side effects. [`TickEngine::start`]
//! connects every connector and starts its stream; a failure there is fatal
//! and rolls back the connectors already started. [`TickEngine::stop`] stops
//! every connector and may be called any number of times.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::dispatch::DispatchEngine;
use crate::application::ports::{
    Connector, ConnectorError, OrderError, OrderPlacer, TickHandler, TickSink,
};
use crate::application::store::TieredStore;
use crate::domain::market::{MarketKey, Tick};
use crate::domain::order::OrderRequest;
use crate::domain::signal::Signal;
use crate::infrastructure::metrics;

/// Engine lifecycle error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// `start` was called with no connectors registered.
    #[error("no connectors registered")]
    NoConnectors,

    /// `start` was called on a running engine.
    #[error("engine already started")]
    AlreadyStarted,

    /// A connector failed its initial connection.
    #[error("connector {market} failed to connect: {source}")]
    Connect {
        /// Connector market name.
        market: String,
        /// Underlying error.
        source: ConnectorError,
    },

    /// A connector failed to start streaming.
    #[error("connector {market} failed to stream: {source}")]
    Stream {
        /// Connector market name.
        market: String,
        /// Underlying error.
        source: ConnectorError,
    },
}

/// Real-time tick engine.
pub struct TickEngine {
    store: Arc<TieredStore>,
    dispatcher: Arc<DispatchEngine>,
    connectors: RwLock<Vec<Arc<dyn Connector>>>,
    started: AtomicBool,
}

impl TickEngine {
    /// Create an engine over a store.
    #[must_use]
    pub fn new(store: Arc<TieredStore>) -> Self {
        let dispatcher = Arc::new(DispatchEngine::new(Arc::clone(&store)));
        Self {
            store,
            dispatcher,
            connectors: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Register a connector. A connector with the same market name replaces
    /// the earlier one.
    pub fn register_connector(&self, connector: Arc<dyn Connector>) {
        let mut connectors = self.connectors.write();
        connectors.retain(|c| c.market() != connector.market());
        tracing::info!(market = connector.market(), "Connector registered");
        connectors.push(connector);
    }

    /// Register a signal for a market and trading pair.
    pub fn register_signal(&self, market: &str, trading_pair: &str, signal: Arc<dyn Signal>) {
        let key = MarketKey::new(market, trading_pair);
        tracing::debug!(key = %key, signal = signal.name(), "Signal registered");
        self.dispatcher.registry().register_signal(key, signal);
    }

    /// Register a handler for a market and trading pair.
    pub fn register_handler(
        &self,
        market: &str,
        trading_pair: &str,
        handler: Arc<dyn TickHandler>,
    ) {
        let key = MarketKey::new(market, trading_pair);
        tracing::debug!(key = %key, handler = handler.name(), "Handler registered");
        self.dispatcher.registry().register_handler(key, handler);
    }

    /// The tiered store.
    #[must_use]
    pub const fn store(&self) -> &Arc<TieredStore> {
        &self.store
    }

    /// The dispatch engine.
    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<DispatchEngine> {
        &self.dispatcher
    }

    /// Whether `start` has succeeded and `stop` has not been called since.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Connect every connector and start streaming.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoConnectors`] or [`EngineError::AlreadyStarted`]
    /// before doing anything, or the first connector failure after stopping
    /// the connectors already started.
    pub async fn start(&self) -> Result<(), EngineError> {
        let connectors = self.connectors.read().clone();
        if connectors.is_empty() {
            return Err(EngineError::NoConnectors);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(EngineError::AlreadyStarted);
        }

        let mut running: Vec<Arc<dyn Connector>> = Vec::with_capacity(connectors.len());
        for connector in connectors {
            if let Err(e) = self.start_connector(&connector).await {
                tracing::error!(market = connector.market(), error = %e, "Connector failed to start");
                // The failed connector may hold a half-open connection.
                running.push(connector);
                stop_all(&running).await;
                self.started.store(false, Ordering::Release);
                return Err(e);
            }
            running.push(connector);
        }

        tracing::info!(connectors = running.len(), "Tick engine started");
        Ok(())
    }

    /// Stop every connector.
    pub async fn stop(&self) {
        if !self.started.swap(false, Ordering::AcqRel) {
            return;
        }
        let connectors = self.connectors.read().clone();
        stop_all(&connectors).await;
        tracing::info!("Tick engine stopped");
    }

    async fn start_connector(&self, connector: &Arc<dyn Connector>) -> Result<(), EngineError> {
        let market = connector.market().to_string();

        connector
            .connect()
            .await
            .map_err(|source| EngineError::Connect {
                market: market.clone(),
                source,
            })?;

        let worker = Arc::new(ConnectorWorker {
            store: Arc::clone(&self.store),
            dispatcher: Arc::clone(&self.dispatcher),
            orders: Arc::new(ConnectorOrders(Arc::clone(connector))),
        });
        connector
            .stream_market_data(worker)
            .await
            .map_err(|source| EngineError::Stream {
                market: market.clone(),
                source,
            })?;

        tracing::info!(market = %market, "Connector streaming");
        Ok(())
    }
}

async fn stop_all(connectors: &[Arc<dyn Connector>]) {
    for connector in connectors {
        if let Err(e) = connector.stop().await {
            tracing::warn!(market = connector.market(), error = %e, "Connector failed to stop");
        }
    }
}

/// Per-connector tick sink: record, then dispatch.
struct ConnectorWorker {
    store: Arc<TieredStore>,
    dispatcher: Arc<DispatchEngine>,
    orders: Arc<dyn OrderPlacer>,
}

#[async_trait]
impl TickSink for ConnectorWorker {
    async fn on_tick(&self, tick: Tick) {
        let key = tick.key();
        if let Err(e) = self.store.record_tick(&key, &tick).await {
            // Fast tier is already updated; dispatch proceeds on it.
            metrics::record_durable_write_failure(key.market());
            tracing::warn!(key = %key, error = %e, "Durable write failed, tiers diverged");
        }
        self.dispatcher.dispatch(tick, Arc::clone(&self.orders)).await;
    }
}

/// Order binding that forwards to a connector.
struct ConnectorOrders(Arc<dyn Connector>);

#[async_trait]
impl OrderPlacer for ConnectorOrders {
    async fn place_order(&self, order: OrderRequest) -> Result<(), OrderError> {
        self.0.place_order(order).await
    }
}
