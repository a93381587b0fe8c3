//! Dispatch Engine
//!
//! Per-(market, pair) registry of signals and handlers, and the per-tick
//! pipeline that runs them.
//!
//! For each tick every registered signal is computed from store history
//! first; only then do the handlers run, in registration order, against one
//! [`DispatchContext`]. A handler error is logged and counted and never stops
//! the handlers after it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::application::ports::{HandlerError, OrderError, OrderPlacer, TickHandler};
use crate::application::store::TieredStore;
use crate::domain::market::{MarketKey, Tick};
use crate::domain::order::{OrderRequest, OrderSide, OrderType};
use crate::domain::signal::{Signal, SignalValue};
use crate::infrastructure::metrics;

// =============================================================================
// Registry
// =============================================================================

#[derive(Clone, Default)]
struct Pipeline {
    signals: Vec<Arc<dyn Signal>>,
    handlers: Vec<Arc<dyn TickHandler>>,
}

/// Signals and handlers registered per market key.
///
/// Registration order is dispatch order. Dispatch takes a snapshot of a key's
/// pipeline under the read lock, so registration never blocks on a running
/// handler.
#[derive(Default)]
pub struct DispatchRegistry {
    pipelines: RwLock<HashMap<MarketKey, Pipeline>>,
}

impl DispatchRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a signal to a key's pipeline.
    pub fn register_signal(&self, key: MarketKey, signal: Arc<dyn Signal>) {
        self.pipelines
            .write()
            .entry(key)
            .or_default()
            .signals
            .push(signal);
    }

    /// Append a handler to a key's pipeline.
    pub fn register_handler(&self, key: MarketKey, handler: Arc<dyn TickHandler>) {
        self.pipelines
            .write()
            .entry(key)
            .or_default()
            .handlers
            .push(handler);
    }

    /// Number of signals registered for a key.
    #[must_use]
    pub fn signal_count(&self, key: &MarketKey) -> usize {
        self.pipelines.read().get(key).map_or(0, |p| p.signals.len())
    }

    /// Number of handlers registered for a key.
    #[must_use]
    pub fn handler_count(&self, key: &MarketKey) -> usize {
        self.pipelines.read().get(key).map_or(0, |p| p.handlers.len())
    }

    /// Keys with at least one registration.
    #[must_use]
    pub fn keys(&self) -> Vec<MarketKey> {
        let mut keys: Vec<_> = self.pipelines.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn snapshot(&self, key: &MarketKey) -> Option<Pipeline> {
        self.pipelines.read().get(key).cloned()
    }
}

// =============================================================================
// Context
// =============================================================================

/// Per-tick view handed to handlers.
///
/// Holds the tick, every signal computed for it, and an order binding scoped
/// to the tick's market and pair. Built once per tick and dropped after the
/// last handler returns.
pub struct DispatchContext {
    tick: Tick,
    signals: HashMap<String, SignalValue>,
    placer: Arc<dyn OrderPlacer>,
}

impl DispatchContext {
    /// Create a context.
    #[must_use]
    pub fn new(
        tick: Tick,
        signals: HashMap<String, SignalValue>,
        placer: Arc<dyn OrderPlacer>,
    ) -> Self {
        Self {
            tick,
            signals,
            placer,
        }
    }

    /// The tick being dispatched.
    #[must_use]
    pub const fn tick(&self) -> &Tick {
        &self.tick
    }

    /// A computed signal by name.
    #[must_use]
    pub fn signal(&self, name: &str) -> Option<&SignalValue> {
        self.signals.get(name)
    }

    /// A computed scalar signal by name, `None` if missing, insufficient or
    /// not a scalar.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.signal(name).and_then(SignalValue::as_scalar)
    }

    /// Every computed signal.
    #[must_use]
    pub const fn signals(&self) -> &HashMap<String, SignalValue> {
        &self.signals
    }

    /// Place an order for this tick's trading pair.
    ///
    /// # Errors
    ///
    /// Returns the connector's order error.
    pub async fn place_order(
        &self,
        order_type: OrderType,
        side: OrderSide,
        amount: f64,
        price: f64,
    ) -> Result<(), OrderError> {
        let order = OrderRequest::new(order_type, side, self.tick.trading_pair(), amount, price);
        let result = self.placer.place_order(order).await;

        let outcome = if result.is_ok() {
            metrics::OrderOutcome::Accepted
        } else {
            metrics::OrderOutcome::Failed
        };
        metrics::record_order(self.tick.market(), outcome);

        result
    }

    /// Place a market buy.
    ///
    /// # Errors
    ///
    /// Returns the connector's order error.
    pub async fn buy(&self, amount: f64, price: f64) -> Result<(), OrderError> {
        self.place_order(OrderType::Market, OrderSide::Buy, amount, price)
            .await
    }

    /// Place a market sell.
    ///
    /// # Errors
    ///
    /// Returns the connector's order error.
    pub async fn sell(&self, amount: f64, price: f64) -> Result<(), OrderError> {
        self.place_order(OrderType::Market, OrderSide::Sell, amount, price)
            .await
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Summary of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Signals computed (insufficient ones included).
    pub signals_computed: usize,
    /// Handlers invoked.
    pub handlers_run: usize,
    /// Handlers that returned an error.
    pub handler_errors: usize,
}

/// Runs a key's signals and handlers for each tick.
pub struct DispatchEngine {
    store: Arc<TieredStore>,
    registry: DispatchRegistry,
}

impl DispatchEngine {
    /// Create an engine reading history from `store`.
    #[must_use]
    pub fn new(store: Arc<TieredStore>) -> Self {
        Self {
            store,
            registry: DispatchRegistry::new(),
        }
    }

    /// The signal and handler registry.
    #[must_use]
    pub const fn registry(&self) -> &DispatchRegistry {
        &self.registry
    }

    /// Dispatch one tick.
    ///
    /// Keys with nothing registered return an empty report. Insufficient or
    /// unreadable history yields [`SignalValue::InsufficientData`] for that
    /// signal rather than failing the dispatch.
    pub async fn dispatch(&self, tick: Tick, placer: Arc<dyn OrderPlacer>) -> DispatchReport {
        let key = tick.key();
        let Some(pipeline) = self.registry.snapshot(&key) else {
            return DispatchReport::default();
        };

        let started = Instant::now();
        let mut report = DispatchReport::default();

        let mut signals = HashMap::with_capacity(pipeline.signals.len());
        for signal in &pipeline.signals {
            let value = self.compute_signal(&key, signal.as_ref()).await;
            signals.insert(signal.name().to_string(), value);
            report.signals_computed += 1;
        }

        let ctx = DispatchContext::new(tick, signals, placer);
        for handler in &pipeline.handlers {
            report.handlers_run += 1;
            if let Err(e) = handler.handle(&ctx).await {
                report.handler_errors += 1;
                metrics::record_handler_error(key.market(), handler.name());
                tracing::warn!(
                    key = %key,
                    handler = handler.name(),
                    error = %e,
                    "Handler failed"
                );
            }
        }

        metrics::record_dispatch_duration(key.market(), started.elapsed());
        report
    }

    async fn compute_signal(&self, key: &MarketKey, signal: &dyn Signal) -> SignalValue {
        let period = signal.required_period();
        match self.store.query_price_history(key, period).await {
            Ok(history) => signal.compute(&history),
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    signal = signal.name(),
                    period,
                    error = %e,
                    "Price history unavailable"
                );
                SignalValue::InsufficientData
            }
        }
    }
}

/// Convert a missing-signal lookup into a handler error.
///
/// # Errors
///
/// Returns [`HandlerError::MissingSignal`] if `name` was not computed.
pub fn require_signal<'a>(
    ctx: &'a DispatchContext,
    name: &str,
) -> Result<&'a SignalValue, HandlerError> {
    ctx.signal(name)
        .ok_or_else(|| HandlerError::MissingSignal(name.to_string()))
}
