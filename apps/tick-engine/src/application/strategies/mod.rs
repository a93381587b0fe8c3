//! Built-in Handlers
//!
//! - `MovingAverageCrossover`: trades on the relation of two moving averages
//! - `TickLogger`: logs every tick at debug level

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::application::dispatch::{DispatchContext, require_signal};
use crate::application::ports::{HandlerError, TickHandler};
use crate::domain::order::OrderSide;

/// Buys when the short average is above the long one and sells when it is
/// below. Does nothing while either average is insufficient or they are
/// equal.
#[derive(Debug, Clone)]
pub struct MovingAverageCrossover {
    short_signal: String,
    long_signal: String,
    amount: f64,
}

impl MovingAverageCrossover {
    /// Create a crossover over two named scalar signals.
    #[must_use]
    pub fn new(short_signal: impl Into<String>, long_signal: impl Into<String>, amount: f64) -> Self {
        Self {
            short_signal: short_signal.into(),
            long_signal: long_signal.into(),
            amount,
        }
    }

    /// The side to trade for the current signals, if any.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::MissingSignal`] if either signal is not
    /// registered for the tick's market.
    pub fn decide(&self, ctx: &DispatchContext) -> Result<Option<OrderSide>, HandlerError> {
        let short = require_signal(ctx, &self.short_signal)?.as_scalar();
        let long = require_signal(ctx, &self.long_signal)?.as_scalar();
        let (Some(short), Some(long)) = (short, long) else {
            return Ok(None);
        };

        Ok(match short.partial_cmp(&long) {
            Some(Ordering::Greater) => Some(OrderSide::Buy),
            Some(Ordering::Less) => Some(OrderSide::Sell),
            _ => None,
        })
    }
}

#[async_trait]
impl TickHandler for MovingAverageCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    async fn handle(&self, ctx: &DispatchContext) -> Result<(), HandlerError> {
        let price = ctx.tick().price();
        match self.decide(ctx)? {
            Some(OrderSide::Buy) => ctx.buy(self.amount, price).await?,
            Some(OrderSide::Sell) => ctx.sell(self.amount, price).await?,
            None => return Ok(()),
        }

        tracing::info!(
            trading_pair = ctx.tick().trading_pair(),
            short = %self.short_signal,
            long = %self.long_signal,
            price,
            "Crossover order placed"
        );
        Ok(())
    }
}

/// Logs each tick and its computed signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickLogger;

#[async_trait]
impl TickHandler for TickLogger {
    fn name(&self) -> &str {
        "tick_logger"
    }

    async fn handle(&self, ctx: &DispatchContext) -> Result<(), HandlerError> {
        let tick = ctx.tick();
        tracing::debug!(
            market = tick.market(),
            trading_pair = tick.trading_pair(),
            price = tick.price(),
            volume = tick.volume(),
            signals = ?ctx.signals(),
            "Received tick"
        );
        Ok(())
    }
}
