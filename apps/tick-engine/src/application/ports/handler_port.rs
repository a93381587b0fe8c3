//! Tick Handler Port (Driver Port)
//!
//! Reactive logic invoked once per tick after all signals for the tick's
//! market are computed.

use async_trait::async_trait;

use crate::application::dispatch::DispatchContext;

use super::order_port::OrderError;

/// Handler error.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// An order placed by the handler failed.
    #[error("order failed: {0}")]
    Order(#[from] OrderError),

    /// A signal the handler depends on is missing from the context.
    #[error("missing signal: {0}")]
    MissingSignal(String),

    /// Any other handler failure.
    #[error("{0}")]
    Failed(String),
}

/// Port for per-tick handlers.
///
/// Handlers side-effect only through the context's order binding or their
/// own external I/O; they never touch store state directly.
#[async_trait]
pub trait TickHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "handler"
    }

    /// Handle one tick.
    async fn handle(&self, ctx: &DispatchContext) -> Result<(), HandlerError>;
}

/// Handler backed by a synchronous closure.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

/// Wrap a closure as a [`TickHandler`].
pub fn handler_fn<F>(name: impl Into<String>, f: F) -> FnHandler<F>
where
    F: Fn(&DispatchContext) -> Result<(), HandlerError> + Send + Sync,
{
    FnHandler {
        name: name.into(),
        f,
    }
}

#[async_trait]
impl<F> TickHandler for FnHandler<F>
where
    F: Fn(&DispatchContext) -> Result<(), HandlerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &DispatchContext) -> Result<(), HandlerError> {
        (self.f)(ctx)
    }
}
