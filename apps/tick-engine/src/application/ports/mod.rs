//! Application Ports (Driver and Driven)
//!
//! Ports define the narrow contracts between the ingestion core and its
//! collaborators.
//! - **Driven Ports** (Outbound): durable tier, order placement, venue connectors
//! - **Driver Ports** (Inbound): tick sinks fed by connectors, tick handlers

mod connector_port;
mod durable_store_port;
mod handler_port;
mod order_port;

pub use connector_port::{Connector, ConnectorError, TickSink};
#[cfg(test)]
pub use durable_store_port::MockDurableStore;
pub use durable_store_port::{DurableStore, StoreError};
pub use handler_port::{FnHandler, HandlerError, TickHandler, handler_fn};
pub use order_port::{OrderError, OrderPlacer};
