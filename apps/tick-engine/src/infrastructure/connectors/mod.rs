//! Venue Connectors
//!
//! A [`WebSocketConnector`] couples one [`StreamingClient`] with a venue
//! codec and a [`RestExecutor`]. The codec turns raw payloads into ticks and
//! names the per-pair streams; the executor places orders over REST.
//!
//! - `binance`: Binance spot trade streams and signed `/api/v3/order`
//! - `kraken`: Kraken v2 trade channel and `/0/private/AddOrder`
//! - `local`: local test venue with flat JSON ticks and `/api/v1/order`

pub mod binance;
pub mod kraken;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::ports::{Connector, ConnectorError, OrderError, TickSink};
use crate::domain::market::Tick;
use crate::domain::order::OrderRequest;
use crate::infrastructure::metrics;
use crate::infrastructure::rest::RestExecutor;
use crate::infrastructure::stream::{Frame, MessageHandler, StreamingClient};

pub use binance::Binance;
pub use kraken::Kraken;
pub use local::Local;

/// Payload that could not be turned into a tick.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Payload is not valid JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON is well formed but does not describe a usable tick.
    #[error("invalid tick data: {0}")]
    InvalidData(String),

    /// Venue control frame (subscription acknowledgement and similar).
    #[error("control message")]
    Control,
}

impl ParseError {
    /// Metric label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::InvalidData(_) => "invalid_data",
            Self::Control => "control",
        }
    }
}

/// Venue wire codec.
pub trait VenueCodec: Send + Sync {
    /// Parse one inbound payload into a tick for `market`.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for anything that is not a trade.
    fn parse_tick(&self, market: &str, payload: &[u8]) -> Result<Tick, ParseError>;

    /// Parse one inbound payload that may carry several trades.
    ///
    /// # Errors
    ///
    /// Same as [`VenueCodec::parse_tick`].
    fn parse_ticks(&self, market: &str, payload: &[u8]) -> Result<Vec<Tick>, ParseError> {
        self.parse_tick(market, payload).map(|tick| vec![tick])
    }

    /// Logical stream name for a trading pair.
    fn stream_name(&self, trading_pair: &str) -> String;

    /// Frame that subscribes `stream`, if the venue needs one.
    fn subscribe_frame(&self, stream: &str, request_id: u64) -> Option<Frame>;
}

/// Connector over a streaming client and a REST executor.
pub struct WebSocketConnector {
    market: String,
    client: Arc<StreamingClient>,
    codec: Arc<dyn VenueCodec>,
    executor: RestExecutor,
    trading_pairs: Vec<String>,
}

impl WebSocketConnector {
    /// Create a connector streaming `trading_pairs`.
    #[must_use]
    pub fn new(
        market: impl Into<String>,
        client: Arc<StreamingClient>,
        codec: Arc<dyn VenueCodec>,
        executor: RestExecutor,
        trading_pairs: Vec<String>,
    ) -> Self {
        Self {
            market: market.into(),
            client,
            codec,
            executor,
            trading_pairs,
        }
    }

    /// The underlying streaming client.
    #[must_use]
    pub const fn client(&self) -> &Arc<StreamingClient> {
        &self.client
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    fn market(&self) -> &str {
        &self.market
    }

    async fn connect(&self) -> Result<(), ConnectorError> {
        // Subscriptions registered first are sent by the connect itself.
        for (request_id, pair) in (1..).zip(&self.trading_pairs) {
            let stream = self.codec.stream_name(pair);
            let frame = self.codec.subscribe_frame(&stream, request_id);
            self.client
                .subscribe(stream, frame)
                .await
                .map_err(|e| ConnectorError::Connection(e.to_string()))?;
        }

        self.client
            .connect()
            .await
            .map_err(|e| ConnectorError::Connection(e.to_string()))?;

        tracing::info!(
            market = %self.market,
            pairs = self.trading_pairs.len(),
            "Connector connected"
        );
        Ok(())
    }

    async fn stream_market_data(&self, sink: Arc<dyn TickSink>) -> Result<(), ConnectorError> {
        let decoder = Arc::new(TickDecoder {
            market: self.market.clone(),
            codec: Arc::clone(&self.codec),
            sink,
        });
        self.client
            .start(decoder)
            .map_err(|e| ConnectorError::Stream(e.to_string()))
    }

    async fn place_order(&self, order: OrderRequest) -> Result<(), OrderError> {
        self.executor.execute(&order).await
    }

    async fn stop(&self) -> Result<(), ConnectorError> {
        self.client.stop().await;
        Ok(())
    }
}

/// Parses payloads and forwards ticks to the engine.
struct TickDecoder {
    market: String,
    codec: Arc<dyn VenueCodec>,
    sink: Arc<dyn TickSink>,
}

#[async_trait]
impl MessageHandler for TickDecoder {
    async fn handle_message(&self, payload: &[u8]) {
        match self.codec.parse_ticks(&self.market, payload) {
            Ok(ticks) => {
                for tick in ticks {
                    metrics::record_tick_received(&self.market);
                    tracing::trace!(
                        market = %self.market,
                        trading_pair = tick.trading_pair(),
                        price = tick.price(),
                        "Tick parsed"
                    );
                    self.sink.on_tick(tick).await;
                }
            }
            Err(ParseError::Control) => {
                tracing::debug!(
                    market = %self.market,
                    payload = %String::from_utf8_lossy(payload),
                    "Control message"
                );
            }
            Err(e) => {
                metrics::record_parse_error(&self.market, e.kind());
                tracing::warn!(market = %self.market, error = %e, "Dropping unparseable message");
            }
        }
    }
}
