//! Kraken spot venue.
//!
//! Streams the v2 `trade` channel and shapes orders for `/0/private/AddOrder`.
//! Trading pairs are Kraken websocket symbols (`BTC/USD`). A single trade
//! update may carry several fills; each becomes its own tick.
//!
//! Kraken signs private requests with HMAC-SHA512 over a base64 secret. That
//! scheme is not implemented, so configuration refuses trading on this venue
//! and [`RequestFormatter::sign`] always fails.

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use super::{ParseError, VenueCodec};
use crate::application::ports::OrderError;
use crate::domain::market::Tick;
use crate::domain::order::{OrderRequest, OrderType};
use crate::infrastructure::rest::{FormattedRequest, RequestBody, RequestFormatter};
use crate::infrastructure::stream::Frame;

/// Kraken codec and order formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kraken;

#[derive(Debug, Deserialize)]
struct ChannelMessage {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Trade {
    symbol: String,
    price: f64,
    qty: f64,
}

impl Kraken {
    const fn order_type(order_type: OrderType) -> &'static str {
        match order_type {
            OrderType::Market => "market",
            OrderType::Limit | OrderType::LimitMaker => "limit",
            OrderType::StopLoss => "stop-loss",
            OrderType::StopLossLimit => "stop-loss-limit",
            OrderType::TakeProfit => "take-profit",
            OrderType::TakeProfitLimit => "take-profit-limit",
        }
    }
}

impl VenueCodec for Kraken {
    /// Most recent fill in the payload.
    fn parse_tick(&self, market: &str, payload: &[u8]) -> Result<Tick, ParseError> {
        self.parse_ticks(market, payload)?
            .pop()
            .ok_or_else(|| ParseError::InvalidData("trade update without fills".to_string()))
    }

    fn parse_ticks(&self, market: &str, payload: &[u8]) -> Result<Vec<Tick>, ParseError> {
        let message: ChannelMessage = serde_json::from_slice(payload)?;

        // Subscription acks carry `method`; heartbeat and status are channels.
        if message.method.is_some() {
            return Err(ParseError::Control);
        }
        match message.channel.as_deref() {
            Some("trade") => {}
            Some("heartbeat" | "status") => return Err(ParseError::Control),
            Some(other) => {
                return Err(ParseError::InvalidData(format!("unsupported channel: {other}")));
            }
            None => return Err(ParseError::InvalidData("missing channel".to_string())),
        }
        if message.data.is_empty() {
            return Err(ParseError::InvalidData("trade update without fills".to_string()));
        }

        message
            .data
            .into_iter()
            .map(|raw| {
                let trade: Trade = serde_json::from_value(raw)
                    .map_err(|e| ParseError::InvalidData(e.to_string()))?;
                if trade.price == 0.0 || trade.qty == 0.0 {
                    return Err(ParseError::InvalidData(
                        "price and volume must be non-zero".to_string(),
                    ));
                }
                Ok(Tick::new(market, trade.symbol, trade.price, trade.qty))
            })
            .collect()
    }

    fn stream_name(&self, trading_pair: &str) -> String {
        trading_pair.to_uppercase()
    }

    fn subscribe_frame(&self, stream: &str, request_id: u64) -> Option<Frame> {
        let frame = json!({
            "method": "subscribe",
            "params": {
                "channel": "trade",
                "symbol": [stream],
                "snapshot": false,
            },
            "req_id": request_id,
        });
        Some(Frame::Text(frame.to_string()))
    }
}

impl RequestFormatter for Kraken {
    fn format(&self, order: &OrderRequest) -> Result<FormattedRequest, OrderError> {
        if order.amount <= 0.0 {
            return Err(OrderError::Format(format!(
                "volume must be positive, got {}",
                order.amount
            )));
        }

        let mut params = vec![
            ("pair".to_string(), order.trading_pair.clone()),
            ("type".to_string(), order.side.as_str().to_lowercase()),
            (
                "ordertype".to_string(),
                Self::order_type(order.order_type).to_string(),
            ),
            ("volume".to_string(), order.amount.to_string()),
        ];
        if order.order_type.requires_price() {
            params.push(("price".to_string(), order.price.to_string()));
        }
        if order.order_type == OrderType::LimitMaker {
            params.push(("oflags".to_string(), "post".to_string()));
        }

        Ok(FormattedRequest {
            method: Method::POST,
            path: "/0/private/AddOrder".to_string(),
            body: RequestBody::Form(params),
        })
    }

    fn auth_header(&self, api_key: &str) -> (&'static str, String) {
        ("API-Key", api_key.to_string())
    }

    fn requires_signature(&self) -> bool {
        true
    }

    fn sign(&self, _request: &mut FormattedRequest, _api_secret: &str) -> Result<(), OrderError> {
        Err(OrderError::Signing(
            "kraken request signing is not supported".to_string(),
        ))
    }
}
