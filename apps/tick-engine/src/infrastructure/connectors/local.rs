//! Local venue.
//!
//! A development exchange that pushes flat JSON ticks for every pair without
//! per-stream subscriptions, and accepts orders on `/api/v1/order`.

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use super::{ParseError, VenueCodec};
use crate::application::ports::OrderError;
use crate::domain::market::Tick;
use crate::domain::order::OrderRequest;
use crate::infrastructure::rest::{FormattedRequest, RequestBody, RequestFormatter};
use crate::infrastructure::stream::Frame;

/// Local venue codec and order formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Local;

#[derive(Debug, Deserialize)]
struct LocalTick {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    price: f64,
    #[serde(default)]
    volume: f64,
}

impl VenueCodec for Local {
    fn parse_tick(&self, market: &str, payload: &[u8]) -> Result<Tick, ParseError> {
        let raw: LocalTick = serde_json::from_slice(payload)?;
        if raw.price == 0.0 || raw.volume == 0.0 {
            return Err(ParseError::InvalidData(
                "price and volume must be non-zero".to_string(),
            ));
        }
        if raw.symbol.is_empty() {
            return Err(ParseError::InvalidData("missing symbol".to_string()));
        }
        Ok(Tick::new(market, raw.symbol, raw.price, raw.volume))
    }

    fn stream_name(&self, trading_pair: &str) -> String {
        trading_pair.to_string()
    }

    fn subscribe_frame(&self, _stream: &str, _request_id: u64) -> Option<Frame> {
        None
    }
}

impl RequestFormatter for Local {
    fn format(&self, order: &OrderRequest) -> Result<FormattedRequest, OrderError> {
        let mut body = json!({
            "symbol": order.trading_pair,
            "side": order.side.as_str(),
            "type": order.order_type.as_str(),
            "quantity": order.amount,
        });
        if order.order_type.requires_price() {
            body["price"] = json!(order.price);
        }

        Ok(FormattedRequest {
            method: Method::POST,
            path: "/api/v1/order".to_string(),
            body: RequestBody::Json(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderSide, OrderType};
    use test_case::test_case;

    #[test]
    fn parses_flat_tick() {
        let tick = Local
            .parse_tick("Local", br#"{"symbol":"BTC/USDT","price":100.5,"volume":3}"#)
            .unwrap();
        assert_eq!(tick.trading_pair(), "BTC/USDT");
        assert_eq!(tick.price(), 100.5);
        assert_eq!(tick.volume(), 3.0);
    }

    #[test_case(br#"{"symbol":"BTC/USDT","price":0,"volume":3}"# ; "zero price")]
    #[test_case(br#"{"symbol":"BTC/USDT","price":1}"# ; "missing volume")]
    #[test_case(br#"{"price":1,"volume":1}"# ; "missing symbol")]
    fn rejects_incomplete_ticks(payload: &[u8]) {
        assert!(matches!(
            Local.parse_tick("Local", payload),
            Err(ParseError::InvalidData(_))
        ));
    }

    #[test]
    fn non_numeric_price_is_json_error() {
        assert!(matches!(
            Local.parse_tick("Local", br#"{"symbol":"X","price":"1","volume":1}"#),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn streams_need_no_subscribe_frame() {
        assert_eq!(Local.stream_name("BTC/USDT"), "BTC/USDT");
        assert_eq!(Local.subscribe_frame("BTC/USDT", 1), None);
    }

    #[test_case(OrderType::Market, false ; "market")]
    #[test_case(OrderType::Limit, true ; "limit")]
    #[test_case(OrderType::StopLoss, false ; "stop loss")]
    #[test_case(OrderType::TakeProfitLimit, true ; "take profit limit")]
    fn price_only_for_limit_styles(order_type: OrderType, has_price: bool) {
        let order = OrderRequest::new(order_type, OrderSide::Buy, "BTC/USDT", 2.0, 99.0);
        let request = Local.format(&order).unwrap();

        assert_eq!(request.path, "/api/v1/order");
        let RequestBody::Json(body) = &request.body else {
            panic!("expected JSON body");
        };
        assert_eq!(body["type"], order_type.as_str());
        assert_eq!(body["quantity"], 2.0);
        assert_eq!(body.get("price").is_some(), has_price);
        assert!(!Local.requires_signature());
    }

    #[test]
    fn uses_bearer_auth() {
        assert_eq!(
            Local.auth_header("k"),
            ("Authorization", "Bearer k".to_string())
        );
    }
}
