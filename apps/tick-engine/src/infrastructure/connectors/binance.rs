//! Binance spot venue.
//!
//! Streams `<symbol>@trade` events and places orders on `/api/v3/order`.
//! Trading pairs are Binance symbols (`BTCUSDT`). Orders are form encoded
//! and signed with HMAC-SHA256 over the full parameter string.

use hmac::{Hmac, Mac};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;

use super::{ParseError, VenueCodec};
use crate::application::ports::OrderError;
use crate::domain::market::Tick;
use crate::domain::order::{OrderRequest, OrderType};
use crate::infrastructure::rest::{FormattedRequest, RequestBody, RequestFormatter, encode_form};
use crate::infrastructure::stream::Frame;

type HmacSha256 = Hmac<Sha256>;

/// Milliseconds a signed request stays valid after its timestamp.
const RECV_WINDOW_MS: u64 = 5_000;

/// Binance codec and order formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Binance;

/// Raw trade event. Prices and quantities arrive as decimal strings.
#[derive(Debug, Deserialize)]
struct TradeEvent {
    #[serde(rename = "e")]
    event_type: String,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "q")]
    quantity: String,
}

fn parse_decimal(field: &str, value: &str) -> Result<f64, ParseError> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| ParseError::InvalidData(format!("{field} is not a number: {value}")))?;
    if parsed == 0.0 || !parsed.is_finite() {
        return Err(ParseError::InvalidData(format!("{field} must be non-zero")));
    }
    Ok(parsed)
}

/// Lowercase hex HMAC-SHA256 of `payload` keyed with `secret`.
fn signature_hex(secret: &str, payload: &str) -> Result<String, OrderError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| OrderError::Signing(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

impl VenueCodec for Binance {
    fn parse_tick(&self, market: &str, payload: &[u8]) -> Result<Tick, ParseError> {
        let mut message: Value = serde_json::from_slice(payload)?;

        // {"result": null, "id": 1}
        if message.get("id").is_some() && message.get("result").is_some() {
            return Err(ParseError::Control);
        }
        // Combined stream envelope: {"stream": "...", "data": {...}}
        if let Some(data) = message.get_mut("data") {
            message = data.take();
        }

        let event: TradeEvent = serde_json::from_value(message)
            .map_err(|e| ParseError::InvalidData(e.to_string()))?;
        if event.event_type != "trade" {
            return Err(ParseError::InvalidData(format!(
                "unsupported event type: {}",
                event.event_type
            )));
        }

        let price = parse_decimal("price", &event.price)?;
        let volume = parse_decimal("quantity", &event.quantity)?;
        Ok(Tick::new(market, event.symbol, price, volume))
    }

    fn stream_name(&self, trading_pair: &str) -> String {
        format!("{}@trade", trading_pair.to_lowercase())
    }

    fn subscribe_frame(&self, stream: &str, request_id: u64) -> Option<Frame> {
        let frame = json!({
            "method": "SUBSCRIBE",
            "params": [stream],
            "id": request_id,
        });
        Some(Frame::Text(frame.to_string()))
    }
}

impl RequestFormatter for Binance {
    fn format(&self, order: &OrderRequest) -> Result<FormattedRequest, OrderError> {
        if order.amount <= 0.0 {
            return Err(OrderError::Format(format!(
                "quantity must be positive, got {}",
                order.amount
            )));
        }

        let mut params = vec![
            ("symbol".to_string(), order.trading_pair.clone()),
            ("side".to_string(), order.side.as_str().to_string()),
            ("type".to_string(), order.order_type.as_str().to_string()),
            ("quantity".to_string(), order.amount.to_string()),
            (
                "newClientOrderId".to_string(),
                uuid::Uuid::new_v4().to_string(),
            ),
        ];
        if order.order_type.requires_price() {
            params.push(("price".to_string(), order.price.to_string()));
            if order.order_type != OrderType::LimitMaker {
                params.push(("timeInForce".to_string(), "GTC".to_string()));
            }
        }

        Ok(FormattedRequest {
            method: Method::POST,
            path: "/api/v3/order".to_string(),
            body: RequestBody::Form(params),
        })
    }

    fn auth_header(&self, api_key: &str) -> (&'static str, String) {
        ("X-MBX-APIKEY", api_key.to_string())
    }

    fn requires_signature(&self) -> bool {
        true
    }

    fn sign(&self, request: &mut FormattedRequest, api_secret: &str) -> Result<(), OrderError> {
        let RequestBody::Form(params) = &mut request.body else {
            return Err(OrderError::Signing(
                "binance orders must be form encoded".to_string(),
            ));
        };

        params.push(("recvWindow".to_string(), RECV_WINDOW_MS.to_string()));
        params.push((
            "timestamp".to_string(),
            chrono::Utc::now().timestamp_millis().to_string(),
        ));
        let signature = signature_hex(api_secret, &encode_form(params))?;
        params.push(("signature".to_string(), signature));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderSide;
    use test_case::test_case;

    #[test]
    fn parses_trade_event() {
        let payload = br#"{"e":"trade","E":1672515782136,"s":"BNBBTC","t":12345,"p":"0.001","q":"100","T":1672515782136,"m":true}"#;
        let tick = Binance.parse_tick("Binance", payload).unwrap();
        assert_eq!(tick.market(), "Binance");
        assert_eq!(tick.trading_pair(), "BNBBTC");
        assert_eq!(tick.price(), 0.001);
        assert_eq!(tick.volume(), 100.0);
    }

    #[test]
    fn unwraps_combined_stream() {
        let payload = br#"{"stream":"btcusdt@trade","data":{"e":"trade","s":"BTCUSDT","p":"42000.5","q":"0.25"}}"#;
        let tick = Binance.parse_tick("Binance", payload).unwrap();
        assert_eq!(tick.trading_pair(), "BTCUSDT");
        assert_eq!(tick.price(), 42_000.5);
    }

    #[test]
    fn subscription_ack_is_control() {
        let err = Binance
            .parse_tick("Binance", br#"{"result":null,"id":1}"#)
            .unwrap_err();
        assert!(matches!(err, ParseError::Control));
    }

    #[test_case(br#"{"e":"trade","s":"BTCUSDT","p":"0","q":"1"}"# ; "zero price")]
    #[test_case(br#"{"e":"trade","s":"BTCUSDT","p":"1","q":"0.0"}"# ; "zero quantity")]
    #[test_case(br#"{"e":"trade","s":"BTCUSDT","p":"abc","q":"1"}"# ; "non numeric price")]
    #[test_case(br#"{"e":"aggTrade","s":"BTCUSDT","p":"1","q":"1"}"# ; "other event")]
    #[test_case(br#"{"s":"BTCUSDT"}"# ; "missing fields")]
    fn rejects_invalid_trades(payload: &[u8]) {
        let err = Binance.parse_tick("Binance", payload).unwrap_err();
        assert!(matches!(err, ParseError::InvalidData(_)), "got {err:?}");
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(
            Binance.parse_tick("Binance", b"{"),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn stream_names_and_frames() {
        assert_eq!(Binance.stream_name("BTCUSDT"), "btcusdt@trade");
        let Some(Frame::Text(frame)) = Binance.subscribe_frame("btcusdt@trade", 3) else {
            panic!("expected text frame");
        };
        let frame: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            frame,
            json!({"method": "SUBSCRIBE", "params": ["btcusdt@trade"], "id": 3})
        );
    }

    #[test]
    fn formats_market_order() {
        let order = OrderRequest::new(OrderType::Market, OrderSide::Buy, "BTCUSDT", 0.5, 0.0);
        let request = Binance.format(&order).unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/api/v3/order");
        let body = &request.body;
        assert_eq!(body.param("symbol").as_deref(), Some("BTCUSDT"));
        assert_eq!(body.param("side").as_deref(), Some("BUY"));
        assert_eq!(body.param("type").as_deref(), Some("MARKET"));
        assert_eq!(body.param("quantity").as_deref(), Some("0.5"));
        assert!(body.param("price").is_none());
        assert!(body.param("newClientOrderId").is_some());
    }

    #[test_case(OrderType::Limit, Some("GTC") ; "limit")]
    #[test_case(OrderType::StopLossLimit, Some("GTC") ; "stop loss limit")]
    #[test_case(OrderType::LimitMaker, None ; "limit maker")]
    fn limit_orders_carry_price(order_type: OrderType, time_in_force: Option<&str>) {
        let order = OrderRequest::new(order_type, OrderSide::Sell, "ETHUSDT", 1.0, 2_500.5);
        let request = Binance.format(&order).unwrap();

        assert_eq!(request.body.param("price").as_deref(), Some("2500.5"));
        assert_eq!(request.body.param("timeInForce").as_deref(), time_in_force);
    }

    #[test]
    fn signature_matches_reference_vector() {
        // Example pair from the Binance signed endpoint documentation.
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let payload = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            signature_hex(secret, payload).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn sign_appends_timestamp_and_signature_last() {
        let order = OrderRequest::new(OrderType::Market, OrderSide::Buy, "BTCUSDT", 0.5, 0.0);
        let mut request = Binance.format(&order).unwrap();
        Binance.sign(&mut request, "secret").unwrap();

        let RequestBody::Form(params) = &request.body else {
            panic!("expected form body");
        };
        let (last, signature) = params.last().unwrap();
        assert_eq!(last, "signature");
        assert_eq!(signature.len(), 64);
        assert!(request.body.param("timestamp").unwrap().parse::<i64>().unwrap() > 0);
        assert_eq!(request.body.param("recvWindow").as_deref(), Some("5000"));

        let signed = encode_form(&params[..params.len() - 1]);
        assert_eq!(*signature, signature_hex("secret", &signed).unwrap());
    }

    #[test]
    fn requires_signature() {
        assert!(Binance.requires_signature());
        let mut request = FormattedRequest {
            method: Method::POST,
            path: "/api/v3/order".to_string(),
            body: RequestBody::Empty,
        };
        assert!(matches!(
            Binance.sign(&mut request, "secret"),
            Err(OrderError::Signing(_))
        ));
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let order = OrderRequest::new(OrderType::Market, OrderSide::Buy, "BTCUSDT", 0.0, 0.0);
        assert!(matches!(Binance.format(&order), Err(OrderError::Format(_))));
    }

    #[test]
    fn api_key_header() {
        assert_eq!(
            Binance.auth_header("k"),
            ("X-MBX-APIKEY", "k".to_string())
        );
    }
}
