//! REST Order Executor
//!
//! Places orders over a venue's request/response API. Venue-specific request
//! shaping and signing live behind [`RequestFormatter`]; the executor owns
//! the HTTP client, authentication and status mapping.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};

use crate::application::ports::OrderError;
use crate::domain::order::OrderRequest;

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// JSON document.
    Json(serde_json::Value),
    /// Form parameters, sent `application/x-www-form-urlencoded` in order.
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// Value of a form parameter or top-level JSON string/number field.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Json(body) => body.get(key).map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            Self::Form(params) => params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
        }
    }
}

/// Join form parameters as `k1=v1&k2=v2`.
///
/// Values are written verbatim; venue symbols, numbers and client order ids
/// need no escaping.
#[must_use]
pub fn encode_form(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// A venue request ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedRequest {
    /// HTTP method.
    pub method: Method,
    /// Path appended to the base URL.
    pub path: String,
    /// Payload.
    pub body: RequestBody,
}

/// Shapes orders into venue requests.
pub trait RequestFormatter: Send + Sync {
    /// Build the request for `order`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Format`] for orders the venue cannot express.
    fn format(&self, order: &OrderRequest) -> Result<FormattedRequest, OrderError>;

    /// Header carrying the API key.
    fn auth_header(&self, api_key: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {api_key}"))
    }

    /// Whether orders must be signed with the API secret before sending.
    fn requires_signature(&self) -> bool {
        false
    }

    /// Sign a formatted request in place.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Signing`] if the request cannot be signed.
    fn sign(&self, _request: &mut FormattedRequest, _api_secret: &str) -> Result<(), OrderError> {
        Ok(())
    }
}

/// Executor settings.
#[derive(Clone)]
pub struct RestConfig {
    /// Base URL, e.g. `https://api.binance.com`.
    pub base_url: String,
    /// API key, sent on every request when set.
    pub api_key: Option<String>,
    /// API secret for venues that sign orders.
    pub api_secret: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// When false every order fails with [`OrderError::Disabled`].
    pub trading_enabled: bool,
}

impl std::fmt::Debug for RestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("trading_enabled", &self.trading_enabled)
            .finish()
    }
}

/// Sends formatted orders to a venue.
#[derive(Clone)]
pub struct RestExecutor {
    client: Client,
    config: RestConfig,
    formatter: Arc<dyn RequestFormatter>,
}

impl RestExecutor {
    /// Create an executor.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: RestConfig, formatter: Arc<dyn RequestFormatter>) -> Result<Self, OrderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OrderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            config,
            formatter,
        })
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Disabled`] when trading is off, the formatter's
    /// error, [`OrderError::Signing`] if a required signature cannot be made,
    /// [`OrderError::Transport`] if the request fails, or
    /// [`OrderError::Rejected`] for a non-success status.
    pub async fn execute(&self, order: &OrderRequest) -> Result<(), OrderError> {
        if !self.config.trading_enabled {
            return Err(OrderError::Disabled);
        }

        let mut request = self.formatter.format(order)?;
        if self.formatter.requires_signature() {
            let secret = self
                .config
                .api_secret
                .as_deref()
                .ok_or_else(|| OrderError::Signing("no API secret configured".to_string()))?;
            self.formatter.sign(&mut request, secret)?;
        }
        let url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            request.path
        );

        let mut builder = self.client.request(request.method.clone(), &url);
        if let Some(api_key) = &self.config.api_key {
            let (name, value) = self.formatter.auth_header(api_key);
            builder = builder.header(name, value);
        }
        match &request.body {
            RequestBody::Empty => {}
            RequestBody::Json(body) => builder = builder.json(body),
            RequestBody::Form(params) => {
                builder = builder
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(encode_form(params));
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| OrderError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(
                trading_pair = %order.trading_pair,
                side = %order.side,
                order_type = %order.order_type,
                amount = order.amount,
                "Order executed"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            trading_pair = %order.trading_pair,
            status = status.as_u16(),
            body = %body,
            "Order rejected"
        );
        Err(OrderError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

impl std::fmt::Debug for RestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderSide, OrderType};
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct PlainFormatter;

    impl RequestFormatter for PlainFormatter {
        fn format(&self, order: &OrderRequest) -> Result<FormattedRequest, OrderError> {
            Ok(FormattedRequest {
                method: Method::POST,
                path: "/orders".to_string(),
                body: RequestBody::Json(
                    json!({ "symbol": order.trading_pair, "quantity": order.amount }),
                ),
            })
        }
    }

    /// Form-encoded venue that appends the secret as its signature.
    struct SigningFormatter;

    impl RequestFormatter for SigningFormatter {
        fn format(&self, order: &OrderRequest) -> Result<FormattedRequest, OrderError> {
            Ok(FormattedRequest {
                method: Method::POST,
                path: "/signed".to_string(),
                body: RequestBody::Form(vec![(
                    "symbol".to_string(),
                    order.trading_pair.clone(),
                )]),
            })
        }

        fn requires_signature(&self) -> bool {
            true
        }

        fn sign(&self, request: &mut FormattedRequest, api_secret: &str) -> Result<(), OrderError> {
            let RequestBody::Form(params) = &mut request.body else {
                return Err(OrderError::Signing("expected form body".to_string()));
            };
            params.push(("signature".to_string(), api_secret.to_string()));
            Ok(())
        }
    }

    fn rest_config(base_url: String, trading_enabled: bool) -> RestConfig {
        RestConfig {
            base_url,
            api_key: Some("secret-key".to_string()),
            api_secret: Some("signing-secret".to_string()),
            timeout: Duration::from_secs(5),
            trading_enabled,
        }
    }

    fn executor(base_url: String, trading_enabled: bool) -> RestExecutor {
        RestExecutor::new(rest_config(base_url, trading_enabled), Arc::new(PlainFormatter)).unwrap()
    }

    fn order() -> OrderRequest {
        OrderRequest::new(OrderType::Market, OrderSide::Buy, "BTCUSDT", 0.5, 0.0)
    }

    #[tokio::test]
    async fn posts_formatted_order_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(header("Authorization", "Bearer secret-key"))
            .and(body_json(json!({ "symbol": "BTCUSDT", "quantity": 0.5 })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        executor(server.uri(), true).execute(&order()).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("insufficient balance"))
            .mount(&server)
            .await;

        let err = executor(server.uri(), true)
            .execute(&order())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::Rejected { status: 400, ref body } if body == "insufficient balance"
        ));
    }

    #[tokio::test]
    async fn disabled_trading_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = executor(server.uri(), false)
            .execute(&order())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Disabled));
    }

    #[tokio::test]
    async fn unreachable_venue_is_transport_error() {
        // Port 9 (discard) is closed on test hosts.
        let err = executor("http://127.0.0.1:9".to_string(), true)
            .execute(&order())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Transport(_)));
    }

    #[tokio::test]
    async fn signed_orders_are_form_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/signed"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("symbol=BTCUSDT&signature=signing-secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let executor =
            RestExecutor::new(rest_config(server.uri(), true), Arc::new(SigningFormatter)).unwrap();
        executor.execute(&order()).await.unwrap();
    }

    #[tokio::test]
    async fn signing_without_secret_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = RestConfig {
            api_secret: None,
            ..rest_config(server.uri(), true)
        };
        let executor = RestExecutor::new(config, Arc::new(SigningFormatter)).unwrap();
        let err = executor.execute(&order()).await.unwrap_err();
        assert!(matches!(err, OrderError::Signing(_)));
    }

    #[test]
    fn form_params_join_in_order() {
        let params = vec![
            ("symbol".to_string(), "BTCUSDT".to_string()),
            ("side".to_string(), "BUY".to_string()),
        ];
        assert_eq!(encode_form(&params), "symbol=BTCUSDT&side=BUY");
        assert_eq!(RequestBody::Form(params).param("side").as_deref(), Some("BUY"));
    }

    #[test]
    fn debug_redacts_credentials() {
        let debug = format!("{:?}", executor("http://localhost".to_string(), true));
        assert!(!debug.contains("secret-key"));
        assert!(!debug.contains("signing-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
