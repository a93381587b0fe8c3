//! Engine Configuration Settings
//!
//! Configuration types for the tick engine, loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::infrastructure::rest::RestConfig;
use crate::infrastructure::stream::{BackoffConfig, HeartbeatConfig, StreamConfig};

/// Per-request timeout for venue REST calls.
const REST_TIMEOUT: Duration = Duration::from_secs(10);

/// Venue the engine connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Venue {
    /// Binance spot trade streams.
    #[default]
    Binance,
    /// Kraken v2 trade channel.
    Kraken,
    /// Local simulator speaking the plain tick format.
    Local,
}

impl Venue {
    /// Parse a venue name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unknown names.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "kraken" => Ok(Self::Kraken),
            "local" => Ok(Self::Local),
            _ => Err(ConfigError::InvalidValue {
                key: "TICK_ENGINE_VENUE".to_string(),
                value: s.to_string(),
            }),
        }
    }

    /// Lowercase identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Kraken => "kraken",
            Self::Local => "local",
        }
    }

    /// Market name carried on ticks and market keys.
    #[must_use]
    pub const fn market_name(&self) -> &'static str {
        match self {
            Self::Binance => "Binance",
            Self::Kraken => "Kraken",
            Self::Local => "Local",
        }
    }

    const fn default_stream_url(self) -> &'static str {
        match self {
            Self::Binance => "wss://stream.binance.com:9443/ws",
            Self::Kraken => "wss://ws.kraken.com/v2",
            Self::Local => "ws://127.0.0.1:8765",
        }
    }

    const fn default_rest_url(self) -> &'static str {
        match self {
            Self::Binance => "https://api.binance.com",
            Self::Kraken => "https://api.kraken.com",
            Self::Local => "http://127.0.0.1:8080",
        }
    }
}

/// Venue API credentials.
#[derive(Clone, Default)]
pub struct Credentials {
    api_key: Option<String>,
    api_secret: Option<String>,
}

impl Credentials {
    /// Create credentials; empty strings count as unset.
    #[must_use]
    pub fn new(api_key: Option<String>, api_secret: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            api_secret: api_secret.filter(|s| !s.is_empty()),
        }
    }

    /// API key, if configured.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// API secret, if configured.
    #[must_use]
    pub fn api_secret(&self) -> Option<&str> {
        self.api_secret.as_deref()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Streaming connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Upper bound on a single dial.
    pub connect_timeout: Duration,
    /// Maximum connection age before a proactive reconnect.
    pub connection_lifetime: Duration,
    /// Interval between keepalive pings.
    pub ping_interval: Duration,
    /// Silence after an unanswered ping that forces a reconnect.
    pub pong_timeout: Duration,
    /// Maximum inbound messages per second (0 = unlimited).
    pub rate_limit: u32,
    /// Maximum logical streams per connection.
    pub max_streams: usize,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            connection_lifetime: Duration::from_secs(86_400),
            ping_interval: Duration::from_secs(180),
            pong_timeout: Duration::from_secs(600),
            rate_limit: 10,
            max_streams: 200,
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
        }
    }
}

/// Tiered store settings.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Fast-tier ring buffer capacity per market key.
    pub buffer_size: usize,
    /// Largest period served from the fast tier.
    pub threshold: usize,
    /// Durable journal file.
    pub journal_path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            buffer_size: 500,
            threshold: 200,
            journal_path: PathBuf::from("data/ticks.jsonl"),
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Venue to connect to.
    pub venue: Venue,
    /// WebSocket endpoint.
    pub stream_url: String,
    /// REST endpoint for orders.
    pub rest_url: String,
    /// API credentials.
    pub credentials: Credentials,
    /// Trading pairs to subscribe.
    pub pairs: Vec<String>,
    /// Streaming connection settings.
    pub stream: StreamSettings,
    /// Tiered store settings.
    pub store: StoreSettings,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
    /// Whether handlers may place orders.
    pub trading_enabled: bool,
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is invalid, a duration is zero, or
    /// trading is enabled without the credentials the venue needs.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`EngineConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Lookup(lookup);

        let venue = env
            .get("TICK_ENGINE_VENUE")
            .map_or(Ok(Venue::default()), |v| Venue::parse(&v))?;

        let stream_url = env
            .get("TICK_ENGINE_STREAM_URL")
            .unwrap_or_else(|| venue.default_stream_url().to_string());
        let rest_url = env
            .get("TICK_ENGINE_REST_URL")
            .unwrap_or_else(|| venue.default_rest_url().to_string());

        let credentials = Credentials::new(
            env.get("TICK_ENGINE_API_KEY"),
            env.get("TICK_ENGINE_API_SECRET"),
        );

        let pairs: Vec<String> = env
            .get("TICK_ENGINE_PAIRS")
            .unwrap_or_else(|| "BTCUSDT".to_string())
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ToString::to_string)
            .collect();
        if pairs.is_empty() {
            return Err(ConfigError::EmptyValue("TICK_ENGINE_PAIRS".to_string()));
        }

        let defaults = StreamSettings::default();
        let stream = StreamSettings {
            connect_timeout: env.secs("TICK_ENGINE_CONNECT_TIMEOUT_SECS", defaults.connect_timeout),
            connection_lifetime: env.secs(
                "TICK_ENGINE_CONNECTION_LIFETIME_SECS",
                defaults.connection_lifetime,
            ),
            ping_interval: env.secs("TICK_ENGINE_PING_INTERVAL_SECS", defaults.ping_interval),
            pong_timeout: env.secs("TICK_ENGINE_PONG_TIMEOUT_SECS", defaults.pong_timeout),
            rate_limit: env.parse("TICK_ENGINE_RATE_LIMIT", defaults.rate_limit),
            max_streams: env.parse("TICK_ENGINE_MAX_STREAMS", defaults.max_streams),
            reconnect_delay_initial: env.millis(
                "TICK_ENGINE_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: env.secs(
                "TICK_ENGINE_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: env.parse(
                "TICK_ENGINE_RECONNECT_DELAY_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
        };
        for (key, value) in [
            ("TICK_ENGINE_CONNECT_TIMEOUT_SECS", stream.connect_timeout),
            ("TICK_ENGINE_CONNECTION_LIFETIME_SECS", stream.connection_lifetime),
            ("TICK_ENGINE_PING_INTERVAL_SECS", stream.ping_interval),
            ("TICK_ENGINE_PONG_TIMEOUT_SECS", stream.pong_timeout),
            ("TICK_ENGINE_RECONNECT_DELAY_INITIAL_MS", stream.reconnect_delay_initial),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: "0".to_string(),
                });
            }
        }

        let defaults = StoreSettings::default();
        let store = StoreSettings {
            buffer_size: env.parse("TICK_ENGINE_BUFFER_SIZE", defaults.buffer_size),
            threshold: env.parse("TICK_ENGINE_THRESHOLD", defaults.threshold),
            journal_path: env
                .get("TICK_ENGINE_JOURNAL_PATH")
                .map_or(defaults.journal_path, PathBuf::from),
        };
        if store.buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TICK_ENGINE_BUFFER_SIZE".to_string(),
                value: "0".to_string(),
            });
        }
        if store.threshold > store.buffer_size {
            return Err(ConfigError::InvalidValue {
                key: "TICK_ENGINE_THRESHOLD".to_string(),
                value: store.threshold.to_string(),
            });
        }

        let trading_enabled = env
            .get("TICK_ENGINE_TRADING_ENABLED")
            .is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"));
        if trading_enabled {
            if credentials.api_key().is_none() {
                return Err(ConfigError::MissingEnvVar("TICK_ENGINE_API_KEY".to_string()));
            }
            match venue {
                Venue::Binance if credentials.api_secret().is_none() => {
                    return Err(ConfigError::MissingEnvVar(
                        "TICK_ENGINE_API_SECRET".to_string(),
                    ));
                }
                Venue::Kraken => {
                    return Err(ConfigError::InvalidValue {
                        key: "TICK_ENGINE_TRADING_ENABLED".to_string(),
                        value: "kraken order signing is not supported".to_string(),
                    });
                }
                Venue::Binance | Venue::Local => {}
            }
        }

        Ok(Self {
            venue,
            stream_url,
            rest_url,
            credentials,
            pairs,
            stream,
            store,
            metrics_port: env.parse("TICK_ENGINE_METRICS_PORT", 9091),
            trading_enabled,
        })
    }

    /// Streaming client configuration for the selected venue.
    #[must_use]
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            connect_timeout: self.stream.connect_timeout,
            connection_lifetime: self.stream.connection_lifetime,
            heartbeat: HeartbeatConfig {
                ping_interval: self.stream.ping_interval,
                pong_timeout: self.stream.pong_timeout,
            },
            rate_limit: self.stream.rate_limit,
            max_streams: self.stream.max_streams,
            backoff: BackoffConfig {
                initial_delay: self.stream.reconnect_delay_initial,
                max_delay: self.stream.reconnect_delay_max,
                multiplier: self.stream.reconnect_delay_multiplier,
                ..BackoffConfig::default()
            },
            ..StreamConfig::new(self.venue.market_name(), &self.stream_url)
        }
    }

    /// REST executor configuration for the selected venue.
    #[must_use]
    pub fn rest_config(&self) -> RestConfig {
        RestConfig {
            base_url: self.rest_url.clone(),
            api_key: self.credentials.api_key().map(ToString::to_string),
            api_secret: self.credentials.api_secret().map(ToString::to_string),
            timeout: REST_TIMEOUT,
            trading_enabled: self.trading_enabled,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable holds an unusable value.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

/// Typed reads over a variable source. Unparsable values fall back to the default.
struct Lookup<F>(F);

impl<F: Fn(&str) -> Option<String>> Lookup<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn secs(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use test_case::test_case;

    fn config(vars: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.venue, Venue::Binance);
        assert_eq!(config.stream_url, "wss://stream.binance.com:9443/ws");
        assert_eq!(config.pairs, vec!["BTCUSDT"]);
        assert_eq!(config.store.buffer_size, 500);
        assert_eq!(config.store.threshold, 200);
        assert_eq!(config.stream.connection_lifetime, Duration::from_secs(86_400));
        assert_eq!(config.stream.ping_interval, Duration::from_secs(180));
        assert_eq!(config.stream.pong_timeout, Duration::from_secs(600));
        assert_eq!(config.stream.rate_limit, 10);
        assert_eq!(config.stream.max_streams, 200);
        assert_eq!(config.metrics_port, 9091);
        assert!(!config.trading_enabled);
    }

    #[test]
    fn venue_parsing() {
        assert_eq!(Venue::parse("BINANCE").unwrap(), Venue::Binance);
        assert_eq!(Venue::parse(" local ").unwrap(), Venue::Local);
        assert_eq!(Venue::parse("Kraken").unwrap(), Venue::Kraken);
        assert!(matches!(
            Venue::parse("coinbase"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn local_venue_uses_local_endpoints() {
        let config = config(&[("TICK_ENGINE_VENUE", "local")]).unwrap();
        assert_eq!(config.stream_url, "ws://127.0.0.1:8765");
        assert_eq!(config.rest_url, "http://127.0.0.1:8080");
        assert_eq!(config.stream_config().name, "Local");
    }

    #[test]
    fn pairs_are_trimmed_and_split() {
        let config = config(&[("TICK_ENGINE_PAIRS", "BTCUSDT, ETHUSDT ,,SOLUSDT")]).unwrap();
        assert_eq!(config.pairs, vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
    }

    #[test]
    fn empty_pair_list_rejected() {
        assert!(matches!(
            config(&[("TICK_ENGINE_PAIRS", " , ")]),
            Err(ConfigError::EmptyValue(_))
        ));
    }

    #[test]
    fn threshold_above_buffer_rejected() {
        let result = config(&[
            ("TICK_ENGINE_BUFFER_SIZE", "100"),
            ("TICK_ENGINE_THRESHOLD", "150"),
        ]);
        assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "TICK_ENGINE_THRESHOLD"));
    }

    #[test]
    fn trading_requires_api_key() {
        assert!(matches!(
            config(&[("TICK_ENGINE_TRADING_ENABLED", "true")]),
            Err(ConfigError::MissingEnvVar(key)) if key == "TICK_ENGINE_API_KEY"
        ));

        let config = config(&[
            ("TICK_ENGINE_TRADING_ENABLED", "true"),
            ("TICK_ENGINE_API_KEY", "key"),
            ("TICK_ENGINE_API_SECRET", "secret"),
        ])
        .unwrap();
        assert!(config.trading_enabled);
        let rest = config.rest_config();
        assert_eq!(rest.api_key.as_deref(), Some("key"));
        assert_eq!(rest.api_secret.as_deref(), Some("secret"));
    }

    #[test]
    fn binance_trading_requires_api_secret() {
        assert!(matches!(
            config(&[
                ("TICK_ENGINE_TRADING_ENABLED", "true"),
                ("TICK_ENGINE_API_KEY", "key"),
            ]),
            Err(ConfigError::MissingEnvVar(key)) if key == "TICK_ENGINE_API_SECRET"
        ));

        let local = config(&[
            ("TICK_ENGINE_VENUE", "local"),
            ("TICK_ENGINE_TRADING_ENABLED", "true"),
            ("TICK_ENGINE_API_KEY", "key"),
        ])
        .unwrap();
        assert!(local.rest_config().api_secret.is_none());
    }

    #[test]
    fn kraken_streams_but_does_not_trade() {
        let kraken = config(&[("TICK_ENGINE_VENUE", "kraken"), ("TICK_ENGINE_PAIRS", "BTC/USD")]).unwrap();
        assert_eq!(kraken.stream_url, "wss://ws.kraken.com/v2");
        assert_eq!(kraken.rest_url, "https://api.kraken.com");
        assert_eq!(kraken.stream_config().name, "Kraken");

        let trading = config(&[
            ("TICK_ENGINE_VENUE", "kraken"),
            ("TICK_ENGINE_TRADING_ENABLED", "true"),
            ("TICK_ENGINE_API_KEY", "key"),
            ("TICK_ENGINE_API_SECRET", "secret"),
        ]);
        assert!(matches!(
            trading,
            Err(ConfigError::InvalidValue { key, .. }) if key == "TICK_ENGINE_TRADING_ENABLED"
        ));
    }

    #[test_case("TICK_ENGINE_CONNECT_TIMEOUT_SECS" ; "connect timeout")]
    #[test_case("TICK_ENGINE_CONNECTION_LIFETIME_SECS" ; "connection lifetime")]
    #[test_case("TICK_ENGINE_PING_INTERVAL_SECS" ; "ping interval")]
    #[test_case("TICK_ENGINE_PONG_TIMEOUT_SECS" ; "pong timeout")]
    #[test_case("TICK_ENGINE_RECONNECT_DELAY_INITIAL_MS" ; "initial reconnect delay")]
    fn zero_durations_rejected(var: &str) {
        let result = config(&[(var, "0")]);
        assert!(
            matches!(&result, Err(ConfigError::InvalidValue { key, value }) if key == var && value == "0"),
            "got {result:?}"
        );
    }

    #[test]
    fn accepted_config_yields_valid_stream_config() {
        let config = config(&[
            ("TICK_ENGINE_CONNECTION_LIFETIME_SECS", "1"),
            ("TICK_ENGINE_PING_INTERVAL_SECS", "1"),
        ])
        .unwrap();
        assert!(config.stream_config().validate().is_ok());
    }

    #[test]
    fn stream_config_carries_overrides() {
        let config = config(&[
            ("TICK_ENGINE_PING_INTERVAL_SECS", "5"),
            ("TICK_ENGINE_PONG_TIMEOUT_SECS", "20"),
            ("TICK_ENGINE_RECONNECT_DELAY_INITIAL_MS", "100"),
            ("TICK_ENGINE_RATE_LIMIT", "0"),
        ])
        .unwrap();
        let stream = config.stream_config();
        assert_eq!(stream.heartbeat.ping_interval, Duration::from_secs(5));
        assert_eq!(stream.heartbeat.pong_timeout, Duration::from_secs(20));
        assert_eq!(stream.backoff.initial_delay, Duration::from_millis(100));
        assert_eq!(stream.rate_limit, 0);
        assert_eq!(stream.url, "wss://stream.binance.com:9443/ws");
    }

    #[test]
    fn unparsable_numbers_fall_back() {
        let config = config(&[("TICK_ENGINE_MAX_STREAMS", "lots")]).unwrap();
        assert_eq!(config.stream.max_streams, 200);
    }

    #[test]
    fn credentials_redacted_debug() {
        let creds = Credentials::new(Some("key123".to_string()), Some("secret456".to_string()));
        let debug = format!("{creds:?}");
        assert!(!debug.contains("key123"));
        assert!(!debug.contains("secret456"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn empty_credentials_are_unset() {
        let creds = Credentials::new(Some(String::new()), None);
        assert!(creds.api_key().is_none());
        assert!(creds.api_secret().is_none());
    }
}
