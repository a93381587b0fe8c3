//! Tick Engine Binary
//!
//! Streams ticks from the configured venue, records them and runs the
//! built-in signals and handlers until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tick-engine
//! ```
//!
//! # Environment Variables
//!
//! - `TICK_ENGINE_VENUE`: binance | kraken | local (default: binance)
//! - `TICK_ENGINE_PAIRS`: Comma-separated trading pairs (default: BTCUSDT)
//! - `TICK_ENGINE_STREAM_URL` / `TICK_ENGINE_REST_URL`: Venue endpoints
//! - `TICK_ENGINE_API_KEY` / `TICK_ENGINE_API_SECRET`: Venue credentials; Binance
//!   signs orders with the secret
//! - `TICK_ENGINE_TRADING_ENABLED`: Allow order placement (default: false)
//! - `TICK_ENGINE_BUFFER_SIZE` / `TICK_ENGINE_THRESHOLD`: Fast tier sizing (500 / 200)
//! - `TICK_ENGINE_JOURNAL_PATH`: Durable journal (default: data/ticks.jsonl)
//! - `TICK_ENGINE_METRICS_PORT`: Prometheus port, 0 disables (default: 9091)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: `tick_engine=info`)

use std::sync::Arc;

use tick_engine::application::ports::{Connector, TickHandler};
use tick_engine::infrastructure::connectors::{
    Binance, Kraken, Local, VenueCodec, WebSocketConnector,
};
use tick_engine::infrastructure::rest::{RequestFormatter, RestExecutor};
use tick_engine::infrastructure::stream::{StreamingClient, WebSocketDialer};
use tick_engine::infrastructure::telemetry;
use tick_engine::{
    Ema, EngineConfig, JournalDurableStore, MovingAverageCrossover, Signal, Sma, TickEngine,
    TickLogger, TieredStore, Venue, init_metrics,
};
use tokio::signal;

const SHORT_MA: usize = 50;
const LONG_MA: usize = 200;
const EMA_PERIOD: usize = 20;

/// Units traded per crossover signal.
const CROSSOVER_AMOUNT: f64 = 1.0;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err("failed to install rustls crypto provider".into());
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Tick Engine");

    let config = EngineConfig::from_env()?;
    log_config(&config);

    if let Some(addr) = init_metrics(config.metrics_port)? {
        tracing::info!(%addr, "Metrics exporter listening");
    }

    let journal = Arc::new(JournalDurableStore::open(&config.store.journal_path).await?);
    let store = Arc::new(TieredStore::new(
        journal,
        config.store.buffer_size,
        config.store.threshold,
    )?);
    let engine = TickEngine::new(store);

    let connector = build_connector(&config)?;
    let market = connector.market().to_string();
    engine.register_connector(connector);

    let short_ma: Arc<dyn Signal> = Arc::new(Sma::new(SHORT_MA));
    let long_ma: Arc<dyn Signal> = Arc::new(Sma::new(LONG_MA));
    let ema: Arc<dyn Signal> = Arc::new(Ema::new(EMA_PERIOD));
    let logger: Arc<dyn TickHandler> = Arc::new(TickLogger);
    let crossover: Arc<dyn TickHandler> = Arc::new(MovingAverageCrossover::new(
        format!("SMA_{SHORT_MA}"),
        format!("SMA_{LONG_MA}"),
        CROSSOVER_AMOUNT,
    ));

    for pair in &config.pairs {
        engine.register_signal(&market, pair, Arc::clone(&short_ma));
        engine.register_signal(&market, pair, Arc::clone(&long_ma));
        engine.register_signal(&market, pair, Arc::clone(&ema));
        engine.register_handler(&market, pair, Arc::clone(&logger));
        if config.trading_enabled {
            engine.register_handler(&market, pair, Arc::clone(&crossover));
        }
    }

    engine.start().await?;
    tracing::info!(market = %market, pairs = config.pairs.len(), "Tick engine running");

    await_shutdown().await;

    engine.stop().await;
    tracing::info!("Tick engine stopped");
    Ok(())
}

/// Build the connector for the configured venue.
fn build_connector(config: &EngineConfig) -> Result<Arc<dyn Connector>, Box<dyn std::error::Error>> {
    let (codec, formatter): (Arc<dyn VenueCodec>, Arc<dyn RequestFormatter>) = match config.venue {
        Venue::Binance => (Arc::new(Binance), Arc::new(Binance)),
        Venue::Kraken => (Arc::new(Kraken), Arc::new(Kraken)),
        Venue::Local => (Arc::new(Local), Arc::new(Local)),
    };

    let client = Arc::new(StreamingClient::new(
        config.stream_config(),
        Arc::new(WebSocketDialer),
    ));
    let executor = RestExecutor::new(config.rest_config(), formatter)?;

    Ok(Arc::new(WebSocketConnector::new(
        config.venue.market_name(),
        client,
        codec,
        executor,
        config.pairs.clone(),
    )))
}

/// Log the parsed configuration.
fn log_config(config: &EngineConfig) {
    tracing::info!(
        venue = config.venue.as_str(),
        pairs = ?config.pairs,
        buffer_size = config.store.buffer_size,
        threshold = config.store.threshold,
        trading_enabled = config.trading_enabled,
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        stream_url = %config.stream_url,
        rest_url = %config.rest_url,
        journal = %config.store.journal_path.display(),
        "Endpoints"
    );
}

/// Load .env from the current directory or the nearest ancestor holding one.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
