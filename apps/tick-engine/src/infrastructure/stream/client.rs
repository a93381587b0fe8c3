//! Reconnecting Streaming Client
//!
//! One long-lived duplex connection with a connect/reconnect state machine,
//! keepalive pings, a maximum connection age, an inbound rate gate and a
//! bounded set of logical streams multiplexed over the connection.
//!
//! # State Machine
//!
//! ```text
//! Disconnected ──connect──► Connecting ──ok──► Connected ──┐
//!      ▲                        │                  ▲       │ read failure,
//!      └────────── error ───────┘                  │       │ pong timeout,
//!                                                  │       ▼ lifetime expiry
//!                                                  └── Reconnecting
//!
//! any state ──stop──► Closed
//! ```
//!
//! # Concurrency
//!
//! After [`StreamingClient::start`] three loops run: read, keepalive and
//! lifetime. They share one async lock guarding the transport, and every
//! reconnect happens under it. Each successful connect bumps a generation
//! counter; a reconnect requested for a generation that has already been
//! replaced is skipped, so concurrent failure detections produce exactly one
//! reconnect. [`StreamingClient::stop`] cancels and closes under the same
//! lock, then joins the loops.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::backoff::{Backoff, BackoffConfig};
use super::heartbeat::{HeartbeatCheck, HeartbeatConfig, HeartbeatState};
use super::rate_limit::RateGate;
use super::transport::{Dialer, Frame, FrameSink, FrameSource, TransportError};
use crate::infrastructure::metrics::{self, ReconnectReason};

// =============================================================================
// Configuration
// =============================================================================

/// Streaming client configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Label used in logs and metrics.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// Upper bound on a single dial.
    pub connect_timeout: Duration,
    /// Maximum connection age before a proactive reconnect.
    pub connection_lifetime: Duration,
    /// Keepalive timing.
    pub heartbeat: HeartbeatConfig,
    /// Maximum inbound messages per second (0 = unlimited).
    pub rate_limit: u32,
    /// Maximum logical streams on the connection.
    pub max_streams: usize,
    /// Delay between failed reconnect attempts.
    pub backoff: BackoffConfig,
}

impl StreamConfig {
    /// Configuration with the default venue limits.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
            connection_lifetime: Duration::from_secs(24 * 60 * 60),
            heartbeat: HeartbeatConfig::default(),
            rate_limit: 10,
            max_streams: 200,
            backoff: BackoffConfig::default(),
        }
    }

    /// Check that every timer this configuration drives is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`StreamClientError::InvalidConfig`] naming the first zero
    /// duration.
    pub fn validate(&self) -> Result<(), StreamClientError> {
        for (field, value) in [
            ("connect_timeout", self.connect_timeout),
            ("connection_lifetime", self.connection_lifetime),
            ("ping_interval", self.heartbeat.ping_interval),
            ("pong_timeout", self.heartbeat.pong_timeout),
            ("backoff initial_delay", self.backoff.initial_delay),
        ] {
            if value.is_zero() {
                return Err(StreamClientError::InvalidConfig(format!(
                    "{field} must be non-zero"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Types
// =============================================================================

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection.
    Disconnected,
    /// Dialing.
    Connecting,
    /// Connected and streaming.
    Connected,
    /// Replacing a failed or expired connection.
    Reconnecting,
    /// Stopped for good.
    Closed,
}

impl ConnectionState {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }

    const fn gauge_value(self) -> f64 {
        match self {
            Self::Disconnected => 0.0,
            Self::Connecting => 1.0,
            Self::Connected => 2.0,
            Self::Reconnecting => 3.0,
            Self::Closed => 4.0,
        }
    }
}

/// Streaming client error.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// Dialing or writing failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The connection already carries the maximum number of streams.
    #[error("stream limit reached (max {max})")]
    StreamLimitReached {
        /// Configured maximum.
        max: usize,
    },

    /// `start` was already called.
    #[error("client already started")]
    AlreadyStarted,

    /// The client was stopped.
    #[error("client closed")]
    Closed,

    /// The configuration cannot drive a connection.
    #[error("invalid stream configuration: {0}")]
    InvalidConfig(String),
}

/// Consumer of inbound payloads.
///
/// Exactly one handler receives every text and binary payload, in arrival
/// order. The read loop awaits each call before reading on.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one payload.
    async fn handle_message(&self, payload: &[u8]);
}

#[derive(Default)]
struct Link {
    sink: Option<Box<dyn FrameSink>>,
    source: Option<Box<dyn FrameSource>>,
    connected_at: Option<Instant>,
}

enum Drain {
    Cancelled,
    Replaced,
    Ended(String),
}

// =============================================================================
// Client
// =============================================================================

/// Reconnecting streaming client.
pub struct StreamingClient {
    config: StreamConfig,
    dialer: Arc<dyn Dialer>,
    link: Mutex<Link>,
    state: parking_lot::Mutex<ConnectionState>,
    generation: watch::Sender<u64>,
    heartbeat: HeartbeatState,
    streams: parking_lot::Mutex<Vec<(String, Option<Frame>)>>,
    cancel: CancellationToken,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl StreamingClient {
    /// Create a disconnected client. Nothing is spawned until
    /// [`StreamingClient::start`].
    #[must_use]
    pub fn new(config: StreamConfig, dialer: Arc<dyn Dialer>) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            config,
            dialer,
            link: Mutex::new(Link::default()),
            state: parking_lot::Mutex::new(ConnectionState::Disconnected),
            generation,
            heartbeat: HeartbeatState::new(),
            streams: parking_lot::Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
            tasks: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Identifier of the current physical connection (0 before the first
    /// connect).
    #[must_use]
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Number of logical streams.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.lock().len()
    }

    /// Open the connection.
    ///
    /// No retry happens here; a failure is returned to the caller. Calling
    /// this on a connected client is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StreamClientError::InvalidConfig`] for a configuration with
    /// a zero timer, [`StreamClientError::Closed`] after `stop`, or the dial
    /// error.
    pub async fn connect(&self) -> Result<(), StreamClientError> {
        self.config.validate()?;
        let mut link = self.link.lock().await;
        match self.state() {
            ConnectionState::Closed => return Err(StreamClientError::Closed),
            ConnectionState::Connected => return Ok(()),
            _ => {}
        }
        self.establish(&mut link, ConnectionState::Disconnected)
            .await
    }

    /// Replace the connection observed at `observed_generation`.
    ///
    /// Returns `Ok(false)` without touching the transport if that connection
    /// was already replaced or the client is stopped.
    ///
    /// # Errors
    ///
    /// Returns the dial error; the client stays `Reconnecting` until the
    /// next attempt.
    pub async fn reconnect(
        &self,
        observed_generation: u64,
        reason: ReconnectReason,
    ) -> Result<bool, StreamClientError> {
        let mut link = self.link.lock().await;
        if self.cancel.is_cancelled() {
            return Ok(false);
        }
        if self.generation() != observed_generation {
            tracing::debug!(
                stream = %self.config.name,
                observed_generation,
                current_generation = self.generation(),
                "Connection already replaced, skipping reconnect"
            );
            return Ok(false);
        }

        tracing::info!(
            stream = %self.config.name,
            generation = observed_generation,
            reason = reason.as_str(),
            "Reconnecting"
        );
        metrics::record_reconnect(&self.config.name, reason);
        self.set_state(ConnectionState::Reconnecting);
        self.teardown(&mut link).await;

        match self
            .establish(&mut link, ConnectionState::Reconnecting)
            .await
        {
            Ok(()) => Ok(true),
            Err(e) => {
                metrics::record_reconnect_failure(&self.config.name);
                tracing::warn!(stream = %self.config.name, error = %e, "Reconnect failed");
                Err(e)
            }
        }
    }

    /// Spawn the read, keepalive and lifetime loops.
    ///
    /// # Errors
    ///
    /// Returns [`StreamClientError::InvalidConfig`] for a configuration with
    /// a zero timer, [`StreamClientError::Closed`] after `stop` and
    /// [`StreamClientError::AlreadyStarted`] on a second call.
    pub fn start(self: &Arc<Self>, handler: Arc<dyn MessageHandler>) -> Result<(), StreamClientError> {
        self.config.validate()?;
        if self.cancel.is_cancelled() {
            return Err(StreamClientError::Closed);
        }
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return Err(StreamClientError::AlreadyStarted);
        }

        tasks.push(tokio::spawn(Arc::clone(self).read_loop(handler)));
        tasks.push(tokio::spawn(Arc::clone(self).keepalive_loop()));
        tasks.push(tokio::spawn(Arc::clone(self).lifetime_loop()));
        drop(tasks);

        tracing::info!(stream = %self.config.name, "Streaming client started");
        Ok(())
    }

    /// Stop the client. Idempotent.
    ///
    /// Once this returns no handler invocation is in progress or will start.
    pub async fn stop(&self) {
        {
            let mut link = self.link.lock().await;
            if self.state() != ConnectionState::Closed {
                self.cancel.cancel();
                self.teardown(&mut link).await;
                self.set_state(ConnectionState::Closed);
                tracing::info!(stream = %self.config.name, "Streaming client stopped");
            }
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await
                && e.is_panic()
            {
                tracing::error!(stream = %self.config.name, error = %e, "Client task panicked");
            }
        }
    }

    /// Add a logical stream, sending its subscribe frame if connected.
    ///
    /// The frame is replayed after every reconnect. Re-subscribing an
    /// existing stream replaces its frame and does not use another slot.
    ///
    /// # Errors
    ///
    /// Returns [`StreamClientError::StreamLimitReached`] when all slots are
    /// taken, or the send error.
    pub async fn subscribe(
        &self,
        stream: impl Into<String>,
        frame: Option<Frame>,
    ) -> Result<(), StreamClientError> {
        let stream = stream.into();
        {
            let mut streams = self.streams.lock();
            if let Some(entry) = streams.iter_mut().find(|(name, _)| *name == stream) {
                entry.1.clone_from(&frame);
            } else if streams.len() >= self.config.max_streams {
                return Err(StreamClientError::StreamLimitReached {
                    max: self.config.max_streams,
                });
            } else {
                streams.push((stream.clone(), frame.clone()));
            }
        }
        tracing::debug!(stream = %self.config.name, subscription = %stream, "Stream subscribed");

        match frame {
            Some(frame) => self.send_if_connected(frame).await,
            None => Ok(()),
        }
    }

    /// Release a logical stream, sending `frame` if connected.
    ///
    /// Returns whether the stream was subscribed.
    ///
    /// # Errors
    ///
    /// Returns the send error.
    pub async fn unsubscribe(
        &self,
        stream: &str,
        frame: Option<Frame>,
    ) -> Result<bool, StreamClientError> {
        let removed = {
            let mut streams = self.streams.lock();
            let before = streams.len();
            streams.retain(|(name, _)| name != stream);
            streams.len() != before
        };
        if removed && let Some(frame) = frame {
            self.send_if_connected(frame).await?;
        }
        Ok(removed)
    }

    // =========================================================================
    // Connection management (link lock held)
    // =========================================================================

    async fn establish(
        &self,
        link: &mut Link,
        on_failure: ConnectionState,
    ) -> Result<(), StreamClientError> {
        self.set_state(ConnectionState::Connecting);

        let dialed = time::timeout(self.config.connect_timeout, self.dialer.dial(&self.config.url))
            .await
            .unwrap_or(Err(TransportError::Timeout));
        let (mut sink, source) = match dialed {
            Ok(connection) => connection,
            Err(e) => {
                self.set_state(on_failure);
                return Err(e.into());
            }
        };

        let replay: Vec<Frame> = self
            .streams
            .lock()
            .iter()
            .filter_map(|(_, frame)| frame.clone())
            .collect();
        for frame in replay {
            if let Err(e) = sink.send(frame).await {
                let _ = sink.close().await;
                self.set_state(on_failure);
                return Err(e.into());
            }
        }

        link.sink = Some(sink);
        link.source = Some(source);
        link.connected_at = Some(Instant::now());
        self.heartbeat.reset();
        self.generation.send_modify(|generation| *generation += 1);
        self.set_state(ConnectionState::Connected);

        tracing::info!(
            stream = %self.config.name,
            url = %self.config.url,
            generation = self.generation(),
            "Connected"
        );
        Ok(())
    }

    async fn teardown(&self, link: &mut Link) {
        link.source = None;
        link.connected_at = None;
        if let Some(mut sink) = link.sink.take()
            && let Err(e) = sink.close().await
        {
            tracing::debug!(stream = %self.config.name, error = %e, "Transport close failed");
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
        metrics::set_connection_state(&self.config.name, state.gauge_value());
    }

    async fn send_if_connected(&self, frame: Frame) -> Result<(), StreamClientError> {
        let mut link = self.link.lock().await;
        if let Some(sink) = link.sink.as_mut() {
            sink.send(frame).await?;
        }
        Ok(())
    }

    /// Send on the connection `generation`, if it is still current.
    async fn send_on(&self, generation: u64, frame: Frame) -> Result<(), TransportError> {
        let mut link = self.link.lock().await;
        if self.generation() != generation {
            return Ok(());
        }
        match link.sink.as_mut() {
            Some(sink) => sink.send(frame).await,
            None => Err(TransportError::Closed),
        }
    }

    // =========================================================================
    // Loops
    // =========================================================================

    async fn read_loop(self: Arc<Self>, handler: Arc<dyn MessageHandler>) {
        let mut generation_rx = self.generation.subscribe();
        let mut gate = RateGate::new(self.config.rate_limit);
        let mut backoff = Backoff::new(self.config.backoff.clone());

        loop {
            let (generation, source) = {
                let mut link = self.link.lock().await;
                if self.cancel.is_cancelled() {
                    break;
                }
                (*generation_rx.borrow_and_update(), link.source.take())
            };

            let reason = match source {
                Some(mut source) => {
                    match self
                        .drain(generation, source.as_mut(), handler.as_ref(), &mut gate, &mut generation_rx)
                        .await
                    {
                        Drain::Cancelled => break,
                        Drain::Replaced => {
                            backoff.reset();
                            continue;
                        }
                        Drain::Ended(reason) => reason,
                    }
                }
                None => "no active connection".to_string(),
            };

            tracing::warn!(stream = %self.config.name, generation, reason = %reason, "Read failed");
            match self.reconnect(generation, ReconnectReason::ReadFailure).await {
                Ok(_) => backoff.reset(),
                Err(_) => {
                    let delay = backoff.next_delay();
                    tracing::debug!(
                        stream = %self.config.name,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        failures = backoff.failures(),
                        "Waiting before next reconnect"
                    );
                    tokio::select! {
                        () = self.cancel.cancelled() => break,
                        () = time::sleep(delay) => {}
                    }
                }
            }
        }

        tracing::debug!(stream = %self.config.name, "Read loop exited");
    }

    async fn drain(
        &self,
        generation: u64,
        source: &mut dyn FrameSource,
        handler: &dyn MessageHandler,
        gate: &mut RateGate,
        generation_rx: &mut watch::Receiver<u64>,
    ) -> Drain {
        loop {
            let frame = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Drain::Cancelled,
                changed = generation_rx.changed() => {
                    if changed.is_err() {
                        return Drain::Cancelled;
                    }
                    if *generation_rx.borrow_and_update() != generation {
                        return Drain::Replaced;
                    }
                    continue;
                }
                frame = async {
                    gate.acquire().await;
                    source.next_frame().await
                } => frame,
            };

            match frame {
                Some(Ok(Frame::Text(text))) => self.deliver(handler, text.as_bytes()).await,
                Some(Ok(Frame::Binary(data))) => self.deliver(handler, &data).await,
                Some(Ok(Frame::Ping(data))) => {
                    self.heartbeat.record_activity();
                    if let Err(e) = self.send_on(generation, Frame::Pong(data)).await {
                        tracing::debug!(stream = %self.config.name, error = %e, "Pong send failed");
                    }
                }
                Some(Ok(Frame::Pong(_))) => self.heartbeat.record_activity(),
                Some(Ok(Frame::Close)) => return Drain::Ended("closed by peer".to_string()),
                Some(Err(e)) => return Drain::Ended(e.to_string()),
                None => return Drain::Ended("stream ended".to_string()),
            }
        }
    }

    async fn deliver(&self, handler: &dyn MessageHandler, payload: &[u8]) {
        self.heartbeat.record_activity();
        if self.cancel.is_cancelled() {
            return;
        }
        handler.handle_message(payload).await;
    }

    async fn keepalive_loop(self: Arc<Self>) {
        let mut interval = time::interval(self.config.heartbeat.ping_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let generation = self.generation();
            let reason = match self.heartbeat.check(&self.config.heartbeat) {
                HeartbeatCheck::TimedOut(silence) => {
                    tracing::warn!(
                        stream = %self.config.name,
                        silence_secs = silence.as_secs(),
                        timeout_secs = self.config.heartbeat.pong_timeout.as_secs(),
                        "Pong timeout"
                    );
                    ReconnectReason::PongTimeout
                }
                HeartbeatCheck::SendPing => match self.send_on(generation, Frame::Ping(Vec::new())).await {
                    Ok(()) => {
                        self.heartbeat.mark_ping_sent();
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(stream = %self.config.name, error = %e, "Ping failed");
                        ReconnectReason::PingFailure
                    }
                },
            };

            // Failures are logged inside; the next tick retries.
            let _ = self.reconnect(generation, reason).await;
        }

        tracing::debug!(stream = %self.config.name, "Keepalive loop exited");
    }

    async fn lifetime_loop(self: Arc<Self>) {
        let mut generation_rx = self.generation.subscribe();

        loop {
            let (generation, expires_at) = {
                let link = self.link.lock().await;
                (
                    *generation_rx.borrow_and_update(),
                    link.connected_at
                        .map(|at| at + self.config.connection_lifetime),
                )
            };

            let expiry = async {
                match expires_at {
                    Some(at) => time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                () = self.cancel.cancelled() => break,
                changed = generation_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = expiry => {
                    tracing::info!(
                        stream = %self.config.name,
                        lifetime_secs = self.config.connection_lifetime.as_secs(),
                        "Connection lifetime reached"
                    );
                    let _ = self.reconnect(generation, ReconnectReason::LifetimeExpired).await;
                }
            }
        }

        tracing::debug!(stream = %self.config.name, "Lifetime loop exited");
    }
}

impl std::fmt::Debug for StreamingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingClient")
            .field("name", &self.config.name)
            .field("url", &self.config.url)
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process dialer for exercising the client without a network.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Far end of one dialed connection.
    pub struct Remote {
        pub inbound: mpsc::UnboundedSender<Result<Frame, TransportError>>,
        pub outbound: mpsc::UnboundedReceiver<Frame>,
    }

    pub struct ChannelDialer {
        remotes: mpsc::UnboundedSender<Remote>,
        pub fail_next: AtomicUsize,
        pub dials: AtomicUsize,
    }

    impl ChannelDialer {
        pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Remote>) {
            let (remotes, rx) = mpsc::unbounded_channel();
            let dialer = Arc::new(Self {
                remotes,
                fail_next: AtomicUsize::new(0),
                dials: AtomicUsize::new(0),
            });
            (dialer, rx)
        }
    }

    struct ChannelSink(mpsc::UnboundedSender<Frame>);

    #[async_trait]
    impl FrameSink for ChannelSink {
        async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
            self.0.send(frame).map_err(|_| TransportError::Closed)
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct ChannelSource(mpsc::UnboundedReceiver<Result<Frame, TransportError>>);

    #[async_trait]
    impl FrameSource for ChannelSource {
        async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
            self.0.recv().await
        }
    }

    #[async_trait]
    impl Dialer for ChannelDialer {
        async fn dial(&self, _url: &str) -> Result<super::super::transport::Connection, TransportError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            if self
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(TransportError::Closed);
            }

            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
            let _ = self.remotes.send(Remote {
                inbound: inbound_tx,
                outbound: outbound_rx,
            });
            Ok((
                Box::new(ChannelSink(outbound_tx)),
                Box::new(ChannelSource(inbound_rx)),
            ))
        }
    }
}
