//! Transport Abstraction
//!
//! The streaming client speaks frames through a dialer-provided sink and
//! source pair, so the connection state machine can run over a real
//! WebSocket or over in-process channels in tests.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 payload.
    Text(String),
    /// Binary payload.
    Binary(Vec<u8>),
    /// Liveness probe.
    Ping(Vec<u8>),
    /// Liveness probe answer.
    Pong(Vec<u8>),
    /// Peer closed the connection.
    Close,
}

/// Transport error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// WebSocket protocol or I/O failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The transport is closed.
    #[error("transport closed")]
    Closed,

    /// Dialing did not complete in time.
    #[error("connect timed out")]
    Timeout,
}

/// Write half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one frame.
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Next inbound frame, or `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;
}

/// Halves of a freshly dialed connection.
pub type Connection = (Box<dyn FrameSink>, Box<dyn FrameSource>);

/// Opens connections.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Dial `url`.
    async fn dial(&self, url: &str) -> Result<Connection, TransportError>;
}

// =============================================================================
// WebSocket
// =============================================================================

/// Dials WebSocket connections with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketDialer;

#[async_trait]
impl Dialer for WebSocketDialer {
    async fn dial(&self, url: &str) -> Result<Connection, TransportError> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write, read) = ws_stream.split();
        Ok((Box::new(WsSink(write)), Box::new(WsSource(read))))
    }
}

struct WsSink(SplitSink<WsStream, Message>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data.into()),
            Frame::Ping(data) => Message::Ping(data.into()),
            Frame::Pong(data) => Message::Pong(data.into()),
            Frame::Close => Message::Close(None),
        };
        self.0.send(message).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0.close().await?;
        Ok(())
    }
}

struct WsSource(SplitStream<WsStream>);

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let frame = match self.0.next().await? {
                Ok(Message::Text(text)) => Frame::Text(text.as_str().to_owned()),
                Ok(Message::Binary(data)) => Frame::Binary(data.to_vec()),
                Ok(Message::Ping(data)) => Frame::Ping(data.to_vec()),
                Ok(Message::Pong(data)) => Frame::Pong(data.to_vec()),
                Ok(Message::Close(_)) => Frame::Close,
                // Raw frames are never yielded while reading messages.
                Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(e.into())),
            };
            return Some(Ok(frame));
        }
    }
}
