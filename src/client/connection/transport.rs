//! Push channel transport
//!
//! The connection manager talks to the server through the [`Transport`]
//! trait. [`WsTransport`] is the WebSocket implementation; tests use the
//! scripted transport next door.

use crate::shared::error::SyncError;
use crate::shared::event::PushMessage;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Transport-level failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("channel closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Whether the channel is unusable after this error. A malformed frame
    /// leaves the socket open.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Protocol(_))
    }
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        Self::connection(err.to_string())
    }
}

/// One frame on the push channel, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Ping,
    Pong,
    Message { topic: String, message: PushMessage },
}

impl Frame {
    pub fn to_json(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Protocol(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, TransportError> {
        serde_json::from_str(text).map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

/// A bidirectional frame channel
///
/// `recv` waits until a frame arrives; it must be cancel-safe because the
/// connection manager races it against its timers.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn open(&mut self, url: &str) -> Result<(), TransportError>;
    async fn close(&mut self);
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;
    async fn recv(&mut self) -> Result<Frame, TransportError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport built on tokio-tungstenite
///
/// Heartbeat pings go out as WebSocket ping control frames; the server's
/// pong control frame and a JSON `{"kind":"pong"}` frame are both reported
/// as [`Frame::Pong`].
#[derive(Default)]
pub struct WsTransport {
    stream: Option<WsStream>,
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn stream(&mut self) -> Result<&mut WsStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for WsTransport {
    async fn open(&mut self, url: &str) -> Result<(), TransportError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        tracing::debug!("[Connection] WebSocket handshake complete: {}", response.status());
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                tracing::debug!("[Connection] Close handshake failed: {}", e);
            }
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let message = match frame {
            Frame::Ping => Message::Ping(Vec::new()),
            other => Message::Text(other.to_json()?),
        };
        self.stream()?
            .send(message)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Frame, TransportError> {
        loop {
            let next = self.stream()?.next().await;
            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    self.stream = None;
                    return Err(TransportError::Io(e.to_string()));
                }
                None => {
                    self.stream = None;
                    return Err(TransportError::Closed);
                }
            };
            match message {
                Message::Text(text) => return Frame::from_json(&text),
                Message::Binary(bytes) => {
                    let text = String::from_utf8(bytes)
                        .map_err(|e| TransportError::Protocol(e.to_string()))?;
                    return Frame::from_json(&text);
                }
                Message::Pong(_) => return Ok(Frame::Pong),
                // tungstenite queues the pong reply itself
                Message::Ping(_) | Message::Frame(_) => continue,
                Message::Close(reason) => {
                    tracing::info!("[Connection] Server closed the channel: {:?}", reason);
                    self.stream = None;
                    return Err(TransportError::Closed);
                }
            }
        }
    }
}
