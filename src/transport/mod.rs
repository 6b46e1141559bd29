//! Signaling transport
//!
//! Persistent WebSocket connection to the signaling server with a
//! single-flight outbound message queue.

pub mod websocket;

pub use websocket::WebSocketClient;

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Connection lifecycle states.
///
/// Transitions follow Disconnected -> Connecting -> Connected ->
/// {Closing -> Disconnected | Error}; no transition skips Connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one outbound message.
///
/// A message progresses Queued -> Sending -> {Sent | Failed}, or goes
/// straight to Cancelled if it never reaches the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Queued,
    Sending,
    Sent,
    Failed,
    Cancelled,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Queued => "queued",
            MessageStatus::Sending => "sending",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
            MessageStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-level errors
#[derive(Debug)]
pub enum TransportError {
    /// Operation called in a state that does not allow it
    InvalidState(String),
    /// Endpoint resolution or WebSocket handshake failed
    Handshake(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            TransportError::Handshake(msg) => write!(f, "Handshake failed: {}", msg),
        }
    }
}

impl Error for TransportError {}

/// Callback invoked for each received text frame. The receive loop awaits
/// it, so inbound messages are handled strictly in arrival order.
pub type MessageCallback =
    Box<dyn Fn(String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback invoked when the connection state actually changes.
pub type StateChangeCallback =
    Arc<dyn Fn(ConnectionState) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback invoked as an outbound message moves through its statuses.
pub type SendStatusCallback = Arc<dyn Fn(MessageStatus) + Send + Sync>;
