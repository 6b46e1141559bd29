//! streamcast-core - WebRTC streamer signaling core
//!
//! Connects to a signaling server over WebSocket, negotiates one WebRTC
//! session per subscribed consumer, and relays SDP and ICE between the
//! media engine and the wire.

pub mod args;
pub mod config;
pub mod signaling;
pub mod transport;
pub mod webrtc;

// Re-exports
pub use config::{Config, SignalingConfig, VideoCodec, WebRTCConfig};
pub use signaling::{SignalingClient, SessionRegistry};
pub use transport::{ConnectionState, MessageStatus, WebSocketClient};
pub use webrtc::{RtcEngine, WebRTCError};
