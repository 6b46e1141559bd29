//! Signaling and session orchestration
//!
//! Decodes control envelopes from the signaling server, keeps one
//! negotiation session per subscribed consumer, and plumbs offers and ICE
//! candidates between the media engine and the wire.

pub mod client;
pub mod observer;
pub mod protocol;
pub mod registry;

pub use client::{OutboundSink, SignalingClient};
pub use observer::NegotiationObserver;
pub use protocol::{IceCandidateFields, InboundMessage, OutboundMessage};
pub use registry::{PeerId, PeerSession, SessionRegistry};

use std::error::Error;
use std::fmt;

/// Signaling-layer errors
#[derive(Debug)]
pub enum SignalingError {
    /// Envelope could not be decoded or encoded
    Protocol(String),
    /// Operation referenced a peer with no registered session
    SessionNotFound(PeerId),
}

impl fmt::Display for SignalingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalingError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            SignalingError::SessionNotFound(peer) => write!(f, "No session for peer {}", peer),
        }
    }
}

impl Error for SignalingError {}
