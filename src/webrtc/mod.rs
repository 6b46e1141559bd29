//! WebRTC media negotiation
//!
//! This module provides the media-negotiation engine behind the signaling
//! core:
//! - Peer connection creation and lifecycle
//! - SDP offer/answer processing
//! - ICE candidate exchange
//! - Outbound RTP track setup

pub mod engine;
pub mod media_track;
pub mod peer_connection;

pub use engine::{MediaSession, NegotiationEngine};
pub use peer_connection::RtcEngine;

use std::error::Error;
use std::fmt;

/// WebRTC-related errors
#[derive(Debug)]
pub enum WebRTCError {
    /// Peer connection creation failed
    ConnectionFailed(String),
    /// SDP processing failed
    SdpError(String),
    /// ICE candidate processing failed
    IceError(String),
    /// Media track error
    MediaError(String),
}

impl fmt::Display for WebRTCError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebRTCError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            WebRTCError::SdpError(msg) => write!(f, "SDP error: {}", msg),
            WebRTCError::IceError(msg) => write!(f, "ICE error: {}", msg),
            WebRTCError::MediaError(msg) => write!(f, "Media error: {}", msg),
        }
    }
}

impl Error for WebRTCError {}
