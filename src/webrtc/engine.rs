//! Engine seam between signaling and media
//!
//! The signaling core drives negotiation through these two traits and
//! never touches `webrtc` types directly; tests substitute mock
//! implementations.

use super::WebRTCError;
use crate::signaling::observer::NegotiationObserver;
use crate::signaling::protocol::IceCandidateFields;
use crate::signaling::registry::PeerId;
use async_trait::async_trait;
use std::sync::Arc;

/// Factory for per-consumer negotiation sessions.
#[async_trait]
pub trait NegotiationEngine: Send + Sync {
    /// Create a session for `peer`. The session reports negotiation
    /// events through `observer` for its whole lifetime.
    async fn create_session(
        &self,
        peer: PeerId,
        observer: Arc<NegotiationObserver>,
    ) -> Result<Arc<dyn MediaSession>, WebRTCError>;
}

/// One consumer's negotiation state inside the engine.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Produce an SDP offer. Does not install it as the local
    /// description; the caller decides when that happens.
    async fn create_offer(&self) -> Result<String, WebRTCError>;

    /// Install a previously created offer as the local description.
    async fn set_local_description(&self, sdp: &str) -> Result<(), WebRTCError>;

    /// Apply the consumer's SDP answer.
    async fn set_remote_description(&self, sdp: &str) -> Result<(), WebRTCError>;

    /// Feed one remote ICE candidate into the session.
    async fn add_ice_candidate(&self, candidate: IceCandidateFields) -> Result<(), WebRTCError>;

    /// Tear the session down.
    async fn close(&self) -> Result<(), WebRTCError>;
}
