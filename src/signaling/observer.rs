//! Per-session negotiation observer
//!
//! Bound to exactly one session at construction; receives the engine's
//! asynchronous callbacks and funnels them back through the protocol
//! handler. Holds a strong handle to the owning client so a late callback
//! can never target a torn-down handler.

use super::client::SignalingClient;
use super::protocol::IceCandidateFields;
use super::registry::PeerId;
use log::{debug, warn};
use std::sync::Arc;

pub struct NegotiationObserver {
    client: Arc<SignalingClient>,
    peer: PeerId,
}

impl NegotiationObserver {
    pub fn new(client: Arc<SignalingClient>, peer: PeerId) -> Arc<Self> {
        Arc::new(Self { client, peer })
    }

    /// The engine wants a fresh offer round for this session.
    pub async fn on_negotiation_needed(&self) {
        match self.client.registry().get(self.peer) {
            Some(session) => {
                debug!("Renegotiation needed for consumer {}", self.peer);
                self.client.negotiate(self.peer, &session).await;
            }
            None => {
                debug!(
                    "Renegotiation signal for consumer {} with no session, dropping",
                    self.peer
                );
            }
        }
    }

    /// The engine discovered a local candidate for this session.
    pub async fn on_local_candidate(&self, candidate: IceCandidateFields) {
        self.client.send_candidate(self.peer, candidate);
    }

    /// The core only emits media; an inbound track is an anomaly, not an
    /// error.
    pub fn on_track(&self) {
        warn!(
            "Received track from consumer {} (unexpected in streamer role)",
            self.peer
        );
    }
}
