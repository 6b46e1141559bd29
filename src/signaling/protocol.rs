//! Signaling wire protocol
//!
//! JSON envelopes exchanged with the signaling server. Every message is an
//! object with a `type` tag; every inbound message except `connect` carries
//! the originating peer id.

use super::registry::PeerId;
use super::SignalingError;
use serde::{Deserialize, Serialize};

/// The three fields describing one ICE candidate on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidateFields {
    #[serde(rename = "sdpMid")]
    pub sdp_mid: String,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: u16,
    pub candidate: String,
}

/// Inbound envelopes decoded from the signaling server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundMessage {
    /// Server-assigned streamer identity
    Connect { id: PeerId },

    /// A consumer wants to receive media
    Subscribe { sender: PeerId },

    /// Consumer's SDP answer
    Answer { sender: PeerId, sdp: String },

    /// Consumer's discovered network candidate
    IceCandidate {
        sender: PeerId,
        candidate: IceCandidateFields,
    },

    /// Consumer tore down
    ConsumerDisconnected { consumer_id: PeerId },

    /// Unrecognized tag; dropped by the handler without failing
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Parse an inbound envelope from JSON
    pub fn from_json(json: &str) -> Result<Self, SignalingError> {
        serde_json::from_str(json)
            .map_err(|e| SignalingError::Protocol(format!("Invalid signaling message: {}", e)))
    }
}

/// Outbound envelopes produced by the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    /// Announce this process as a streamer
    NewPeer,

    /// SDP offer for one consumer
    Offer { target: PeerId, sdp: String },

    /// Locally discovered network candidate for one consumer
    IceCandidate {
        target: PeerId,
        candidate: IceCandidateFields,
    },
}

impl OutboundMessage {
    /// Create an offer envelope
    pub fn offer(target: PeerId, sdp: String) -> Self {
        OutboundMessage::Offer { target, sdp }
    }

    /// Create an ICE candidate envelope
    pub fn ice_candidate(target: PeerId, candidate: IceCandidateFields) -> Self {
        OutboundMessage::IceCandidate { target, candidate }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, SignalingError> {
        serde_json::to_string(self)
            .map_err(|e| SignalingError::Protocol(format!("Failed to serialize message: {}", e)))
    }

    /// The consumer this envelope is addressed to, if any
    pub fn target(&self) -> Option<PeerId> {
        match self {
            OutboundMessage::NewPeer => None,
            OutboundMessage::Offer { target, .. } => Some(*target),
            OutboundMessage::IceCandidate { target, .. } => Some(*target),
        }
    }
}
