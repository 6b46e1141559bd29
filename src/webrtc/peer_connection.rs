//! WebRTC PeerConnection management
//!
//! `webrtc`-backed implementation of the negotiation engine. One
//! RTCPeerConnection per consumer, sendonly transceivers, trickle ICE.

use super::engine::{MediaSession, NegotiationEngine};
use super::media_track::{create_audio_track, create_video_track};
use super::WebRTCError;
use crate::config::WebRTCConfig;
use crate::signaling::observer::NegotiationObserver;
use crate::signaling::protocol::IceCandidateFields;
use crate::signaling::registry::PeerId;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{
    MediaEngine, MIME_TYPE_H264, MIME_TYPE_OPUS, MIME_TYPE_VP8, MIME_TYPE_VP9,
};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocal;

/// `webrtc`-backed negotiation engine
pub struct RtcEngine {
    config: WebRTCConfig,
}

impl RtcEngine {
    pub fn new(config: WebRTCConfig) -> Self {
        Self { config }
    }

    /// Register the codecs offered to consumers
    fn register_codecs(media_engine: &mut MediaEngine) -> Result<(), WebRTCError> {
        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: RTCRtpCodecCapability {
                        mime_type: MIME_TYPE_H264.to_string(),
                        clock_rate: 90000,
                        channels: 0,
                        sdp_fmtp_line:
                            "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"
                                .to_string(),
                        rtcp_feedback: vec![],
                    },
                    payload_type: 96,
                    ..Default::default()
                },
                RTPCodecType::Video,
            )
            .map_err(|e| WebRTCError::ConnectionFailed(format!("Failed to register H264: {}", e)))?;

        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: RTCRtpCodecCapability {
                        mime_type: MIME_TYPE_VP8.to_string(),
                        clock_rate: 90000,
                        channels: 0,
                        sdp_fmtp_line: "".to_string(),
                        rtcp_feedback: vec![],
                    },
                    payload_type: 97,
                    ..Default::default()
                },
                RTPCodecType::Video,
            )
            .map_err(|e| WebRTCError::ConnectionFailed(format!("Failed to register VP8: {}", e)))?;

        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: RTCRtpCodecCapability {
                        mime_type: MIME_TYPE_VP9.to_string(),
                        clock_rate: 90000,
                        channels: 0,
                        sdp_fmtp_line: "profile-id=0".to_string(),
                        rtcp_feedback: vec![],
                    },
                    payload_type: 98,
                    ..Default::default()
                },
                RTPCodecType::Video,
            )
            .map_err(|e| WebRTCError::ConnectionFailed(format!("Failed to register VP9: {}", e)))?;

        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: RTCRtpCodecCapability {
                        mime_type: MIME_TYPE_OPUS.to_string(),
                        clock_rate: 48000,
                        channels: 2,
                        sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
                        rtcp_feedback: vec![],
                    },
                    payload_type: 111,
                    ..Default::default()
                },
                RTPCodecType::Audio,
            )
            .map_err(|e| WebRTCError::ConnectionFailed(format!("Failed to register Opus: {}", e)))?;

        Ok(())
    }

    /// Convert configured STUN servers into ICE server entries
    pub fn ice_servers(&self) -> Vec<RTCIceServer> {
        self.config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect()
    }

    async fn build_peer_connection(&self) -> Result<Arc<RTCPeerConnection>, WebRTCError> {
        let mut media_engine = MediaEngine::default();
        Self::register_codecs(&mut media_engine)?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine).map_err(|e| {
            WebRTCError::ConnectionFailed(format!("Failed to register interceptors: {}", e))
        })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: self.ice_servers(),
            ..Default::default()
        };

        let peer_connection = api.new_peer_connection(rtc_config).await.map_err(|e| {
            WebRTCError::ConnectionFailed(format!("Failed to create peer connection: {}", e))
        })?;

        Ok(Arc::new(peer_connection))
    }
}

#[async_trait]
impl NegotiationEngine for RtcEngine {
    async fn create_session(
        &self,
        peer: PeerId,
        observer: Arc<NegotiationObserver>,
    ) -> Result<Arc<dyn MediaSession>, WebRTCError> {
        let peer_connection = self.build_peer_connection().await?;

        add_sendonly_track(&peer_connection, create_video_track(peer, self.config.video_codec))
            .await?;
        if self.config.audio_enabled {
            add_sendonly_track(&peer_connection, create_audio_track(peer)).await?;
        }

        let negotiation_observer = observer.clone();
        peer_connection.on_negotiation_needed(Box::new(move || {
            let observer = negotiation_observer.clone();
            Box::pin(async move {
                observer.on_negotiation_needed().await;
            })
        }));

        let candidate_observer = observer.clone();
        peer_connection.on_ice_candidate(Box::new(move |candidate| {
            let observer = candidate_observer.clone();
            Box::pin(async move {
                // None marks the end of gathering; nothing to relay.
                let Some(candidate) = candidate else { return };
                match candidate.to_json() {
                    Ok(init) => {
                        observer
                            .on_local_candidate(IceCandidateFields {
                                sdp_mid: init.sdp_mid.unwrap_or_default(),
                                sdp_mline_index: init.sdp_mline_index.unwrap_or(0),
                                candidate: init.candidate,
                            })
                            .await;
                    }
                    Err(e) => warn!("Failed to encode local ICE candidate: {}", e),
                }
            })
        }));

        let track_observer = observer;
        peer_connection.on_track(Box::new(move |_track, _receiver, _transceiver| {
            let observer = track_observer.clone();
            Box::pin(async move {
                observer.on_track();
            })
        }));

        info!("Created peer connection for consumer {}", peer);

        Ok(Arc::new(RtcMediaSession {
            peer_id: peer,
            peer_connection,
        }))
    }
}

async fn add_sendonly_track(
    peer_connection: &Arc<RTCPeerConnection>,
    track: Arc<TrackLocalStaticRTP>,
) -> Result<(), WebRTCError> {
    peer_connection
        .add_transceiver_from_track(
            track as Arc<dyn TrackLocal + Send + Sync>,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Sendonly,
                send_encodings: Vec::new(),
            }),
        )
        .await
        .map_err(|e| WebRTCError::MediaError(format!("Failed to add track: {}", e)))?;
    Ok(())
}

/// One consumer's live peer connection. The outbound tracks are owned by
/// the transceivers attached at creation.
pub struct RtcMediaSession {
    peer_id: PeerId,
    peer_connection: Arc<RTCPeerConnection>,
}

#[async_trait]
impl MediaSession for RtcMediaSession {
    async fn create_offer(&self) -> Result<String, WebRTCError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| WebRTCError::SdpError(format!("Failed to create offer: {}", e)))?;
        Ok(offer.sdp)
    }

    async fn set_local_description(&self, sdp: &str) -> Result<(), WebRTCError> {
        let offer = RTCSessionDescription::offer(sdp.to_string())
            .map_err(|e| WebRTCError::SdpError(format!("Invalid SDP offer: {}", e)))?;
        self.peer_connection
            .set_local_description(offer)
            .await
            .map_err(|e| WebRTCError::SdpError(format!("Failed to set local description: {}", e)))
    }

    async fn set_remote_description(&self, sdp: &str) -> Result<(), WebRTCError> {
        let answer = RTCSessionDescription::answer(sdp.to_string())
            .map_err(|e| WebRTCError::SdpError(format!("Invalid SDP answer: {}", e)))?;
        self.peer_connection
            .set_remote_description(answer)
            .await
            .map_err(|e| WebRTCError::SdpError(format!("Failed to set remote description: {}", e)))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidateFields) -> Result<(), WebRTCError> {
        debug!("Adding ICE candidate from consumer {}", self.peer_id);
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: Some(candidate.sdp_mid),
            sdp_mline_index: Some(candidate.sdp_mline_index),
            username_fragment: None,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| WebRTCError::IceError(format!("Failed to add ICE candidate: {}", e)))
    }

    async fn close(&self) -> Result<(), WebRTCError> {
        self.peer_connection
            .close()
            .await
            .map_err(|e| WebRTCError::ConnectionFailed(format!("Failed to close connection: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ice_servers_map_configured_stun_urls() {
        let engine = RtcEngine::new(WebRTCConfig::default());
        let servers = engine.ice_servers();
        assert_eq!(servers.len(), 2);
        assert!(servers[0].urls[0].starts_with("stun:"));
        assert!(servers[0].username.is_empty());
    }
}
