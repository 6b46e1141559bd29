//! Outbound media tracks
//!
//! Builds the local RTP tracks attached to each consumer's peer
//! connection. Every track for one consumer shares a stream id so the
//! browser groups them into a single MediaStream.

use crate::config::VideoCodec;
use crate::signaling::registry::PeerId;
use std::sync::Arc;
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;

/// Stream id shared by all tracks bound for one consumer
pub fn stream_id(peer: PeerId) -> String {
    format!("stream-{}", peer)
}

/// Create a video track for the specified codec
pub fn create_video_track(peer: PeerId, codec: VideoCodec) -> Arc<TrackLocalStaticRTP> {
    let fmtp = match codec {
        VideoCodec::H264 => {
            "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"
        }
        VideoCodec::VP8 => "",
        VideoCodec::VP9 => "profile-id=0",
    };

    Arc::new(TrackLocalStaticRTP::new(
        RTCRtpCodecCapability {
            mime_type: codec.mime_type().to_string(),
            clock_rate: 90000,
            channels: 0,
            sdp_fmtp_line: fmtp.to_string(),
            rtcp_feedback: vec![],
        },
        format!("video-{}", uuid::Uuid::new_v4()),
        stream_id(peer),
    ))
}

/// Create an Opus audio track
pub fn create_audio_track(peer: PeerId) -> Arc<TrackLocalStaticRTP> {
    Arc::new(TrackLocalStaticRTP::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_string(),
            clock_rate: 48000,
            channels: 2,
            sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
            rtcp_feedback: vec![],
        },
        format!("audio-{}", uuid::Uuid::new_v4()),
        stream_id(peer),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use webrtc::api::media_engine::MIME_TYPE_VP8;
    use webrtc::track::track_local::TrackLocal;

    #[test]
    fn stream_id_is_stable_per_peer() {
        assert_eq!(stream_id(42), "stream-42");
        assert_eq!(stream_id(42), stream_id(42));
    }

    #[test]
    fn video_track_uses_requested_codec() {
        let track = create_video_track(7, VideoCodec::VP8);
        assert_eq!(track.codec().mime_type, MIME_TYPE_VP8);
        assert_eq!(track.stream_id(), "stream-7");
        assert!(track.id().starts_with("video-"));
    }

    #[test]
    fn audio_track_is_stereo_opus() {
        let track = create_audio_track(7);
        assert_eq!(track.codec().mime_type, MIME_TYPE_OPUS);
        assert_eq!(track.codec().channels, 2);
        assert_eq!(track.stream_id(), "stream-7");
        assert!(track.id().starts_with("audio-"));
    }
}
