//! Configuration management for streamcast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Video codec selection for WebRTC streaming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    VP8,
    VP9,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::VP8 => "vp8",
            VideoCodec::VP9 => "vp9",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "video/H264",
            VideoCodec::VP8 => "video/VP8",
            VideoCodec::VP9 => "video/VP9",
        }
    }
}

/// Signaling server endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// Server hostname
    pub host: String,

    /// Server port
    pub port: u16,

    /// WebSocket path
    pub path: String,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3000,
            path: "/".to_string(),
        }
    }
}

/// WebRTC negotiation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebRTCConfig {
    /// STUN server URLs
    pub stun_servers: Vec<String>,

    /// Codec offered on the video track
    pub video_codec: VideoCodec,

    /// Whether an audio track is attached to each session
    pub audio_enabled: bool,
}

impl Default for WebRTCConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:19302".to_string(),
            ],
            video_codec: VideoCodec::default(),
            audio_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Signaling server endpoint
    pub signaling: SignalingConfig,

    /// WebRTC negotiation settings
    pub webrtc: WebRTCConfig,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults if
    /// the file does not exist
    pub fn load(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.signaling.host, "localhost");
        assert_eq!(config.signaling.port, 3000);
        assert_eq!(config.signaling.path, "/");
        assert_eq!(config.webrtc.stun_servers.len(), 2);
        assert_eq!(config.webrtc.video_codec, VideoCodec::H264);
        assert!(config.webrtc.audio_enabled);
    }

    #[test]
    fn codec_mime_types() {
        assert_eq!(VideoCodec::H264.mime_type(), "video/H264");
        assert_eq!(VideoCodec::VP8.mime_type(), "video/VP8");
        assert_eq!(VideoCodec::VP9.mime_type(), "video/VP9");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [signaling]
            host = "signal.example.com"
            port = 8443

            [webrtc]
            video_codec = "vp9"
            audio_enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.signaling.host, "signal.example.com");
        assert_eq!(config.signaling.port, 8443);
        assert_eq!(config.signaling.path, "/");
        assert_eq!(config.webrtc.video_codec, VideoCodec::VP9);
        assert!(!config.webrtc.audio_enabled);
        assert_eq!(config.webrtc.stun_servers.len(), 2);
    }
}
