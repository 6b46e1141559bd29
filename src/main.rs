//! streamcast-core - Main entry point
//!
//! Connects to the signaling server and streams media to subscribed
//! consumers until interrupted.

use clap::Parser;
use log::{info, warn};
use std::sync::Arc;
use streamcast_core::args::Args;
use streamcast_core::{Config, RtcEngine, SignalingClient, WebSocketClient};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging with noise filtering for third-party WebRTC crates
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::new()
        .parse_filters(&std::env::var("STREAMCAST_LOG").unwrap_or_else(|_| log_level.to_string()))
        .filter_module("webrtc_ice", log::LevelFilter::Error)
        .filter_module("webrtc_dtls", log::LevelFilter::Error)
        .filter_module("webrtc_mdns", log::LevelFilter::Error)
        .init();

    info!("streamcast-core v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match args.load_config() {
        Ok(cfg) => {
            info!("Loaded configuration from {:?}", args.config);
            cfg
        }
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        }
    };
    args.apply(&mut config);

    info!(
        "Signaling server: ws://{}:{}{}",
        config.signaling.host, config.signaling.port, config.signaling.path
    );
    info!("Video codec: {}", config.webrtc.video_codec.as_str());

    let engine = Arc::new(RtcEngine::new(config.webrtc.clone()));
    let transport = Arc::new(WebSocketClient::new(
        config.signaling.host.clone(),
        config.signaling.port,
        config.signaling.path.clone(),
    ));
    let client = SignalingClient::new(transport, engine);

    client.connect().await?;

    // Run until interrupted
    signal::ctrl_c().await?;
    info!("Shutting down...");
    client.disconnect().await;

    Ok(())
}
