use clap::Parser;
use std::path::PathBuf;

use crate::config;

#[derive(Parser, Debug)]
#[command(name = "streamcast-core")]
#[command(version = "0.2.0")]
#[command(about = "WebRTC streamer signaling core", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/streamcast-core.toml")]
    pub config: PathBuf,

    /// Signaling server hostname
    #[arg(long)]
    pub host: Option<String>,

    /// Signaling server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Signaling WebSocket path
    #[arg(long)]
    pub path: Option<String>,

    /// Verbose logging
    #[arg(short, long, action)]
    pub verbose: bool,
}

impl Args {
    pub fn load_config(&self) -> Result<config::Config, Box<dyn std::error::Error>> {
        config::Config::load(&self.config)
    }

    /// Command-line flags override whatever the config file said
    pub fn apply(&self, config: &mut config::Config) {
        if let Some(host) = &self.host {
            config.signaling.host = host.clone();
        }
        if let Some(port) = self.port {
            config.signaling.port = port;
        }
        if let Some(path) = &self.path {
            config.signaling.path = path.clone();
        }
    }
}
