//! Daemon configuration.
//!
//! Read from a JSON file such as
//! `{"server_name": "den", "receive_dir": "/srv/photos"}`. Every key is
//! optional, unknown keys are ignored, and a missing or unparseable file
//! means "all defaults".

use std::path::{Path, PathBuf};

use anyhow::Context;
use photosync_protocol::constants::{DEFAULT_TCP_PORT, DEFAULT_UDP_PORT};
use photosync_server::ServerConfig;
use photosync_slideshow::SlideshowSettings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Name announced to phones; the hostname by default.
    #[serde(default = "default_server_name")]
    pub server_name: String,
    #[serde(default = "default_receive_dir")]
    pub receive_dir: PathBuf,
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,
    /// Largest accepted frame payload, in MiB.
    #[serde(default = "default_max_payload_mb")]
    pub max_payload_mb: usize,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    #[serde(default = "default_music_dir")]
    pub music_dir: PathBuf,
}

fn default_server_name() -> String {
    photosync_discovery::get_hostname()
}

fn default_receive_dir() -> PathBuf {
    PathBuf::from("received")
}

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_udp_port() -> u16 {
    DEFAULT_UDP_PORT
}

fn default_max_payload_mb() -> usize {
    500
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_music_dir() -> PathBuf {
    PathBuf::from("/data/music")
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            receive_dir: default_receive_dir(),
            tcp_port: default_tcp_port(),
            udp_port: default_udp_port(),
            max_payload_mb: default_max_payload_mb(),
            ffmpeg: default_ffmpeg(),
            music_dir: default_music_dir(),
        }
    }
}

impl DaemonConfig {
    /// Loads `path`, falling back to defaults when the file does not exist
    /// or cannot be parsed. Other read errors are returned.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        match serde_json::from_str::<Self>(&text) {
            Ok(config) => Ok(config.normalized()),
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to parse config, using defaults: {e}");
                Ok(Self::default())
            }
        }
    }

    /// Empty strings and a zero payload limit mean "use the default".
    fn normalized(mut self) -> Self {
        if self.server_name.trim().is_empty() {
            self.server_name = default_server_name();
        }
        if self.receive_dir.as_os_str().is_empty() {
            self.receive_dir = default_receive_dir();
        }
        if self.max_payload_mb == 0 {
            tracing::warn!("max_payload_mb must be positive, using the default");
            self.max_payload_mb = default_max_payload_mb();
        }
        self
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_mb.saturating_mul(1024 * 1024)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            receive_dir: self.receive_dir.clone(),
            max_payload: self.max_payload_bytes(),
        }
    }

    pub fn slideshow_settings(&self) -> SlideshowSettings {
        SlideshowSettings {
            ffmpeg: self.ffmpeg.clone(),
            music_dir: self.music_dir.clone(),
            ..SlideshowSettings::default()
        }
    }
}
