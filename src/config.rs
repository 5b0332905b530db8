use crate::defaults;
use crate::error::{Result, VoxlinkError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub link: LinkConfig,
    pub audio: AudioConfig,
    pub wireless: WirelessConfig,
}

/// Translation service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub mode: RelayMode,
    pub poll_interval_ms: u64,
    pub http_timeout_ms: u64,
    pub max_response_bytes: usize,
}

/// Serial link configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    pub port: Option<String>,
    pub baud: u32,
    pub ack_timeout_ms: u64,
    pub send_attempts: u32,
    pub max_frame_bytes: usize,
}

/// Audio capture and playback configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub capture_device: Option<String>,
    pub playback_device: Option<String>,
    pub sample_rate: u32,
    pub record_secs: u32,
    pub playback_chunk_bytes: usize,
}

/// Wireless provisioning values.
///
/// Recorded for the platform's network tooling; the relay itself never
/// touches the radio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct WirelessConfig {
    pub ssid: Option<String>,
    pub passphrase: Option<String>,
}

/// Relay operating mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Capture, upload, consume the response immediately.
    Push,
    /// Periodically fetch the current translation, dedup by fingerprint.
    Poll,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5001/translate".to_string(),
            mode: RelayMode::Push,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            http_timeout_ms: defaults::HTTP_TIMEOUT_MS,
            max_response_bytes: defaults::MAX_CLIP_BYTES,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: defaults::BAUD_RATE,
            ack_timeout_ms: defaults::ACK_TIMEOUT_MS,
            send_attempts: defaults::SEND_ATTEMPTS,
            max_frame_bytes: defaults::MAX_CLIP_BYTES,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_device: None,
            playback_device: None,
            sample_rate: defaults::SAMPLE_RATE,
            record_secs: defaults::RECORD_SECS,
            playback_chunk_bytes: defaults::PLAYBACK_CHUNK_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoxlinkError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                VoxlinkError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or from the default location with
    /// fallback to defaults when no file exists there.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::load(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXLINK_ENDPOINT → remote.endpoint
    /// - VOXLINK_SERIAL_PORT → link.port
    /// - VOXLINK_MODE → remote.mode (push/poll)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("VOXLINK_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.remote.endpoint = endpoint;
        }

        if let Ok(port) = std::env::var("VOXLINK_SERIAL_PORT")
            && !port.is_empty()
        {
            self.link.port = Some(port);
        }

        if let Ok(mode) = std::env::var("VOXLINK_MODE") {
            match mode.as_str() {
                "push" => self.remote.mode = RelayMode::Push,
                "poll" => self.remote.mode = RelayMode::Poll,
                _ => {}
            }
        }

        self
    }

    /// Reject values the transport cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.link.baud == 0 {
            return Err(VoxlinkError::ConfigInvalidValue {
                key: "link.baud".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.link.max_frame_bytes == 0 || self.link.max_frame_bytes > u16::MAX as usize {
            return Err(VoxlinkError::ConfigInvalidValue {
                key: "link.max_frame_bytes".to_string(),
                message: format!("must be between 1 and {}", u16::MAX),
            });
        }
        if self.audio.sample_rate == 0 {
            return Err(VoxlinkError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.audio.record_secs == 0 {
            return Err(VoxlinkError::ConfigInvalidValue {
                key: "audio.record_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.remote.max_response_bytes > u16::MAX as usize {
            return Err(VoxlinkError::ConfigInvalidValue {
                key: "remote.max_response_bytes".to_string(),
                message: format!("a clip above {} bytes cannot fit one frame", u16::MAX),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxlink/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voxlink")
            .join("config.toml")
    }
}
