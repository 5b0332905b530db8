//! Error types for voxlink.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxlinkError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Audio playback failed: {message}")]
    AudioPlayback { message: String },

    // Framing errors
    #[error("Frame payload is empty")]
    FrameEmpty,

    #[error("Frame payload of {len} bytes exceeds the 16-bit length field")]
    FrameTooLarge { len: usize },

    // Serial link errors
    #[error("Serial port error: {message}")]
    LinkPort { message: String },

    #[error("Frame not delivered after {attempts} attempts (last outcome: {last})")]
    DeliveryFailed { attempts: u32, last: String },

    // Remote service errors
    #[error("Translation service returned status {status}")]
    RemoteStatus { status: u16 },

    #[error("Translation request failed: {message}")]
    RemoteTransport { message: String },

    #[error("Translation response of {len} bytes exceeds the {max} byte limit")]
    ResponseTooLarge { len: usize, max: usize },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxlinkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_file_not_found_display() {
        let error = VoxlinkError::ConfigFileNotFound {
            path: "/path/to/config.toml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found at /path/to/config.toml"
        );
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = VoxlinkError::ConfigInvalidValue {
            key: "link.baud".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for link.baud: must be positive"
        );
    }

    #[test]
    fn test_audio_device_not_found_display() {
        let error = VoxlinkError::AudioDeviceNotFound {
            device: "default".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: default");
    }

    #[test]
    fn test_audio_capture_display() {
        let error = VoxlinkError::AudioCapture {
            message: "stream stalled".to_string(),
        };
        assert_eq!(error.to_string(), "Audio capture failed: stream stalled");
    }

    #[test]
    fn test_audio_playback_display() {
        let error = VoxlinkError::AudioPlayback {
            message: "output closed".to_string(),
        };
        assert_eq!(error.to_string(), "Audio playback failed: output closed");
    }

    #[test]
    fn test_frame_empty_display() {
        assert_eq!(
            VoxlinkError::FrameEmpty.to_string(),
            "Frame payload is empty"
        );
    }

    #[test]
    fn test_frame_too_large_display() {
        let error = VoxlinkError::FrameTooLarge { len: 70000 };
        assert_eq!(
            error.to_string(),
            "Frame payload of 70000 bytes exceeds the 16-bit length field"
        );
    }

    #[test]
    fn test_link_port_display() {
        let error = VoxlinkError::LinkPort {
            message: "open failed".to_string(),
        };
        assert_eq!(error.to_string(), "Serial port error: open failed");
    }

    #[test]
    fn test_delivery_failed_display() {
        let error = VoxlinkError::DeliveryFailed {
            attempts: 3,
            last: "timeout".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Frame not delivered after 3 attempts (last outcome: timeout)"
        );
    }

    #[test]
    fn test_remote_status_display() {
        let error = VoxlinkError::RemoteStatus { status: 500 };
        assert_eq!(error.to_string(), "Translation service returned status 500");
    }

    #[test]
    fn test_response_too_large_display() {
        let error = VoxlinkError::ResponseTooLarge {
            len: 150000,
            max: 65535,
        };
        assert_eq!(
            error.to_string(),
            "Translation response of 150000 bytes exceeds the 65535 byte limit"
        );
    }

    #[test]
    fn test_other_display() {
        let error = VoxlinkError::Other("unexpected error".to_string());
        assert_eq!(error.to_string(), "unexpected error");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: VoxlinkError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: VoxlinkError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<VoxlinkError>();
        assert_sync::<VoxlinkError>();
    }

    #[test]
    fn test_error_debug_format() {
        let error = VoxlinkError::ConfigFileNotFound {
            path: "/test/path".to_string(),
        };
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("ConfigFileNotFound"));
        assert!(debug_str.contains("/test/path"));
    }
}
