//! voxlink - Two-node speech relay over a serial link
//!
//! A capture node records a clip, uploads it to a translation service, and
//! forwards the returned audio over a framed, checksummed serial link to a
//! speaker node that plays it.

// Enforce error handling discipline outside tests
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod link;
pub mod remote;

// Composition root - needs the full hardware and network stack
#[cfg(all(feature = "cpal-audio", feature = "serial", feature = "remote"))]
pub mod app;

// Core types (capture → translate → link → playback)
pub use audio::buffer::AudioBuffer;
pub use audio::capture::{AudioSource, CaptureSession};
pub use audio::playback::{AudioOutput, PlaybackSink};
pub use link::receiver::{FaultKind, LinkEvent, LinkReceiver, RejectReason};
pub use link::sender::{Handshake, LinkSender};
pub use remote::fingerprint::{DedupGate, Fingerprint};
#[cfg(feature = "remote")]
pub use remote::client::TranslationClient;

// Error handling
pub use error::{Result, VoxlinkError};

// Config
pub use config::{Config, RelayMode};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.2+abc1234"` when git hash is available, `"0.1.2"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }
}
