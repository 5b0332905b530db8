//! Default configuration constants for voxlink.
//!
//! Shared constants used across configuration types and both node roles,
//! kept in one place so the capture and speaker sides cannot drift apart.

/// Default audio sample rate in Hz.
///
/// 16kHz mono is what the translation service expects on upload and what it
/// returns for playback, so both nodes default to it.
pub const SAMPLE_RATE: u32 = 16_000;

/// Default capture window in seconds.
///
/// One push cycle records a fixed-length clip rather than waiting for
/// silence; three seconds holds a short spoken phrase at 16kHz.
pub const RECORD_SECS: u32 = 3;

/// Default serial baud rate for the inter-node link.
///
/// The link carries whole audio clips, so it runs far above console speeds.
pub const BAUD_RATE: u32 = 921_600;

/// Default bound on the wait for the peer's handshake byte, in milliseconds.
pub const ACK_TIMEOUT_MS: u64 = 1_000;

/// Default number of delivery attempts per clip.
///
/// One initial send plus two retries after a NACK or handshake timeout.
pub const SEND_ATTEMPTS: u32 = 3;

/// Default maximum accepted payload length, in bytes.
///
/// The frame length field is 16 bits, so a single clip can never exceed
/// 65535 bytes; the receiver also refuses to allocate more than this for a
/// declared frame.
pub const MAX_CLIP_BYTES: usize = u16::MAX as usize;

/// Default poll interval in milliseconds.
///
/// In poll mode the capture node asks the service for "the current
/// translation" on this cadence; it is also the pause between push cycles.
pub const POLL_INTERVAL_MS: u64 = 5_000;

/// Default HTTP request timeout in milliseconds.
pub const HTTP_TIMEOUT_MS: u64 = 30_000;

/// Default playback chunk size in bytes.
///
/// PCM is streamed to the output in chunks of this size, retrying partial
/// writes, so a slow output never forces the whole clip to be buffered twice.
pub const PLAYBACK_CHUNK_BYTES: usize = 1_024;

/// Bound on how long capture will wait for the source to produce samples
/// before the cycle is abandoned, in milliseconds.
pub const CAPTURE_STALL_MS: u64 = 2_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_clip_matches_length_field() {
        // The response cap exists so an accepted clip always fits one frame.
        assert_eq!(MAX_CLIP_BYTES, u16::MAX as usize);
    }

    #[test]
    fn capture_window_is_three_seconds_of_mono_pcm() {
        let pcm_bytes = (SAMPLE_RATE * RECORD_SECS) as usize * 2;
        assert_eq!(pcm_bytes, 96_000);
    }
}
