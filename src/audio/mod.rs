//! Audio buffers, capture, playback, and the canonical WAV header.

pub mod buffer;
pub mod capture;
pub mod playback;
pub mod wav;

pub use buffer::AudioBuffer;
pub use capture::{AudioSource, CaptureSession, MockAudioSource};
pub use playback::{AudioOutput, MockAudioOutput, PlaybackSink};
