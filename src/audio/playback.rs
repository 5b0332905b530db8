//! Speaker playback: the output trait, the chunked playback sink, and the
//! CPAL-backed implementation.

use crate::audio::buffer::AudioBuffer;
use crate::defaults;
use crate::error::{Result, VoxlinkError};
use std::thread;
use std::time::Duration;

/// Trait for audio output devices.
///
/// `write` may accept fewer bytes than offered; the sink retries the
/// remainder. `flush` blocks (bounded) until queued audio has rendered.
pub trait AudioOutput: Send {
    fn write(&mut self, pcm: &[u8]) -> Result<usize>;

    fn flush(&mut self) -> Result<()>;
}

/// Streams a clip's PCM region to an [`AudioOutput`] in bounded chunks.
///
/// The 44-byte WAV header is skipped when the literal `RIFF` tag is
/// present; the clip is consumed by move and dropped when playback ends.
pub struct PlaybackSink<O: AudioOutput> {
    output: O,
    chunk_bytes: usize,
}

/// Consecutive zero-byte writes tolerated before playback is declared
/// stalled. With the retry sleep this bounds the wait to roughly a second.
const MAX_STALLED_WRITES: u32 = 200;

impl<O: AudioOutput> PlaybackSink<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            chunk_bytes: defaults::PLAYBACK_CHUNK_BYTES,
        }
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    /// Play a clip to completion. Returns the number of PCM bytes written.
    pub fn play(&mut self, clip: AudioBuffer) -> Result<usize> {
        let pcm = clip.pcm();
        let mut total = 0usize;

        for chunk in pcm.chunks(self.chunk_bytes) {
            let mut offset = 0;
            let mut stalled_writes = 0u32;

            while offset < chunk.len() {
                let written = self.output.write(&chunk[offset..])?;
                if written == 0 {
                    stalled_writes += 1;
                    if stalled_writes > MAX_STALLED_WRITES {
                        return Err(VoxlinkError::AudioPlayback {
                            message: format!(
                                "output made no progress after {} bytes",
                                total + offset
                            ),
                        });
                    }
                    thread::sleep(Duration::from_millis(5));
                    continue;
                }
                stalled_writes = 0;
                offset += written;
            }
            total += chunk.len();
        }

        self.output.flush()?;
        Ok(total)
    }

    /// Give the output back, e.g. to reuse the device across cycles.
    pub fn into_output(self) -> O {
        self.output
    }
}

/// Mock audio output for testing.
#[derive(Debug, Clone, Default)]
pub struct MockAudioOutput {
    written: Vec<u8>,
    accept_limit: Option<usize>,
    zero_writes: u32,
    fail_after: Option<usize>,
    flush_count: u32,
}

impl MockAudioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept at most this many bytes per write call (simulates partial
    /// writes).
    pub fn with_accept_limit(mut self, limit: usize) -> Self {
        self.accept_limit = Some(limit);
        self
    }

    /// Return `Ok(0)` for the first N write calls (simulates a full DMA
    /// queue).
    pub fn with_zero_writes(mut self, count: u32) -> Self {
        self.zero_writes = count;
        self
    }

    /// Error once this many bytes have been accepted.
    pub fn with_fail_after(mut self, bytes: usize) -> Self {
        self.fail_after = Some(bytes);
        self
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn flush_count(&self) -> u32 {
        self.flush_count
    }
}

impl AudioOutput for MockAudioOutput {
    fn write(&mut self, pcm: &[u8]) -> Result<usize> {
        if let Some(limit) = self.fail_after
            && self.written.len() >= limit
        {
            return Err(VoxlinkError::AudioPlayback {
                message: "mock output failure".to_string(),
            });
        }
        if self.zero_writes > 0 {
            self.zero_writes -= 1;
            return Ok(0);
        }
        let take = match self.accept_limit {
            Some(limit) => pcm.len().min(limit),
            None => pcm.len(),
        };
        self.written.extend_from_slice(&pcm[..take]);
        Ok(take)
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_count += 1;
        Ok(())
    }
}

#[cfg(feature = "cpal-audio")]
pub use cpal_output::CpalAudioOutput;

#[cfg(feature = "cpal-audio")]
mod cpal_output {
    use super::*;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    /// Ceiling on queued samples: one second of audio. `write` accepts
    /// only what fits, which is what surfaces backpressure to the sink.
    const QUEUE_CAPACITY: usize = defaults::SAMPLE_RATE as usize;

    /// Wrapper for cpal::Stream to make it Send.
    ///
    /// SAFETY: the stream is owned by one CpalAudioOutput and never shared.
    struct SendableStream(cpal::Stream);

    unsafe impl Send for SendableStream {}

    /// Real speaker output through CPAL.
    ///
    /// Queued 16-bit samples are drained by the output callback; the
    /// callback zero-fills when the queue runs dry, so gaps render as
    /// silence instead of repeating stale audio.
    pub struct CpalAudioOutput {
        _stream: SendableStream,
        queue: Arc<Mutex<VecDeque<i16>>>,
        flush_timeout: Duration,
    }

    impl CpalAudioOutput {
        pub fn new(device_name: Option<&str>) -> Result<Self> {
            let host = cpal::default_host();

            let device = if let Some(name) = device_name {
                let mut devices = host
                    .output_devices()
                    .map_err(|e| VoxlinkError::AudioPlayback {
                        message: format!("Failed to enumerate output devices: {}", e),
                    })?;
                devices
                    .find(|d| d.name().is_ok_and(|n| n == name))
                    .ok_or_else(|| VoxlinkError::AudioDeviceNotFound {
                        device: name.to_string(),
                    })?
            } else {
                host.default_output_device()
                    .ok_or_else(|| VoxlinkError::AudioDeviceNotFound {
                        device: "default".to_string(),
                    })?
            };

            let config = cpal::StreamConfig {
                channels: 1,
                sample_rate: defaults::SAMPLE_RATE,
                buffer_size: cpal::BufferSize::Default,
            };

            let queue: Arc<Mutex<VecDeque<i16>>> = Arc::new(Mutex::new(VecDeque::new()));
            let callback_queue = Arc::clone(&queue);

            let stream = device
                .build_output_stream(
                    &config,
                    move |out: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        let mut q = match callback_queue.lock() {
                            Ok(q) => q,
                            Err(_) => return,
                        };
                        for slot in out.iter_mut() {
                            *slot = q.pop_front().unwrap_or(0);
                        }
                    },
                    |err| {
                        eprintln!("Audio stream error: {}", err);
                    },
                    None,
                )
                .map_err(|e| VoxlinkError::AudioPlayback {
                    message: format!("Failed to build output stream: {}", e),
                })?;

            stream.play().map_err(|e| VoxlinkError::AudioPlayback {
                message: format!("Failed to start output stream: {}", e),
            })?;

            Ok(Self {
                _stream: SendableStream(stream),
                queue,
                flush_timeout: Duration::from_secs(10),
            })
        }
    }

    impl AudioOutput for CpalAudioOutput {
        fn write(&mut self, pcm: &[u8]) -> Result<usize> {
            let mut queue = self.queue.lock().map_err(|e| VoxlinkError::AudioPlayback {
                message: format!("Failed to lock output queue: {}", e),
            })?;

            let free_samples = QUEUE_CAPACITY.saturating_sub(queue.len());
            let take_bytes = (pcm.len() / 2).min(free_samples) * 2;

            for pair in pcm[..take_bytes].chunks_exact(2) {
                queue.push_back(i16::from_le_bytes([pair[0], pair[1]]));
            }

            // An odd trailing byte can never form a sample; swallow it so
            // the sink does not spin on one unwritable byte.
            if take_bytes + 1 == pcm.len() && free_samples > 0 {
                return Ok(take_bytes + 1);
            }
            Ok(take_bytes)
        }

        fn flush(&mut self) -> Result<()> {
            let deadline = Instant::now() + self.flush_timeout;
            loop {
                let remaining = self
                    .queue
                    .lock()
                    .map(|q| q.len())
                    .map_err(|e| VoxlinkError::AudioPlayback {
                        message: format!("Failed to lock output queue: {}", e),
                    })?;

                if remaining == 0 {
                    return Ok(());
                }
                if Instant::now() > deadline {
                    return Err(VoxlinkError::AudioPlayback {
                        message: format!("flush timed out with {} samples queued", remaining),
                    });
                }
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}
