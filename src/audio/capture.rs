//! Microphone capture: the source trait, the fixed-window capture session,
//! and the CPAL-backed implementation.

use crate::audio::buffer::AudioBuffer;
use crate::defaults;
use crate::error::{Result, VoxlinkError};
use std::thread;
use std::time::{Duration, Instant};

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Drain whatever 16-bit mono samples the source has accumulated.
    ///
    /// An empty vector means nothing has arrived yet, not end of stream.
    fn read_samples(&mut self) -> Result<Vec<i16>>;
}

/// Narrow a 32-bit hardware word to a 16-bit sample.
///
/// Microphones that deliver 24-bit data inside 32-bit words carry the
/// signal in the high bits; the low-order bits are discarded.
pub fn narrow_sample(sample: i32) -> i16 {
    (sample >> 16) as i16
}

/// Records a fixed-length clip from an [`AudioSource`].
///
/// One capture cycle collects exactly `sample_rate × record_secs` mono
/// samples. A source that stops producing for longer than the stall bound
/// aborts the cycle instead of hanging the node loop.
pub struct CaptureSession<A: AudioSource> {
    source: A,
    sample_rate: u32,
    record_secs: u32,
    stall_timeout: Duration,
}

impl<A: AudioSource> CaptureSession<A> {
    pub fn new(source: A) -> Self {
        Self {
            source,
            sample_rate: defaults::SAMPLE_RATE,
            record_secs: defaults::RECORD_SECS,
            stall_timeout: Duration::from_millis(defaults::CAPTURE_STALL_MS),
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_record_secs(mut self, record_secs: u32) -> Self {
        self.record_secs = record_secs;
        self
    }

    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    /// Record one capture window as raw PCM.
    pub fn record(&mut self) -> Result<AudioBuffer> {
        let needed = (self.sample_rate * self.record_secs) as usize;
        let mut collected: Vec<i16> = Vec::with_capacity(needed);

        self.source.start()?;

        let mut last_progress = Instant::now();
        while collected.len() < needed {
            let samples = self.source.read_samples()?;

            if samples.is_empty() {
                if last_progress.elapsed() > self.stall_timeout {
                    let _ = self.source.stop();
                    return Err(VoxlinkError::AudioCapture {
                        message: format!(
                            "source stalled after {} of {} samples",
                            collected.len(),
                            needed
                        ),
                    });
                }
                thread::sleep(Duration::from_millis(10));
                continue;
            }

            last_progress = Instant::now();
            collected.extend_from_slice(&samples);
        }

        self.source.stop()?;

        // The last drain may overshoot the window.
        collected.truncate(needed);
        Ok(AudioBuffer::from_samples(&collected))
    }

    /// Record one capture window and wrap it in the canonical WAV header.
    pub fn record_wav(&mut self) -> Result<AudioBuffer> {
        let sample_rate = self.sample_rate;
        Ok(self.record()?.into_wav(sample_rate))
    }
}

/// Mock audio source for testing.
#[derive(Debug, Clone, Default)]
pub struct MockAudioSource {
    is_started: bool,
    chunks: std::collections::VecDeque<Vec<i16>>,
    repeat: Option<Vec<i16>>,
    should_fail_start: bool,
    should_fail_read: bool,
}

impl MockAudioSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return this chunk on every read.
    pub fn with_samples(mut self, samples: Vec<i16>) -> Self {
        self.repeat = Some(samples);
        self
    }

    /// Return these chunks in order, then empty reads.
    pub fn with_chunks(mut self, chunks: Vec<Vec<i16>>) -> Self {
        self.chunks = chunks.into();
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on read.
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(VoxlinkError::AudioCapture {
                message: "mock start failure".to_string(),
            });
        }
        self.is_started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(VoxlinkError::AudioCapture {
                message: "mock read failure".to_string(),
            });
        }
        if let Some(chunk) = self.chunks.pop_front() {
            return Ok(chunk);
        }
        Ok(self.repeat.clone().unwrap_or_default())
    }
}

#[cfg(feature = "cpal-audio")]
pub use cpal_source::{CpalAudioSource, list_devices};

#[cfg(feature = "cpal-audio")]
mod cpal_source {
    use super::*;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::{Arc, Mutex};

    /// Run a closure with stderr temporarily redirected to /dev/null.
    ///
    /// Suppresses the ALSA/JACK/PipeWire probe chatter CPAL triggers while
    /// enumerating backends.
    ///
    /// # Safety
    /// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2.
    /// Safe as long as no other thread is concurrently manipulating fd 2.
    fn with_suppressed_stderr<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        unsafe {
            let saved_fd = libc::dup(2);
            let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
            if saved_fd >= 0 && devnull >= 0 {
                libc::dup2(devnull, 2);
                libc::close(devnull);
            }

            let result = f();

            if saved_fd >= 0 {
                libc::dup2(saved_fd, 2);
                libc::close(saved_fd);
            }

            result
        }
    }

    /// List the names of available audio input devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let devices = with_suppressed_stderr(|| {
            let host = cpal::default_host();
            host.input_devices()
        })
        .map_err(|e| VoxlinkError::AudioCapture {
            message: format!("Failed to enumerate input devices: {}", e),
        })?;

        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    /// Wrapper for cpal::Stream to make it Send.
    ///
    /// SAFETY: the stream is only touched while the surrounding Mutex is
    /// held, so it never crosses threads concurrently.
    struct SendableStream(cpal::Stream);

    unsafe impl Send for SendableStream {}

    /// Real microphone capture through CPAL.
    ///
    /// Requests i16/16kHz/mono first (PipeWire and PulseAudio convert
    /// transparently); falls back to the device's native format with
    /// software conversion, including 32-bit words narrowed to their high
    /// 16 bits.
    pub struct CpalAudioSource {
        device: cpal::Device,
        stream: Arc<Mutex<Option<SendableStream>>>,
        buffer: Arc<Mutex<Vec<i16>>>,
        sample_rate: u32,
    }

    impl CpalAudioSource {
        pub fn new(device_name: Option<&str>) -> Result<Self> {
            let device = with_suppressed_stderr(|| {
                let host = cpal::default_host();

                if let Some(name) = device_name {
                    let mut devices =
                        host.input_devices().map_err(|e| VoxlinkError::AudioCapture {
                            message: format!("Failed to enumerate devices: {}", e),
                        })?;

                    devices
                        .find(|d| d.name().is_ok_and(|n| n == name))
                        .ok_or_else(|| VoxlinkError::AudioDeviceNotFound {
                            device: name.to_string(),
                        })
                } else {
                    host.default_input_device()
                        .ok_or_else(|| VoxlinkError::AudioDeviceNotFound {
                            device: "default".to_string(),
                        })
                }
            })?;

            Ok(Self {
                device,
                stream: Arc::new(Mutex::new(None)),
                buffer: Arc::new(Mutex::new(Vec::new())),
                sample_rate: defaults::SAMPLE_RATE,
            })
        }

        fn build_stream(&self) -> Result<cpal::Stream> {
            let preferred_config = cpal::StreamConfig {
                channels: 1,
                sample_rate: self.sample_rate,
                buffer_size: cpal::BufferSize::Default,
            };

            let err_callback = |err| {
                eprintln!("Audio stream error: {}", err);
            };

            // i16/16kHz/mono first: the common backends convert transparently.
            let buffer = Arc::clone(&self.buffer);
            if let Ok(stream) = self.device.build_input_stream(
                &preferred_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                err_callback,
                None,
            ) {
                return Ok(stream);
            }

            self.build_stream_native()
        }

        /// Capture at the device's native format and convert in software.
        fn build_stream_native(&self) -> Result<cpal::Stream> {
            use cpal::SampleFormat;

            let default_config =
                self.device
                    .default_input_config()
                    .map_err(|e| VoxlinkError::AudioCapture {
                        message: format!("Failed to query default input config: {}", e),
                    })?;

            let native_rate = default_config.sample_rate();
            let native_channels = default_config.channels() as usize;
            let target_rate = self.sample_rate;
            let stream_config: cpal::StreamConfig = default_config.clone().into();

            let err_callback = |err| {
                eprintln!("Audio stream error: {}", err);
            };

            let buffer = Arc::clone(&self.buffer);

            match default_config.sample_format() {
                SampleFormat::I16 => self
                    .device
                    .build_input_stream(
                        &stream_config,
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            let converted =
                                to_mono_target_rate(data, native_channels, native_rate, target_rate);
                            if let Ok(mut buf) = buffer.lock() {
                                buf.extend_from_slice(&converted);
                            }
                        },
                        err_callback,
                        None,
                    )
                    .map_err(|e| VoxlinkError::AudioCapture {
                        message: format!("Failed to build native i16 stream: {}", e),
                    }),
                SampleFormat::I32 => self
                    .device
                    .build_input_stream(
                        &stream_config,
                        move |data: &[i32], _: &cpal::InputCallbackInfo| {
                            let narrowed: Vec<i16> =
                                data.iter().map(|&s| narrow_sample(s)).collect();
                            let converted = to_mono_target_rate(
                                &narrowed,
                                native_channels,
                                native_rate,
                                target_rate,
                            );
                            if let Ok(mut buf) = buffer.lock() {
                                buf.extend_from_slice(&converted);
                            }
                        },
                        err_callback,
                        None,
                    )
                    .map_err(|e| VoxlinkError::AudioCapture {
                        message: format!("Failed to build native i32 stream: {}", e),
                    }),
                SampleFormat::F32 => self
                    .device
                    .build_input_stream(
                        &stream_config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            let i16_data: Vec<i16> = data
                                .iter()
                                .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                                .collect();
                            let converted = to_mono_target_rate(
                                &i16_data,
                                native_channels,
                                native_rate,
                                target_rate,
                            );
                            if let Ok(mut buf) = buffer.lock() {
                                buf.extend_from_slice(&converted);
                            }
                        },
                        err_callback,
                        None,
                    )
                    .map_err(|e| VoxlinkError::AudioCapture {
                        message: format!("Failed to build native f32 stream: {}", e),
                    }),
                fmt => Err(VoxlinkError::AudioCapture {
                    message: format!("Unsupported native sample format: {:?}", fmt),
                }),
            }
        }
    }

    /// Mix multi-channel audio to mono and resample to the target rate.
    fn to_mono_target_rate(
        samples: &[i16],
        channels: usize,
        source_rate: u32,
        target_rate: u32,
    ) -> Vec<i16> {
        let mono: Vec<i16> = if channels == 1 {
            samples.to_vec()
        } else {
            samples
                .chunks_exact(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / channels as i32) as i16
                })
                .collect()
        };

        if source_rate == target_rate {
            mono
        } else {
            crate::audio::wav::resample(&mono, source_rate, target_rate)
        }
    }

    impl AudioSource for CpalAudioSource {
        fn start(&mut self) -> Result<()> {
            {
                let guard = self.stream.lock().map_err(|e| VoxlinkError::AudioCapture {
                    message: format!("Failed to lock stream: {}", e),
                })?;
                if guard.is_some() {
                    return Ok(()); // Already started
                }
            }

            let stream = self.build_stream()?;
            stream.play().map_err(|e| VoxlinkError::AudioCapture {
                message: format!("Failed to start audio stream: {}", e),
            })?;

            let mut guard = self.stream.lock().map_err(|e| VoxlinkError::AudioCapture {
                message: format!("Failed to lock stream: {}", e),
            })?;
            *guard = Some(SendableStream(stream));
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            let mut guard = self.stream.lock().map_err(|e| VoxlinkError::AudioCapture {
                message: format!("Failed to lock stream: {}", e),
            })?;

            if let Some(stream) = guard.take() {
                stream.0.pause().map_err(|e| VoxlinkError::AudioCapture {
                    message: format!("Failed to stop audio stream: {}", e),
                })?;
            }
            Ok(())
        }

        fn read_samples(&mut self) -> Result<Vec<i16>> {
            let mut buffer = self.buffer.lock().map_err(|e| VoxlinkError::AudioCapture {
                message: format!("Failed to lock audio buffer: {}", e),
            })?;

            Ok(std::mem::take(&mut *buffer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_sample_keeps_high_bits() {
        assert_eq!(narrow_sample(0x7FFF_0000), 0x7FFF);
        assert_eq!(narrow_sample(0x0001_FFFF), 0x0001);
        assert_eq!(narrow_sample(-0x0001_0000), -1);
        assert_eq!(narrow_sample(0), 0);
    }

    #[test]
    fn record_collects_exactly_one_window() {
        let source = MockAudioSource::new().with_samples(vec![7i16; 1_000]);
        let mut session = CaptureSession::new(source)
            .with_sample_rate(100)
            .with_record_secs(2);

        let clip = session.record().unwrap();
        // 100 Hz × 2 s × 2 bytes per sample.
        assert_eq!(clip.len(), 400);
        assert!(!clip.has_wav_header());
    }

    #[test]
    fn record_truncates_overshooting_final_chunk() {
        let source = MockAudioSource::new().with_samples(vec![1i16; 64]);
        let mut session = CaptureSession::new(source)
            .with_sample_rate(10)
            .with_record_secs(1);

        let clip = session.record().unwrap();
        assert_eq!(clip.len(), 20);
    }

    #[test]
    fn record_wav_wraps_the_window() {
        let source = MockAudioSource::new().with_samples(vec![2i16; 50]);
        let mut session = CaptureSession::new(source)
            .with_sample_rate(50)
            .with_record_secs(1);

        let clip = session.record_wav().unwrap();
        assert!(clip.has_wav_header());
        assert_eq!(clip.pcm().len(), 100);
    }

    #[test]
    fn record_assembles_scripted_chunks_in_order() {
        let source = MockAudioSource::new().with_chunks(vec![
            vec![1i16, 2],
            vec![3i16, 4],
            vec![5i16, 6],
        ]);
        let mut session = CaptureSession::new(source)
            .with_sample_rate(6)
            .with_record_secs(1)
            .with_stall_timeout(Duration::from_millis(50));

        let clip = session.record().unwrap();
        assert_eq!(clip.as_bytes(), &[1, 0, 2, 0, 3, 0, 4, 0, 5, 0, 6, 0]);
    }

    #[test]
    fn record_aborts_when_source_stalls() {
        // One chunk, then silence forever: must abort, not hang.
        let source = MockAudioSource::new().with_chunks(vec![vec![1i16; 4]]);
        let mut session = CaptureSession::new(source)
            .with_sample_rate(100)
            .with_record_secs(1)
            .with_stall_timeout(Duration::from_millis(30));

        match session.record() {
            Err(VoxlinkError::AudioCapture { message }) => {
                assert!(message.contains("stalled"));
            }
            _ => panic!("expected AudioCapture stall error"),
        }
    }

    #[test]
    fn record_propagates_start_failure() {
        let source = MockAudioSource::new().with_start_failure();
        let mut session = CaptureSession::new(source);
        assert!(session.record().is_err());
    }

    #[test]
    fn record_propagates_read_failure() {
        let source = MockAudioSource::new().with_read_failure();
        let mut session = CaptureSession::new(source);
        assert!(session.record().is_err());
    }

    #[test]
    fn mock_source_tracks_started_state() {
        let mut source = MockAudioSource::new();
        assert!(!source.is_started());
        source.start().unwrap();
        assert!(source.is_started());
        source.stop().unwrap();
        assert!(!source.is_started());
    }

    #[test]
    fn audio_source_trait_is_object_safe() {
        let mut source: Box<dyn AudioSource> =
            Box::new(MockAudioSource::new().with_samples(vec![1i16, 2, 3]));
        source.start().unwrap();
        assert_eq!(source.read_samples().unwrap(), vec![1i16, 2, 3]);
        source.stop().unwrap();
    }
}
