//! Node loop composition: the capture node and the speaker node.
//!
//! Both loops share the same fault posture: every detected error is
//! reported and returns control to the top of the cycle. Nothing here is
//! fatal to the process; a dead serial port or an unreachable service
//! surfaces on the next cycle too, and the operator reads it from the
//! status output.

use crate::audio::buffer::AudioBuffer;
use crate::audio::capture::{CaptureSession, CpalAudioSource};
use crate::audio::playback::{CpalAudioOutput, PlaybackSink};
use crate::config::{Config, RelayMode};
use crate::error::{Result, VoxlinkError};
use crate::link::receiver::{LinkEvent, LinkReceiver};
use crate::link::sender::LinkSender;
use crate::link::serial;
use crate::remote::client::TranslationClient;
use crate::remote::fingerprint::DedupGate;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

/// Options for the capture node, resolved from CLI flags.
#[derive(Debug, Default)]
pub struct CaptureOptions {
    /// Send this WAV file instead of recording from the microphone.
    pub file: Option<PathBuf>,
    /// Exit after one cycle.
    pub once: bool,
    /// Audio input device override.
    pub device: Option<String>,
}

/// Options for the speaker node, resolved from CLI flags.
#[derive(Debug, Default)]
pub struct SpeakOptions {
    /// Also save each received clip under this directory.
    pub save: Option<PathBuf>,
    /// Audio output device override.
    pub device: Option<String>,
}

/// Run the capture node: record (or poll), translate, forward.
pub async fn run_capture_node(config: Config, opts: CaptureOptions, quiet: bool) -> Result<()> {
    let port_path = require_port(&config)?;
    let port = serial::open(
        &port_path,
        config.link.baud,
        Duration::from_millis(config.link.ack_timeout_ms),
    )?;
    let mut sender = LinkSender::with_attempts(port, config.link.send_attempts);

    let client = TranslationClient::with_timeout(
        &config.remote.endpoint,
        Duration::from_millis(config.remote.http_timeout_ms),
    )?
    .with_max_response_bytes(config.remote.max_response_bytes);

    if !quiet {
        eprintln!(
            "Capture node up: {} mode, link {} @ {} baud, service {}",
            match config.remote.mode {
                RelayMode::Push => "push",
                RelayMode::Poll => "poll",
            },
            port_path,
            config.link.baud,
            config.remote.endpoint
        );
    }

    let interval = Duration::from_millis(config.remote.poll_interval_ms);
    let mut gate = DedupGate::new();

    loop {
        let outcome = match config.remote.mode {
            RelayMode::Push => push_cycle(&config, &opts, &client, &mut sender, quiet).await,
            RelayMode::Poll => poll_cycle(&client, &mut sender, &mut gate, quiet).await,
        };

        if let Err(e) = outcome {
            eprintln!("Cycle failed: {}", e);
        }

        if opts.once {
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }
}

/// One push cycle: capture, upload, forward the translation.
async fn push_cycle<P: Read + Write>(
    config: &Config,
    opts: &CaptureOptions,
    client: &TranslationClient,
    sender: &mut LinkSender<P>,
    quiet: bool,
) -> Result<()> {
    let clip = match &opts.file {
        Some(path) => AudioBuffer::from_wav_file(path)?,
        None => {
            if !quiet {
                eprintln!("Recording {}s...", config.audio.record_secs);
            }
            let source = CpalAudioSource::new(config.audio.capture_device.as_deref())?;
            CaptureSession::new(source)
                .with_sample_rate(config.audio.sample_rate)
                .with_record_secs(config.audio.record_secs)
                .record_wav()?
        }
    };

    if !quiet {
        eprintln!("Uploading {} bytes...", clip.len());
    }
    let translated = client.translate(clip).await?;

    if !quiet {
        eprintln!("Forwarding {} bytes over the link...", translated.len());
    }
    sender.send(translated.as_bytes())?;

    if !quiet {
        eprintln!("Delivered.");
    }
    Ok(())
}

/// One poll cycle: fetch the current translation, forward it only if it
/// changed since the last one consumed.
async fn poll_cycle<P: Read + Write>(
    client: &TranslationClient,
    sender: &mut LinkSender<P>,
    gate: &mut DedupGate,
    quiet: bool,
) -> Result<()> {
    let clip = client.poll_current().await?;

    if gate.is_duplicate(clip.as_bytes()) {
        if !quiet {
            eprintln!("Translation unchanged, skipping.");
        }
        return Ok(());
    }

    if !quiet {
        eprintln!("New translation ({} bytes), forwarding...", clip.len());
    }
    sender.send(clip.as_bytes())?;
    // Only a delivered clip counts as consumed; a failed send retries the
    // same content next cycle.
    gate.mark_consumed(clip.as_bytes());

    if !quiet {
        eprintln!("Delivered.");
    }
    Ok(())
}

/// How long a half-received frame may sit without new bytes before the
/// receive machine is reset to scanning.
const STALLED_FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Run the speaker node: receive frames from the link, play them.
pub fn run_speaker_node(config: Config, opts: SpeakOptions, quiet: bool) -> Result<()> {
    let port_path = require_port(&config)?;
    // Short read timeout: the loop stays responsive without burning a core.
    let mut port = serial::open(&port_path, config.link.baud, Duration::from_millis(50))?;

    let output = CpalAudioOutput::new(opts.device.as_deref())?;
    let mut sink = PlaybackSink::new(output).with_chunk_bytes(config.audio.playback_chunk_bytes);
    let mut receiver = LinkReceiver::with_max_payload(config.link.max_frame_bytes);

    if !quiet {
        eprintln!(
            "Speaker node up: link {} @ {} baud, waiting for frames...",
            port_path, config.link.baud
        );
    }

    let mut clip_index: u64 = 0;
    let mut buf = [0u8; 256];
    let mut last_byte = std::time::Instant::now();

    loop {
        let n = match port.read(&mut buf) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                // A peer that stalls mid-frame must not pin the machine in
                // a partial state forever.
                if !receiver.is_idle() && last_byte.elapsed() > STALLED_FRAME_TIMEOUT {
                    eprintln!("Peer stalled mid-frame, resynchronizing.");
                    receiver.reset();
                }
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if n > 0 {
            last_byte = std::time::Instant::now();
        }

        for &byte in &buf[..n] {
            let Some(event) = receiver.push_byte(byte) else {
                continue;
            };

            if let Some(handshake) = event.handshake() {
                port.write_all(&[handshake])?;
            }

            match event {
                LinkEvent::Frame(payload) => {
                    clip_index += 1;
                    if !quiet {
                        eprintln!("Received clip {}: {} bytes", clip_index, payload.len());
                    }
                    let clip = AudioBuffer::from_bytes(payload);

                    if let Some(dir) = &opts.save
                        && let Err(e) = save_clip(dir, clip_index, &clip)
                    {
                        eprintln!("Failed to save clip {}: {}", clip_index, e);
                    }

                    // A playback fault abandons this clip, not the node.
                    match sink.play(clip) {
                        Ok(bytes) => {
                            if !quiet {
                                eprintln!("Played {} bytes.", bytes);
                            }
                        }
                        Err(e) => eprintln!("Playback failed: {}", e),
                    }
                }
                LinkEvent::Corrupted(fault) => {
                    eprintln!("Corrupt frame discarded: {:?}", fault);
                }
                LinkEvent::Rejected(reason) => {
                    eprintln!("Frame refused: {:?}", reason);
                }
            }
        }
    }
}

fn require_port(config: &Config) -> Result<String> {
    config
        .link
        .port
        .clone()
        .ok_or_else(|| VoxlinkError::ConfigInvalidValue {
            key: "link.port".to_string(),
            message: "a serial port is required (set link.port or pass --port)".to_string(),
        })
}

fn save_clip(dir: &PathBuf, index: u64, clip: &AudioBuffer) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("clip-{:04}.wav", index));
    clip.save_wav_file(&path)
}
