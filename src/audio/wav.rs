//! The canonical 44-byte WAV header, plus loading clips from disk.
//!
//! The header layout is fixed: `RIFF`, file size, `WAVE`, a 16-byte `fmt `
//! chunk describing linear PCM, then `data` and the payload size. Nothing
//! here interprets sample content beyond locating the PCM region; loading
//! arbitrary WAV files from disk goes through hound and is normalized to
//! 16kHz mono for the translation service.

use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, VoxlinkError};
use std::path::Path;

/// Size of the canonical header in bytes.
pub const HEADER_LEN: usize = 44;

/// Build the canonical header for a mono 16-bit PCM payload.
///
/// `file_size` is `data_size + 36`: the RIFF chunk covers everything after
/// its own 8-byte preamble.
pub fn build_header(data_size: u32, sample_rate: u32) -> [u8; HEADER_LEN] {
    const CHANNELS: u16 = 1;
    const BITS_PER_SAMPLE: u16 = 16;

    let file_size = data_size + 36;
    let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate * block_align as u32;

    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&file_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // linear PCM
    header[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
    header
}

/// True when the bytes begin with the literal `RIFF` tag and are long
/// enough to hold a whole header.
///
/// Header presence is always decided by this check, never by a flag
/// carried alongside the buffer.
pub fn has_riff_tag(bytes: &[u8]) -> bool {
    bytes.len() > HEADER_LEN && bytes.starts_with(b"RIFF")
}

/// The `data` chunk size recorded in a header, if one is present.
pub fn header_data_size(bytes: &[u8]) -> Option<u32> {
    if !has_riff_tag(bytes) {
        return None;
    }
    let field: [u8; 4] = bytes[40..44].try_into().ok()?;
    Some(u32::from_le_bytes(field))
}

/// Load a WAV file from disk as 16kHz mono samples.
///
/// Accepts arbitrary sample rates and one or two channels; stereo is
/// downmixed and other rates are linearly resampled so a clip from any
/// recorder can be pushed through the relay.
pub fn load_pcm_file(path: &Path) -> Result<Vec<i16>> {
    let mut reader = hound::WavReader::open(path).map_err(|e| VoxlinkError::AudioCapture {
        message: format!("Failed to parse WAV file {}: {}", path.display(), e),
    })?;

    let spec = reader.spec();
    let raw_samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| VoxlinkError::AudioCapture {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

    let mono = if spec.channels == 2 {
        raw_samples
            .chunks_exact(2)
            .map(|pair| {
                let left = pair[0] as i32;
                let right = pair[1] as i32;
                ((left + right) / 2) as i16
            })
            .collect()
    } else if spec.channels == 1 {
        raw_samples
    } else {
        return Err(VoxlinkError::AudioCapture {
            message: format!("Unsupported channel count: {}", spec.channels),
        });
    };

    if spec.sample_rate == SAMPLE_RATE {
        Ok(mono)
    } else {
        Ok(resample(&mono, spec.sample_rate, SAMPLE_RATE))
    }
}

/// Simple linear interpolation resampling.
pub(crate) fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
