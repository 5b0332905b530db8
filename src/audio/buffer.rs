//! The owned audio clip exchanged between every pipeline stage.

use crate::audio::wav;
use crate::defaults::SAMPLE_RATE;
use crate::error::Result;
use std::path::Path;

/// An owned, length-tagged byte region holding either raw PCM or a whole
/// WAV container.
///
/// A buffer is exclusively owned by whichever component currently holds it
/// and is transferred by move across stage boundaries: capture hands it to
/// the uploader, the receiver hands it to playback, and each stage drops
/// it as soon as the next one has consumed it. Whether a header is present
/// is decided by the literal `RIFF` tag at offset 0, never by a flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    bytes: Vec<u8>,
}

impl AudioBuffer {
    /// Wrap raw bytes received from the wire or the remote service.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Build a buffer of raw PCM from 16-bit mono samples.
    pub fn from_samples(samples: &[i16]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        Self { bytes }
    }

    /// Load a WAV file from disk, normalized to a canonical 16kHz mono
    /// clip ready for upload.
    pub fn from_wav_file(path: &Path) -> Result<Self> {
        let samples = wav::load_pcm_file(path)?;
        Ok(Self::from_samples(&samples).into_wav(SAMPLE_RATE))
    }

    /// Prepend the canonical 44-byte header describing the current payload.
    ///
    /// A buffer that already carries a header is returned unchanged; the
    /// header must describe the payload truthfully and re-wrapping would
    /// bury the old one inside the data region.
    pub fn into_wav(self, sample_rate: u32) -> Self {
        if self.has_wav_header() {
            return self;
        }
        let header = wav::build_header(self.bytes.len() as u32, sample_rate);
        let mut bytes = Vec::with_capacity(wav::HEADER_LEN + self.bytes.len());
        bytes.extend_from_slice(&header);
        bytes.extend_from_slice(&self.bytes);
        Self { bytes }
    }

    /// True when the clip begins with a WAV header.
    pub fn has_wav_header(&self) -> bool {
        wav::has_riff_tag(&self.bytes)
    }

    /// The PCM region: everything after the header when one is present,
    /// the whole buffer otherwise.
    pub fn pcm(&self) -> &[u8] {
        if self.has_wav_header() {
            &self.bytes[wav::HEADER_LEN..]
        } else {
            &self.bytes
        }
    }

    /// Total length in bytes, header included.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The full byte region (what gets framed onto the wire).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the buffer, e.g. to hand the bytes to an HTTP body.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Write the clip to disk as a WAV file, adding the canonical header
    /// if the clip is raw PCM.
    pub fn save_wav_file(&self, path: &Path) -> Result<()> {
        if self.has_wav_header() {
            std::fs::write(path, &self.bytes)?;
        } else {
            let header = wav::build_header(self.bytes.len() as u32, SAMPLE_RATE);
            let mut out = Vec::with_capacity(wav::HEADER_LEN + self.bytes.len());
            out.extend_from_slice(&header);
            out.extend_from_slice(&self.bytes);
            std::fs::write(path, &out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_samples_encodes_little_endian() {
        let clip = AudioBuffer::from_samples(&[0x0102i16, -1]);
        assert_eq!(clip.as_bytes(), &[0x02, 0x01, 0xFF, 0xFF]);
    }

    #[test]
    fn raw_pcm_has_no_header() {
        let clip = AudioBuffer::from_samples(&[1i16; 100]);
        assert!(!clip.has_wav_header());
        assert_eq!(clip.pcm().len(), 200);
    }

    #[test]
    fn into_wav_prepends_canonical_header() {
        let clip = AudioBuffer::from_samples(&[1i16; 100]).into_wav(16_000);

        assert!(clip.has_wav_header());
        assert_eq!(clip.len(), 44 + 200);
        assert_eq!(clip.pcm().len(), 200);
        assert_eq!(wav::header_data_size(clip.as_bytes()), Some(200));
    }

    #[test]
    fn into_wav_is_idempotent() {
        let once = AudioBuffer::from_samples(&[1i16; 50]).into_wav(16_000);
        let twice = once.clone().into_wav(16_000);
        assert_eq!(once, twice);
    }

    #[test]
    fn header_invariant_data_size_matches_payload() {
        let clip = AudioBuffer::from_samples(&[7i16; 321]).into_wav(16_000);
        let data_size = wav::header_data_size(clip.as_bytes()).unwrap() as usize;
        assert_eq!(data_size, clip.len() - wav::HEADER_LEN);
    }

    #[test]
    fn pcm_skips_header_only_when_tag_present() {
        // Bytes that merely start with 'R' are not a header.
        let fake = AudioBuffer::from_bytes(b"RIFX".iter().chain([0u8; 60].iter()).copied().collect());
        assert!(!fake.has_wav_header());
        assert_eq!(fake.pcm().len(), 64);
    }

    #[test]
    fn short_riff_prefix_is_not_a_header() {
        let clip = AudioBuffer::from_bytes(b"RIFF".to_vec());
        assert!(!clip.has_wav_header());
        assert_eq!(clip.pcm(), b"RIFF");
    }

    #[test]
    fn save_and_reload_round_trips_pcm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");

        let samples: Vec<i16> = (0..1_000).map(|i| (i % 128) as i16).collect();
        let clip = AudioBuffer::from_samples(&samples);
        clip.save_wav_file(&path).unwrap();

        let reloaded = AudioBuffer::from_wav_file(&path).unwrap();
        assert!(reloaded.has_wav_header());
        assert_eq!(reloaded.pcm(), clip.as_bytes());
    }

    #[test]
    fn from_wav_file_normalizes_to_canonical_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [10i16, 20, 30, 40] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let clip = AudioBuffer::from_wav_file(&path).unwrap();
        assert!(clip.has_wav_header());
        assert_eq!(wav::header_data_size(clip.as_bytes()), Some(8));
    }

    #[test]
    fn empty_buffer_reports_empty() {
        let clip = AudioBuffer::from_bytes(Vec::new());
        assert!(clip.is_empty());
        assert_eq!(clip.len(), 0);
        assert!(!clip.has_wav_header());
    }

    #[test]
    fn into_bytes_hands_back_the_region() {
        let clip = AudioBuffer::from_bytes(vec![1, 2, 3]);
        assert_eq!(clip.into_bytes(), vec![1, 2, 3]);
    }
}
