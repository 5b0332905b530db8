//! HTTP round trip against the remote translation service.
//!
//! The exchange is opaque on purpose: upload bytes, receive bytes. The
//! service does speech recognition, translation, and synthesis internally;
//! from the relay's point of view the only contract is the one in the
//! response: a success status with a WAV body, or a non-success status
//! with nothing usable.

use crate::audio::buffer::AudioBuffer;
use crate::defaults;
use crate::error::{Result, VoxlinkError};
use std::time::Duration;

/// Client for the translation endpoint.
///
/// Push mode uploads a freshly captured clip and consumes the response;
/// poll mode requests "the current translation" with an empty body on a
/// fixed cadence, and the caller dedups by fingerprint.
pub struct TranslationClient {
    client: reqwest::Client,
    endpoint: String,
    max_response_bytes: usize,
}

impl TranslationClient {
    /// Build a client for an endpoint with the default request timeout.
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, Duration::from_millis(defaults::HTTP_TIMEOUT_MS))
    }

    /// Build a client with a custom request timeout.
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoxlinkError::RemoteTransport {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            max_response_bytes: defaults::MAX_CLIP_BYTES,
        })
    }

    /// Cap on accepted response bodies.
    pub fn with_max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Push mode: upload a clip, receive its translation.
    ///
    /// The clip is consumed; it must not outlive the cycle that captured
    /// it.
    pub async fn translate(&self, clip: AudioBuffer) -> Result<AudioBuffer> {
        self.request(clip.into_bytes()).await
    }

    /// Poll mode: ask for the current translation without uploading.
    pub async fn poll_current(&self) -> Result<AudioBuffer> {
        self.request(Vec::new()).await
    }

    async fn request(&self, body: Vec<u8>) -> Result<AudioBuffer> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(body)
            .send()
            .await
            .map_err(|e| VoxlinkError::RemoteTransport {
                message: format!("Request to {} failed: {}", self.endpoint, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoxlinkError::RemoteStatus {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VoxlinkError::RemoteTransport {
                message: format!("Failed to read response body: {}", e),
            })?;

        accept_clip(bytes.to_vec(), self.max_response_bytes)
    }
}

/// Validate a response body against the size contract.
///
/// Oversize bodies are refused rather than truncated: a clip cut mid-way
/// would frame and play as garbage, which is worse than skipping a cycle.
fn accept_clip(bytes: Vec<u8>, max: usize) -> Result<AudioBuffer> {
    if bytes.is_empty() {
        return Err(VoxlinkError::RemoteTransport {
            message: "response body was empty".to_string(),
        });
    }
    if bytes.len() > max {
        return Err(VoxlinkError::ResponseTooLarge {
            len: bytes.len(),
            max,
        });
    }
    Ok(AudioBuffer::from_bytes(bytes))
}
