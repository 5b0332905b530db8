//! Pure frame encoding and the wire constants.
//!
//! Encoding is side-effect free; decoding is the cumulative effect of the
//! byte-at-a-time state machine in [`crate::link::receiver`], because input
//! arrives from an unbuffered stream with no look-ahead.

use crate::error::{Result, VoxlinkError};

/// Start-of-packet sentinel.
pub const SOP: u8 = 0xAA;

/// End-of-packet sentinel.
pub const EOP: u8 = 0x55;

/// Handshake byte answering a verified frame.
pub const ACK: u8 = 0x06;

/// Handshake byte answering a corrupted or rejected frame.
pub const NACK: u8 = 0x15;

/// Bytes of frame overhead around the payload: SOP, two length bytes,
/// checksum, EOP.
pub const OVERHEAD: usize = 5;

/// XOR of all payload bytes.
pub fn xor_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode a payload into its wire frame.
///
/// The length field is 16 bits, so payloads longer than 65535 bytes are a
/// contract violation and are rejected rather than truncated. Empty
/// payloads are rejected too: the receiver discards a declared length of
/// zero without answering, so an empty frame can never be delivered.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.is_empty() {
        return Err(VoxlinkError::FrameEmpty);
    }
    let len = u16::try_from(payload.len()).map_err(|_| VoxlinkError::FrameTooLarge {
        len: payload.len(),
    })?;

    let mut frame = Vec::with_capacity(payload.len() + OVERHEAD);
    frame.push(SOP);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(payload);
    frame.push(xor_checksum(payload));
    frame.push(EOP);
    Ok(frame)
}
