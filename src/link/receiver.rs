//! Byte-at-a-time receive state machine for the serial link.
//!
//! The machine is pure: `push_byte` consumes one byte and optionally emits
//! a [`LinkEvent`]. No I/O happens here; the caller owns the port, writes
//! the handshake byte an event asks for, and hands completed payloads to
//! the playback side. That keeps the whole protocol unit-testable against
//! plain byte slices.
//!
//! A frame is always fully resolved (accepted or rejected) before the next
//! byte of a new frame is interpreted. Any fault returns the machine to
//! `AwaitStart`, where it scans for the next start sentinel — the
//! resynchronization path after corruption.

use crate::defaults;
use crate::link::frame::{ACK, EOP, NACK, SOP};

/// Why an in-progress frame was declared corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The checksum byte did not match the running XOR of the payload.
    Checksum { expected: u8, actual: u8 },
    /// The byte after the checksum was not the end-of-packet sentinel.
    Trailer { actual: u8 },
}

/// Why a declared frame was refused before its payload was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Declared length of zero. Discarded without a handshake, matching the
    /// reference behavior for this edge case.
    EmptyFrame,
    /// Declared length above the configured cap. Answered with NACK so the
    /// peer's bounded wait resolves instead of timing out.
    Oversize { declared: usize, max: usize },
}

/// Outcome of consuming one byte, when that byte completes something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A complete frame passed checksum and trailer checks. The payload is
    /// handed off by move; the receiver keeps nothing.
    Frame(Vec<u8>),
    /// Checksum or trailer mismatch. The payload was discarded.
    Corrupted(FaultKind),
    /// The frame was refused at the length stage.
    Rejected(RejectReason),
}

impl LinkEvent {
    /// The handshake byte the caller must write back on the link for this
    /// event, if any.
    pub fn handshake(&self) -> Option<u8> {
        match self {
            LinkEvent::Frame(_) => Some(ACK),
            LinkEvent::Corrupted(_) => Some(NACK),
            LinkEvent::Rejected(RejectReason::Oversize { .. }) => Some(NACK),
            LinkEvent::Rejected(RejectReason::EmptyFrame) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitStart,
    ReadLength { low: Option<u8> },
    ReadPayload,
    ReadChecksum,
    ReadTrailer,
}

/// The receive state machine.
///
/// One frame's payload buffer is in flight at a time, exclusively owned by
/// the machine until a verified frame is emitted. `reset` is public so a
/// supervisor can bound the cost of a stalled peer.
#[derive(Debug)]
pub struct LinkReceiver {
    state: State,
    expected_len: usize,
    checksum: u8,
    payload: Vec<u8>,
    max_payload: usize,
}

impl LinkReceiver {
    /// Create a receiver accepting payloads up to the default clip limit.
    pub fn new() -> Self {
        Self::with_max_payload(defaults::MAX_CLIP_BYTES)
    }

    /// Create a receiver with a custom payload cap (resource-exhaustion
    /// guard for constrained deployments).
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            state: State::AwaitStart,
            expected_len: 0,
            checksum: 0,
            payload: Vec::new(),
            max_payload,
        }
    }

    /// True when the machine is scanning for a start sentinel.
    pub fn is_idle(&self) -> bool {
        self.state == State::AwaitStart
    }

    /// Abandon any in-progress frame and return to scanning.
    pub fn reset(&mut self) {
        self.state = State::AwaitStart;
        self.expected_len = 0;
        self.checksum = 0;
        self.payload = Vec::new();
    }

    /// Consume one byte from the wire.
    pub fn push_byte(&mut self, byte: u8) -> Option<LinkEvent> {
        match self.state {
            State::AwaitStart => {
                if byte == SOP {
                    self.expected_len = 0;
                    self.checksum = 0;
                    self.payload = Vec::new();
                    self.state = State::ReadLength { low: None };
                }
                None
            }
            State::ReadLength { low: None } => {
                self.state = State::ReadLength { low: Some(byte) };
                None
            }
            State::ReadLength { low: Some(low) } => {
                let declared = u16::from_le_bytes([low, byte]) as usize;
                if declared == 0 {
                    self.reset();
                    return Some(LinkEvent::Rejected(RejectReason::EmptyFrame));
                }
                if declared > self.max_payload {
                    let max = self.max_payload;
                    self.reset();
                    return Some(LinkEvent::Rejected(RejectReason::Oversize {
                        declared,
                        max,
                    }));
                }
                self.expected_len = declared;
                self.payload = Vec::with_capacity(declared);
                self.state = State::ReadPayload;
                None
            }
            State::ReadPayload => {
                self.payload.push(byte);
                self.checksum ^= byte;
                if self.payload.len() == self.expected_len {
                    self.state = State::ReadChecksum;
                }
                None
            }
            State::ReadChecksum => {
                if byte != self.checksum {
                    let expected = self.checksum;
                    self.reset();
                    return Some(LinkEvent::Corrupted(FaultKind::Checksum {
                        expected,
                        actual: byte,
                    }));
                }
                self.state = State::ReadTrailer;
                None
            }
            State::ReadTrailer => {
                if byte != EOP {
                    self.reset();
                    return Some(LinkEvent::Corrupted(FaultKind::Trailer { actual: byte }));
                }
                let payload = std::mem::take(&mut self.payload);
                self.reset();
                Some(LinkEvent::Frame(payload))
            }
        }
    }
}

impl Default for LinkReceiver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::frame::encode;

    /// Feed a byte slice, collecting every event.
    fn feed(rx: &mut LinkReceiver, bytes: &[u8]) -> Vec<LinkEvent> {
        bytes.iter().filter_map(|&b| rx.push_byte(b)).collect()
    }

    #[test]
    fn decodes_known_frame_and_acks() {
        let mut rx = LinkReceiver::new();
        let events = feed(&mut rx, &[0xAA, 0x04, 0x00, 0x01, 0x02, 0x03, 0x04, 0x04, 0x55]);

        assert_eq!(events.len(), 1);
        match &events[0] {
            LinkEvent::Frame(payload) => assert_eq!(payload, &vec![0x01, 0x02, 0x03, 0x04]),
            other => panic!("expected Frame, got {:?}", other),
        }
        assert_eq!(events[0].handshake(), Some(ACK));
        assert!(rx.is_idle());
    }

    #[test]
    fn corrupted_checksum_emits_nack_and_resets() {
        let mut rx = LinkReceiver::new();
        // Same frame as above but checksum byte corrupted to 0x05.
        let events = feed(&mut rx, &[0xAA, 0x04, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x55]);

        assert_eq!(
            events,
            vec![LinkEvent::Corrupted(FaultKind::Checksum {
                expected: 0x04,
                actual: 0x05,
            })]
        );
        assert_eq!(events[0].handshake(), Some(NACK));
        assert!(rx.is_idle());
    }

    #[test]
    fn zero_length_frame_is_discarded_without_handshake() {
        let mut rx = LinkReceiver::new();
        let events = feed(&mut rx, &[0xAA, 0x00, 0x00]);

        assert_eq!(events, vec![LinkEvent::Rejected(RejectReason::EmptyFrame)]);
        assert_eq!(events[0].handshake(), None);
        assert!(rx.is_idle());
    }

    #[test]
    fn trailer_mismatch_is_treated_as_corruption() {
        let mut rx = LinkReceiver::new();
        let events = feed(&mut rx, &[0xAA, 0x01, 0x00, 0x42, 0x42, 0x00]);

        assert_eq!(
            events,
            vec![LinkEvent::Corrupted(FaultKind::Trailer { actual: 0x00 })]
        );
        assert_eq!(events[0].handshake(), Some(NACK));
    }

    #[test]
    fn round_trip_reproduces_payload_exactly() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(4_000).collect();
        let frame = encode(&payload).unwrap();

        let mut rx = LinkReceiver::new();
        let events = feed(&mut rx, &frame);

        assert_eq!(events, vec![LinkEvent::Frame(payload)]);
    }

    #[test]
    fn payload_may_contain_sentinel_bytes() {
        // The length counter, not the trailer scan, delimits the payload.
        let payload = vec![SOP, EOP, SOP, EOP];
        let frame = encode(&payload).unwrap();

        let mut rx = LinkReceiver::new();
        let events = feed(&mut rx, &frame);

        assert_eq!(events, vec![LinkEvent::Frame(payload)]);
    }

    #[test]
    fn noise_before_start_sentinel_is_ignored() {
        let mut rx = LinkReceiver::new();
        let mut bytes = vec![0x00, 0x55, 0x13, 0x37];
        bytes.extend(encode(&[0x09]).unwrap());

        let events = feed(&mut rx, &bytes);
        assert_eq!(events, vec![LinkEvent::Frame(vec![0x09])]);
    }

    #[test]
    fn single_bit_flip_in_payload_is_detected() {
        let payload = vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
        let clean = encode(&payload).unwrap();

        // Flip every bit of every payload byte, one at a time.
        for byte_idx in 3..3 + payload.len() {
            for bit in 0..8 {
                let mut frame = clean.clone();
                frame[byte_idx] ^= 1 << bit;

                let mut rx = LinkReceiver::new();
                let events = feed(&mut rx, &frame);

                assert!(
                    events
                        .iter()
                        .all(|e| !matches!(e, LinkEvent::Frame(_))),
                    "flip at byte {} bit {} must not complete a frame",
                    byte_idx,
                    bit
                );
                assert!(rx.is_idle());
            }
        }
    }

    #[test]
    fn single_bit_flip_in_checksum_is_detected() {
        let payload = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let clean = encode(&payload).unwrap();
        let checksum_idx = clean.len() - 2;

        for bit in 0..8 {
            let mut frame = clean.clone();
            frame[checksum_idx] ^= 1 << bit;

            let mut rx = LinkReceiver::new();
            let events = feed(&mut rx, &frame);

            assert_eq!(events.len(), 1);
            assert!(matches!(events[0], LinkEvent::Corrupted(_)));
        }
    }

    #[test]
    fn resynchronizes_after_corruption() {
        let first = {
            let mut f = encode(&[0x01, 0x02]).unwrap();
            let checksum_idx = f.len() - 2;
            f[checksum_idx] ^= 0xFF; // corrupt
            f
        };
        let second = encode(&[0x0A, 0x0B, 0x0C]).unwrap();

        let mut rx = LinkReceiver::new();
        let mut events = feed(&mut rx, &first);
        events.extend(feed(&mut rx, &second));

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LinkEvent::Corrupted(_)));
        assert_eq!(events[1], LinkEvent::Frame(vec![0x0A, 0x0B, 0x0C]));
    }

    #[test]
    fn resynchronizes_after_zero_length_frame() {
        let mut rx = LinkReceiver::new();
        let mut bytes = vec![0xAA, 0x00, 0x00];
        bytes.extend(encode(&[0x77]).unwrap());

        let events = feed(&mut rx, &bytes);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], LinkEvent::Frame(vec![0x77]));
    }

    #[test]
    fn oversize_declared_length_is_refused_with_nack() {
        let mut rx = LinkReceiver::with_max_payload(16);
        let events = feed(&mut rx, &[0xAA, 0x11, 0x00]); // declares 17 bytes

        assert_eq!(
            events,
            vec![LinkEvent::Rejected(RejectReason::Oversize {
                declared: 17,
                max: 16,
            })]
        );
        assert_eq!(events[0].handshake(), Some(NACK));
        assert!(rx.is_idle());
    }

    #[test]
    fn max_payload_boundary_is_accepted() {
        let mut rx = LinkReceiver::with_max_payload(4);
        let frame = encode(&[1, 2, 3, 4]).unwrap();
        let events = feed(&mut rx, &frame);
        assert_eq!(events, vec![LinkEvent::Frame(vec![1, 2, 3, 4])]);
    }

    #[test]
    fn reset_abandons_in_progress_frame() {
        let mut rx = LinkReceiver::new();
        // Start a frame declaring 4 bytes, deliver only 2.
        feed(&mut rx, &[0xAA, 0x04, 0x00, 0x01, 0x02]);
        assert!(!rx.is_idle());

        rx.reset();
        assert!(rx.is_idle());

        // A fresh frame decodes normally afterwards.
        let events = feed(&mut rx, &encode(&[0x42]).unwrap());
        assert_eq!(events, vec![LinkEvent::Frame(vec![0x42])]);
    }

    #[test]
    fn two_back_to_back_frames_decode_independently() {
        let mut rx = LinkReceiver::new();
        let mut bytes = encode(&[0x01]).unwrap();
        bytes.extend(encode(&[0x02, 0x03]).unwrap());

        let events = feed(&mut rx, &bytes);
        assert_eq!(
            events,
            vec![
                LinkEvent::Frame(vec![0x01]),
                LinkEvent::Frame(vec![0x02, 0x03]),
            ]
        );
    }

    #[test]
    fn frame_is_resolved_before_next_byte_matters() {
        // A frame followed by garbage: the garbage is scanned, not appended.
        let mut rx = LinkReceiver::new();
        let mut bytes = encode(&[0x0F]).unwrap();
        bytes.extend([0x00, 0x00, 0x00]);

        let events = feed(&mut rx, &bytes);
        assert_eq!(events, vec![LinkEvent::Frame(vec![0x0F])]);
        assert!(rx.is_idle());
    }
}
