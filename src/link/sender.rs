//! Framed sender with the one-byte delivery handshake.
//!
//! The sender is generic over the port so the whole delivery path runs
//! against in-memory mocks in tests. The port's read timeout is the bound
//! on the handshake wait: a real serial port is opened with a timeout in
//! [`crate::link::serial`], and a read that times out (or yields nothing)
//! counts as a missed handshake.

use crate::error::{Result, VoxlinkError};
use crate::link::frame::{self, ACK, NACK};
use std::fmt;
use std::io::{ErrorKind, Read, Write};

/// Outcome of one delivery attempt's handshake wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// The peer verified and accepted the frame.
    Ack,
    /// The peer detected corruption and discarded the frame.
    Nack,
    /// No handshake byte arrived within the port's read timeout.
    Timeout,
}

impl fmt::Display for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handshake::Ack => write!(f, "ack"),
            Handshake::Nack => write!(f, "nack"),
            Handshake::Timeout => write!(f, "timeout"),
        }
    }
}

/// Writes framed payloads to the link and resolves each with a handshake.
///
/// At most one frame is in flight at a time: `send` does not return until
/// the frame is acknowledged, refused, or the bounded wait lapses on the
/// final attempt.
pub struct LinkSender<P> {
    port: P,
    attempts: u32,
}

impl<P: Read + Write> LinkSender<P> {
    /// Wrap a port with the default attempt budget.
    pub fn new(port: P) -> Self {
        Self::with_attempts(port, crate::defaults::SEND_ATTEMPTS)
    }

    /// Wrap a port with a custom attempt budget (minimum one).
    pub fn with_attempts(port: P, attempts: u32) -> Self {
        Self {
            port,
            attempts: attempts.max(1),
        }
    }

    /// Deliver a payload, retrying on NACK or handshake timeout.
    ///
    /// Returns `Ok(())` once the peer acknowledges. When the attempt budget
    /// is exhausted the last outcome is surfaced so the caller can decide
    /// whether the cycle is worth repeating.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        let frame = frame::encode(payload)?;

        let mut last = Handshake::Timeout;
        for _ in 0..self.attempts {
            last = self.deliver(&frame)?;
            if last == Handshake::Ack {
                return Ok(());
            }
        }

        Err(VoxlinkError::DeliveryFailed {
            attempts: self.attempts,
            last: last.to_string(),
        })
    }

    /// Make a single delivery attempt and report the raw handshake outcome.
    pub fn send_once(&mut self, payload: &[u8]) -> Result<Handshake> {
        let frame = frame::encode(payload)?;
        self.deliver(&frame)
    }

    /// Give the port back, e.g. to hand the same link to a receiver pump.
    pub fn into_port(self) -> P {
        self.port
    }

    fn deliver(&mut self, frame: &[u8]) -> Result<Handshake> {
        self.port.write_all(frame)?;
        self.port.flush()?;
        self.read_handshake()
    }

    /// Wait (bounded by the port's read timeout) for one handshake byte.
    ///
    /// Bytes other than ACK/NACK are skipped: they are stale frame noise
    /// from an earlier, abandoned exchange, and consuming them here is what
    /// keeps the next frame's handshake unambiguous.
    fn read_handshake(&mut self) -> Result<Handshake> {
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Ok(Handshake::Timeout),
                Ok(_) => match byte[0] {
                    ACK => return Ok(Handshake::Ack),
                    NACK => return Ok(Handshake::Nack),
                    _ => continue,
                },
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(Handshake::Timeout);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
