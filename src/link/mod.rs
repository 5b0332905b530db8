//! Serial link transport: framing, the receive state machine, and the
//! framed sender with its handshake.
//!
//! The wire format is a delimited, checksummed frame:
//!
//! ```text
//! 0xAA | len_lo | len_hi | payload[len] | checksum | 0x55
//! ```
//!
//! where `checksum` is the XOR of all payload bytes and `len` is a
//! little-endian 16-bit count. The receiver consumes the payload by
//! counting, never by scanning for the trailer, so sentinel values inside
//! audio data cannot mis-delimit a frame. After the trailer the receiver
//! answers with a single handshake byte: ACK `0x06` or NACK `0x15`.

pub mod frame;
pub mod receiver;
pub mod sender;
#[cfg(feature = "serial")]
pub mod serial;

pub use frame::{ACK, EOP, NACK, SOP, encode, xor_checksum};
pub use receiver::{FaultKind, LinkEvent, LinkReceiver, RejectReason};
pub use sender::{Handshake, LinkSender};
