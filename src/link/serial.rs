//! Opening and enumerating real serial ports.
//!
//! The framing layer is generic over `Read + Write`; this module is the
//! only place that touches the `serialport` crate. The read timeout set
//! here is what bounds the sender's handshake wait and the receiver pump's
//! idle polling.

use crate::error::{Result, VoxlinkError};
use serialport::SerialPort;
use std::time::Duration;

/// Open the link port at the given baud rate with a read timeout.
///
/// 8 data bits, no parity, one stop bit — the `serialport` defaults, which
/// match the peer's UART configuration.
pub fn open(path: &str, baud: u32, timeout: Duration) -> Result<Box<dyn SerialPort>> {
    serialport::new(path, baud)
        .timeout(timeout)
        .open()
        .map_err(|e| VoxlinkError::LinkPort {
            message: format!("Failed to open {} at {} baud: {}", path, baud, e),
        })
}

/// List serial port device paths visible on this machine.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(|e| VoxlinkError::LinkPort {
        message: format!("Failed to enumerate serial ports: {}", e),
    })?;

    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
