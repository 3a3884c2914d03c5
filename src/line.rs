//! Line driver facade: one physical serial line, split into halves.
//!
//! The receive half belongs to the receive context, which does nothing
//! but move bytes into the line's [`IngestBuffer`].  The transmit half
//! belongs to the line worker.  Decoding never touches either directly.
//!
//! Concrete implementations:
//! - ESP-IDF UART (`adapters::uart`, target only)
//! - scripted mocks (tests)

use crate::error::LineError;
use crate::ingest::IngestBuffer;

/// Receive half of a serial line.
pub trait LineRx {
    /// At least one received byte is waiting in the driver.
    fn readable(&mut self) -> bool;

    /// Take one received byte.  Only called after `readable()` was `true`.
    fn receive_byte(&mut self) -> Result<u8, LineError>;
}

/// Transmit half of a serial line.
pub trait LineTx {
    /// The driver can accept an outbound frame right now.
    fn writable(&mut self) -> bool;

    /// Queue `bytes` for transmission.
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), LineError>;
}

/// Receive hook: move every byte the driver holds into `buffer`.
///
/// Bounded to one buffer's worth of bytes per call so a babbling line
/// cannot pin the receive context.  Bytes refused by a full buffer are
/// counted there and dropped here.  Returns the number of bytes read from
/// the driver.
pub fn receive_pending<const N: usize>(
    rx: &mut impl LineRx,
    buffer: &IngestBuffer<N>,
) -> Result<usize, LineError> {
    let mut read = 0;
    while read < N && rx.readable() {
        let byte = rx.receive_byte()?;
        buffer.push(byte);
        read += 1;
    }
    Ok(read)
}

/// A line with nothing attached: never readable, swallows writes.
pub struct NullLine;

impl LineRx for NullLine {
    fn readable(&mut self) -> bool {
        false
    }

    fn receive_byte(&mut self) -> Result<u8, LineError> {
        Err(LineError::ReadFailed)
    }
}

impl LineTx for NullLine {
    fn writable(&mut self) -> bool {
        true
    }

    fn send_bytes(&mut self, _bytes: &[u8]) -> Result<(), LineError> {
        Ok(())
    }
}
