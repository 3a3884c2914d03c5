//! Outbound poll frames and the bounded write path.
//!
//! The original firmware spun on "writable" forever.  Here the wait is
//! bounded by [`WriteBound`] and surfaces as [`LineError::WriteTimeout`].

use embedded_hal::delay::DelayNs;

use crate::config::SystemConfig;
use crate::error::LineError;
use crate::line::LineTx;
use crate::protocol::accum::{BCC_MASK, ETX, STX};

/// M-Bus short-frame start byte.
pub const SHORT_START: u8 = 0x10;
/// M-Bus short-frame end byte.
pub const SHORT_END: u8 = 0x16;
/// REQ_UD2: request user data, class 2.
pub const REQ_UD2: u8 = 0x5B;
/// Primary address of the Seoul meter on its bus.
pub const SEOUL_ADDRESS: u8 = 0x01;

/// `10 5B 01 5C 16`
pub const fn mbus_request() -> [u8; 5] {
    [
        SHORT_START,
        REQ_UD2,
        SEOUL_ADDRESS,
        REQ_UD2.wrapping_add(SEOUL_ADDRESS),
        SHORT_END,
    ]
}

/// `C0 id (C0+id)&7F D0`
pub const fn accum_request(type_id: u8) -> [u8; 4] {
    [STX, type_id, STX.wrapping_add(type_id) & BCC_MASK, ETX]
}

/// How long a send may wait for the line to accept bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBound {
    pub timeout_us: u32,
    pub poll_us: u32,
}

impl WriteBound {
    pub fn from_config(cfg: &SystemConfig) -> Self {
        Self {
            timeout_us: cfg.write_timeout_ms.saturating_mul(1000),
            poll_us: cfg.write_poll_us,
        }
    }
}

impl Default for WriteBound {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}

/// Wait (bounded) for `tx` to become writable, then hand it `frame`.
pub fn send_frame(
    tx: &mut impl LineTx,
    delay: &mut impl DelayNs,
    frame: &[u8],
    bound: WriteBound,
) -> Result<(), LineError> {
    let step = bound.poll_us.max(1);
    let mut waited = 0u32;

    while !tx.writable() {
        if waited >= bound.timeout_us {
            return Err(LineError::WriteTimeout);
        }
        delay.delay_us(step);
        waited = waited.saturating_add(step);
    }

    tx.send_bytes(frame)
}
