//! Meter wire protocols.
//!
//! ```text
//!                ┌──────────────────────┐
//!   byte ──────▶ │ MeterProtocol::feed  │ ──▶ Frame ──▶ bcd ──▶ MeterReading
//!                │ (mbus | accum)       │
//!                └──────────┬───────────┘
//!                           │ Err(FrameError) → state already reset
//!                           ▼
//!                     stats / warn!
//! ```
//!
//! Decoders are fed one byte at a time.  Any violation discards the
//! in-progress frame, returns the decoder to its search state and reports
//! why; it is never fatal.

pub mod accum;
pub mod bcd;
pub mod mbus;

use core::fmt;

use crate::error::RequestError;
use crate::meter::{MeterKind, MeterReading, Protocol};

/// Largest outbound poll frame across protocols.
pub const MAX_REQUEST_LEN: usize = 5;

/// An outbound poll frame, ready for the line.
pub type RequestFrame = heapless::Vec<u8, MAX_REQUEST_LEN>;

/// Copy a fixed-size frame into a [`RequestFrame`].  A frame longer than
/// [`MAX_REQUEST_LEN`] is a compile error.
pub(crate) fn request_frame<const M: usize>(bytes: [u8; M]) -> RequestFrame {
    const { assert!(M <= MAX_REQUEST_LEN, "request frame longer than MAX_REQUEST_LEN") };
    bytes.into_iter().collect()
}

/// A byte-at-a-time frame decoder paired with its request builder.
pub trait MeterProtocol {
    /// Validated frame produced on completion.
    type Frame: DecodedFrame;

    /// Protocol spoken by this decoder.
    const PROTOCOL: Protocol;

    /// Advance the state machine by one received byte.
    ///
    /// `Ok(None)` means "keep feeding"; `Ok(Some(frame))` hands over a
    /// complete, validated frame; `Err` means the in-progress frame was
    /// dropped and the decoder is back in its search state.
    fn feed(&mut self, byte: u8) -> Result<Option<Self::Frame>, FrameError>;

    /// Abandon any in-progress frame.
    fn reset(&mut self);

    /// `true` while hunting for the start of a frame.
    fn is_idle(&self) -> bool;

    /// Build the poll frame for `kind` and prepare the decoder for the
    /// reply.  Fails if `kind` is not spoken on this protocol.
    fn prepare_request(&mut self, kind: MeterKind) -> Result<RequestFrame, RequestError>;
}

/// Conversion of a validated frame into a calibrated reading.
pub trait DecodedFrame {
    /// `None` when the frame is valid but carries no usable value.
    fn reading(&self) -> Option<MeterReading>;
}

/// Coarse classification of rejected frames, used for line statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Unexpected byte for the current state.
    Framing,
    /// Checksum / BCC mismatch.
    Checksum,
    /// Echo or identity field did not match the outstanding request.
    Identity,
}

/// Why a frame in progress was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The two length bytes disagree.
    LengthMismatch { first: u8, second: u8 },
    /// Declared length cannot even hold the C, A and CI fields.
    InvalidLength(u8),
    /// A start marker was expected.
    MissingStart(u8),
    /// Control field has its high bit set.
    ControlHighBit(u8),
    /// More payload bytes than the declared length allows.
    PayloadOverrun,
    /// Checksum or BCC does not match the accumulated value.
    ChecksumMismatch { expected: u8, actual: u8 },
    /// The closing marker was wrong.
    BadEndMarker(u8),
    /// The line echo did not reproduce the request just sent.
    EchoMismatch { expected: u8, actual: u8 },
    /// One of the fixed magic-code bytes was wrong.
    MagicMismatch { index: u8, actual: u8 },
    /// Response identity does not match the outstanding request.
    IdentityMismatch { expected: u8, actual: u8 },
}

impl FrameError {
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::ChecksumMismatch { .. } => ErrorClass::Checksum,
            Self::EchoMismatch { .. } | Self::IdentityMismatch { .. } => ErrorClass::Identity,
            Self::LengthMismatch { .. }
            | Self::InvalidLength(_)
            | Self::MissingStart(_)
            | Self::ControlHighBit(_)
            | Self::PayloadOverrun
            | Self::BadEndMarker(_)
            | Self::MagicMismatch { .. } => ErrorClass::Framing,
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch { first, second } => {
                write!(f, "length bytes differ (0x{first:02X} != 0x{second:02X})")
            }
            Self::InvalidLength(l) => write!(f, "invalid declared length {l}"),
            Self::MissingStart(b) => write!(f, "expected start marker, got 0x{b:02X}"),
            Self::ControlHighBit(b) => write!(f, "control field 0x{b:02X} has high bit set"),
            Self::PayloadOverrun => write!(f, "payload longer than declared"),
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum 0x{actual:02X}, computed 0x{expected:02X}")
            }
            Self::BadEndMarker(b) => write!(f, "expected end marker, got 0x{b:02X}"),
            Self::EchoMismatch { expected, actual } => {
                write!(f, "echo 0x{actual:02X} does not match request byte 0x{expected:02X}")
            }
            Self::MagicMismatch { index, actual } => {
                write!(f, "magic byte {index} is 0x{actual:02X}")
            }
            Self::IdentityMismatch { expected, actual } => {
                write!(f, "response id 0x{actual:02X}, requested 0x{expected:02X}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_frames_keep_every_byte() {
        use crate::request::{accum_request, mbus_request};

        assert_eq!(request_frame(mbus_request()).as_slice(), &mbus_request());
        assert_eq!(request_frame(accum_request(0x02)).as_slice(), &accum_request(0x02));
        assert_eq!(request_frame(mbus_request()).len(), MAX_REQUEST_LEN);
    }

    #[test]
    fn classes() {
        assert_eq!(
            FrameError::ChecksumMismatch { expected: 1, actual: 2 }.class(),
            ErrorClass::Checksum
        );
        assert_eq!(
            FrameError::IdentityMismatch { expected: 4, actual: 5 }.class(),
            ErrorClass::Identity
        );
        assert_eq!(FrameError::MissingStart(0).class(), ErrorClass::Framing);
    }
}
