//! Bus-framed (M-Bus long frame) decoder for the Seoul water meter.
//!
//! Wire format:
//! ```text
//! ┌──────┬───┬───┬──────┬───┬───┬────┬──────────────┬────┬──────┐
//! │ 0x68 │ L │ L │ 0x68 │ C │ A │ CI │ data (L − 3) │ CS │ 0x16 │
//! └──────┴───┴───┴──────┴───┴───┴────┴──────────────┴────┴──────┘
//! ```
//! `CS` is the 8-bit sum of `C`, `A`, `CI` and the data bytes.  The meter
//! value is the BCD (least-significant byte first) of the last four data
//! bytes, in litres.

use heapless::Vec;

use super::bcd::bcd_to_int;
use super::{DecodedFrame, FrameError, MeterProtocol, RequestFrame, request_frame};
use crate::error::RequestError;
use crate::meter::{MeterKind, MeterReading, Protocol};
use crate::request::mbus_request;

/// Start marker, sent twice.
pub const START: u8 = 0x68;
/// End marker.
pub const END: u8 = 0x16;
/// Bytes counted by `L` ahead of the data: C, A, CI.
const FIXED_FIELDS: u8 = 3;
/// Largest data block a one-byte `L` can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize - FIXED_FIELDS as usize;
/// Trailing data bytes holding the volume counter.
const READING_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbusState {
    AwaitStart1,
    AwaitLength1,
    AwaitLength2,
    AwaitStart2,
    AwaitControl,
    AwaitAddress,
    AwaitControlInfo,
    AwaitPayload,
    AwaitChecksum,
    AwaitEnd,
}

/// A validated long frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MbusFrame {
    pub control: u8,
    pub address: u8,
    pub control_info: u8,
    pub payload: Vec<u8, MAX_PAYLOAD>,
    pub checksum: u8,
}

impl MbusFrame {
    /// The `L` field this frame was announced with.
    pub fn declared_length(&self) -> u8 {
        self.payload.len() as u8 + FIXED_FIELDS
    }

    /// Trailing bytes carrying the volume counter, if present.
    pub fn reading_bytes(&self) -> Option<&[u8]> {
        let len = self.payload.len();
        (len >= READING_LEN).then(|| &self.payload[len - READING_LEN..])
    }
}

impl DecodedFrame for MbusFrame {
    fn reading(&self) -> Option<MeterReading> {
        self.reading_bytes()
            .map(|bytes| MeterReading::from_raw(MeterKind::SeoulWater, bcd_to_int(bytes)))
    }
}

/// Streaming long-frame decoder.
pub struct MbusDecoder {
    state: MbusState,
    length: u8,
    checksum: u8,
    control: u8,
    address: u8,
    control_info: u8,
    payload: Vec<u8, MAX_PAYLOAD>,
}

impl MbusDecoder {
    pub fn new() -> Self {
        Self {
            state: MbusState::AwaitStart1,
            length: 0,
            checksum: 0,
            control: 0,
            address: 0,
            control_info: 0,
            payload: Vec::new(),
        }
    }

    pub fn state(&self) -> MbusState {
        self.state
    }

    fn payload_target(&self) -> usize {
        usize::from(self.length - FIXED_FIELDS)
    }

    fn fail(&mut self, e: FrameError) -> Result<Option<MbusFrame>, FrameError> {
        self.reset();
        Err(e)
    }
}

impl Default for MbusDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterProtocol for MbusDecoder {
    type Frame = MbusFrame;
    const PROTOCOL: Protocol = Protocol::Mbus;

    fn feed(&mut self, byte: u8) -> Result<Option<MbusFrame>, FrameError> {
        match self.state {
            MbusState::AwaitStart1 => {
                if byte == START {
                    self.state = MbusState::AwaitLength1;
                }
            }

            MbusState::AwaitLength1 => {
                self.length = byte;
                self.state = MbusState::AwaitLength2;
            }

            MbusState::AwaitLength2 => {
                if byte != self.length {
                    let first = self.length;
                    return self.fail(FrameError::LengthMismatch { first, second: byte });
                }
                if byte < FIXED_FIELDS {
                    return self.fail(FrameError::InvalidLength(byte));
                }
                self.state = MbusState::AwaitStart2;
            }

            MbusState::AwaitStart2 => {
                if byte != START {
                    return self.fail(FrameError::MissingStart(byte));
                }
                self.state = MbusState::AwaitControl;
            }

            MbusState::AwaitControl => {
                if byte >= 0x80 {
                    return self.fail(FrameError::ControlHighBit(byte));
                }
                self.control = byte;
                self.checksum = byte;
                self.state = MbusState::AwaitAddress;
            }

            MbusState::AwaitAddress => {
                self.address = byte;
                self.checksum = self.checksum.wrapping_add(byte);
                self.state = MbusState::AwaitControlInfo;
            }

            MbusState::AwaitControlInfo => {
                self.control_info = byte;
                self.checksum = self.checksum.wrapping_add(byte);
                self.state = if self.payload_target() == 0 {
                    MbusState::AwaitChecksum
                } else {
                    MbusState::AwaitPayload
                };
            }

            MbusState::AwaitPayload => {
                if self.payload.push(byte).is_err() || self.payload.len() > self.payload_target() {
                    return self.fail(FrameError::PayloadOverrun);
                }
                self.checksum = self.checksum.wrapping_add(byte);
                if self.payload.len() == self.payload_target() {
                    self.state = MbusState::AwaitChecksum;
                }
            }

            MbusState::AwaitChecksum => {
                if byte != self.checksum {
                    let expected = self.checksum;
                    return self.fail(FrameError::ChecksumMismatch { expected, actual: byte });
                }
                self.state = MbusState::AwaitEnd;
            }

            MbusState::AwaitEnd => {
                if byte != END {
                    return self.fail(FrameError::BadEndMarker(byte));
                }
                let frame = MbusFrame {
                    control: self.control,
                    address: self.address,
                    control_info: self.control_info,
                    payload: core::mem::take(&mut self.payload),
                    checksum: self.checksum,
                };
                self.reset();
                return Ok(Some(frame));
            }
        }

        Ok(None)
    }

    fn reset(&mut self) {
        self.state = MbusState::AwaitStart1;
        self.length = 0;
        self.checksum = 0;
        self.control = 0;
        self.address = 0;
        self.control_info = 0;
        self.payload.clear();
    }

    fn is_idle(&self) -> bool {
        self.state == MbusState::AwaitStart1
    }

    fn prepare_request(&mut self, kind: MeterKind) -> Result<RequestFrame, RequestError> {
        if kind.protocol() != Protocol::Mbus {
            return Err(RequestError::WrongLine(kind));
        }
        Ok(request_frame(mbus_request()))
    }
}

/// Assemble a long frame around `payload` (test and simulation helper).
pub fn encode_frame(control: u8, address: u8, control_info: u8, payload: &[u8]) -> Option<std::vec::Vec<u8>> {
    if payload.len() > MAX_PAYLOAD {
        return None;
    }
    let length = payload.len() as u8 + FIXED_FIELDS;
    let checksum = payload
        .iter()
        .fold(control.wrapping_add(address).wrapping_add(control_info), |acc, &b| {
            acc.wrapping_add(b)
        });

    let mut out = std::vec::Vec::with_capacity(payload.len() + 9);
    out.extend_from_slice(&[START, length, length, START, control, address, control_info]);
    out.extend_from_slice(payload);
    out.extend_from_slice(&[checksum, END]);
    Some(out)
}
