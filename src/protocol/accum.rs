//! Accumulate-only meter protocol (water, hot water, gas, heat).
//!
//! The line is half-duplex, so the receiver first sees its own request
//! echoed back, then the meter's response:
//!
//! ```text
//! echo      C0  id  (C0+id)&7F  D0
//! response  C0  22 69 6E 73  id  d1 d2 d3  BCC  D0
//! ```
//!
//! `BCC` is the 8-bit sum of every response byte from the `C0` through
//! `d3`, masked to 7 bits.  `d1 d2 d3` is a BCD counter, most significant
//! byte first.  A response is accepted only for the meter type that was
//! last requested; any failure clears that outstanding request.

use super::bcd::reverse_bcd_to_int;
use super::{DecodedFrame, FrameError, MeterProtocol, RequestFrame, request_frame};
use crate::error::RequestError;
use crate::meter::{MeterKind, MeterReading, Protocol};
use crate::request::accum_request;

/// Frame start byte.
pub const STX: u8 = 0xC0;
/// Frame end byte.
pub const ETX: u8 = 0xD0;
/// Fixed response signature following the response `STX`.
pub const MAGIC: [u8; 4] = [0x22, 0x69, 0x6E, 0x73];
/// Mask applied to running sums to form a check byte.
pub const BCC_MASK: u8 = 0x7F;
/// Data bytes in a response.
pub const PAYLOAD_LEN: usize = 3;
/// Echo (4) plus response (11).
pub const EXCHANGE_LEN: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumState {
    AwaitEchoStart,
    AwaitEchoId,
    AwaitEchoBcc,
    AwaitEchoEnd,
    AwaitRespStart,
    /// Waiting for magic byte `n` (0-based).
    AwaitMagic(u8),
    AwaitRespId,
    AwaitPayload,
    AwaitBcc,
    AwaitRespEnd,
}

/// A validated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumFrame {
    pub kind: MeterKind,
    pub payload: [u8; PAYLOAD_LEN],
    pub bcc: u8,
}

impl DecodedFrame for AccumFrame {
    fn reading(&self) -> Option<MeterReading> {
        Some(MeterReading::from_raw(self.kind, reverse_bcd_to_int(&self.payload)))
    }
}

/// Streaming echo + response decoder.
pub struct AccumDecoder {
    state: AccumState,
    outstanding: Option<MeterKind>,
    sum: u8,
    payload: [u8; PAYLOAD_LEN],
    payload_len: usize,
    received: usize,
}

impl AccumDecoder {
    pub fn new() -> Self {
        Self {
            state: AccumState::AwaitEchoStart,
            outstanding: None,
            sum: 0,
            payload: [0; PAYLOAD_LEN],
            payload_len: 0,
            received: 0,
        }
    }

    pub fn state(&self) -> AccumState {
        self.state
    }

    /// Meter type whose response is currently awaited.
    pub fn outstanding(&self) -> Option<MeterKind> {
        self.outstanding
    }

    /// Expect the echo and response for `kind`.  Any exchange already in
    /// progress is abandoned.
    pub fn arm(&mut self, kind: MeterKind) -> Result<u8, RequestError> {
        let id = kind.accum_type_id().ok_or(RequestError::WrongLine(kind))?;
        self.reset();
        self.outstanding = Some(kind);
        Ok(id)
    }

    fn outstanding_id(&self) -> u8 {
        self.outstanding
            .and_then(MeterKind::accum_type_id)
            .unwrap_or(0)
    }

    fn fail(&mut self, e: FrameError) -> Result<Option<AccumFrame>, FrameError> {
        self.reset();
        Err(e)
    }

    fn take(&mut self, byte: u8, next: AccumState) {
        self.sum = self.sum.wrapping_add(byte);
        self.received += 1;
        self.state = next;
    }
}

impl Default for AccumDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterProtocol for AccumDecoder {
    type Frame = AccumFrame;
    const PROTOCOL: Protocol = Protocol::Accum;

    fn feed(&mut self, byte: u8) -> Result<Option<AccumFrame>, FrameError> {
        // Nothing requested: whatever is on the line is not ours.
        let Some(kind) = self.outstanding else {
            return Ok(None);
        };
        let id = self.outstanding_id();

        match self.state {
            // ── echo ───────────────────────────────────────────────
            AccumState::AwaitEchoStart => {
                if byte == STX {
                    self.sum = 0;
                    self.received = 0;
                    self.take(byte, AccumState::AwaitEchoId);
                }
            }

            AccumState::AwaitEchoId => {
                if byte != id {
                    return self.fail(FrameError::EchoMismatch { expected: id, actual: byte });
                }
                self.take(byte, AccumState::AwaitEchoBcc);
            }

            AccumState::AwaitEchoBcc => {
                let expected = self.sum & BCC_MASK;
                if byte != expected {
                    return self.fail(FrameError::EchoMismatch { expected, actual: byte });
                }
                self.received += 1;
                self.state = AccumState::AwaitEchoEnd;
            }

            AccumState::AwaitEchoEnd => {
                if byte != ETX {
                    return self.fail(FrameError::EchoMismatch { expected: ETX, actual: byte });
                }
                self.received += 1;
                self.state = AccumState::AwaitRespStart;
            }

            // ── response ───────────────────────────────────────────
            AccumState::AwaitRespStart => {
                if byte != STX {
                    return self.fail(FrameError::MissingStart(byte));
                }
                self.sum = 0;
                self.take(byte, AccumState::AwaitMagic(0));
            }

            AccumState::AwaitMagic(index) => {
                if byte != MAGIC[usize::from(index)] {
                    return self.fail(FrameError::MagicMismatch { index, actual: byte });
                }
                let next = if usize::from(index) + 1 < MAGIC.len() {
                    AccumState::AwaitMagic(index + 1)
                } else {
                    AccumState::AwaitRespId
                };
                self.take(byte, next);
            }

            AccumState::AwaitRespId => {
                if byte != id {
                    return self.fail(FrameError::IdentityMismatch { expected: id, actual: byte });
                }
                self.payload_len = 0;
                self.take(byte, AccumState::AwaitPayload);
            }

            AccumState::AwaitPayload => {
                self.payload[self.payload_len] = byte;
                self.payload_len += 1;
                let next = if self.payload_len == PAYLOAD_LEN {
                    AccumState::AwaitBcc
                } else {
                    AccumState::AwaitPayload
                };
                self.take(byte, next);
            }

            AccumState::AwaitBcc => {
                let expected = self.sum & BCC_MASK;
                if byte != expected {
                    return self.fail(FrameError::ChecksumMismatch { expected, actual: byte });
                }
                self.received += 1;
                self.state = AccumState::AwaitRespEnd;
            }

            AccumState::AwaitRespEnd => {
                if byte != ETX {
                    return self.fail(FrameError::BadEndMarker(byte));
                }
                self.received += 1;
                debug_assert_eq!(self.received, EXCHANGE_LEN);

                let frame = AccumFrame {
                    kind,
                    payload: self.payload,
                    bcc: self.sum & BCC_MASK,
                };
                self.reset();
                return Ok(Some(frame));
            }
        }

        Ok(None)
    }

    fn reset(&mut self) {
        self.state = AccumState::AwaitEchoStart;
        self.outstanding = None;
        self.sum = 0;
        self.payload = [0; PAYLOAD_LEN];
        self.payload_len = 0;
        self.received = 0;
    }

    fn is_idle(&self) -> bool {
        self.state == AccumState::AwaitEchoStart
    }

    fn prepare_request(&mut self, kind: MeterKind) -> Result<RequestFrame, RequestError> {
        let id = self.arm(kind)?;
        Ok(request_frame(accum_request(id)))
    }
}

/// Build the meter-side response for `kind` carrying `payload`
/// (test and simulation helper).
pub fn encode_response(kind: MeterKind, payload: [u8; PAYLOAD_LEN]) -> Option<[u8; 11]> {
    let id = kind.accum_type_id()?;
    let mut out = [0u8; 11];
    out[0] = STX;
    out[1..5].copy_from_slice(&MAGIC);
    out[5] = id;
    out[6..9].copy_from_slice(&payload);
    out[9] = out[..9].iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) & BCC_MASK;
    out[10] = ETX;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(kind: MeterKind, payload: [u8; 3]) -> Vec<u8> {
        let id = kind.accum_type_id().unwrap();
        let mut bytes = accum_request(id).to_vec();
        bytes.extend_from_slice(&encode_response(kind, payload).unwrap());
        bytes
    }

    fn feed_all(dec: &mut AccumDecoder, bytes: &[u8]) -> (Vec<AccumFrame>, Vec<FrameError>) {
        let mut frames = Vec::new();
        let mut errors = Vec::new();
        for &b in bytes {
            match dec.feed(b) {
                Ok(Some(f)) => frames.push(f),
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }
        (frames, errors)
    }

    #[test]
    fn gas_exchange_decodes() {
        let bytes = exchange(MeterKind::Gas, [0x00, 0x05, 0x67]);
        assert_eq!(bytes.len(), EXCHANGE_LEN);
        assert_eq!(&bytes[..4], &[0xC0, 0x04, 0x44, 0xD0]);

        let mut dec = AccumDecoder::new();
        dec.arm(MeterKind::Gas).unwrap();
        let (frames, errors) = feed_all(&mut dec, &bytes);
        assert!(errors.is_empty());
        assert_eq!(frames.len(), 1);

        let reading = frames[0].reading().unwrap();
        assert_eq!(reading.kind, MeterKind::Gas);
        assert_eq!(reading.raw, 567);
        assert_eq!(reading.value, 56.7);

        // Exchange complete: nothing outstanding any more.
        assert_eq!(dec.outstanding(), None);
        assert!(dec.is_idle());
    }

    #[test]
    fn heat_uses_hundredths() {
        let mut dec = AccumDecoder::new();
        dec.arm(MeterKind::Heat).unwrap();
        let (frames, _) = feed_all(&mut dec, &exchange(MeterKind::Heat, [0x01, 0x23, 0x45]));
        assert_eq!(frames[0].reading().unwrap().value, 123.45);
    }

    #[test]
    fn ignores_bytes_when_nothing_requested() {
        let mut dec = AccumDecoder::new();
        let (frames, errors) = feed_all(&mut dec, &exchange(MeterKind::Water, [0, 0, 1]));
        assert!(frames.is_empty());
        assert!(errors.is_empty());
        assert!(dec.is_idle());
    }

    #[test]
    fn noise_before_echo_is_skipped() {
        let mut dec = AccumDecoder::new();
        dec.arm(MeterKind::Water).unwrap();
        let mut bytes = vec![0x00, 0x7F, 0xD0];
        bytes.extend(exchange(MeterKind::Water, [0x00, 0x12, 0x34]));
        let (frames, errors) = feed_all(&mut dec, &bytes);
        assert!(errors.is_empty());
        assert_eq!(frames[0].reading().unwrap().raw, 1234);
    }

    #[test]
    fn response_for_other_meter_rejected() {
        let mut dec = AccumDecoder::new();
        dec.arm(MeterKind::Gas).unwrap();

        let mut bytes = accum_request(0x04).to_vec();
        bytes.extend_from_slice(&encode_response(MeterKind::Water, [0, 0, 1]).unwrap());
        let (frames, errors) = feed_all(&mut dec, &bytes);
        assert!(frames.is_empty());
        assert_eq!(errors, vec![FrameError::IdentityMismatch { expected: 0x04, actual: 0x02 }]);
        assert_eq!(dec.outstanding(), None);
    }

    #[test]
    fn bad_echo_clears_outstanding() {
        let mut dec = AccumDecoder::new();
        dec.arm(MeterKind::HotWater).unwrap();
        dec.feed(STX).unwrap();
        assert_eq!(
            dec.feed(0x05),
            Err(FrameError::EchoMismatch { expected: 0x03, actual: 0x05 })
        );
        assert_eq!(dec.outstanding(), None);
    }

    #[test]
    fn bad_echo_bcc_clears_outstanding() {
        let mut dec = AccumDecoder::new();
        dec.arm(MeterKind::Gas).unwrap();
        dec.feed(STX).unwrap();
        dec.feed(0x04).unwrap();
        assert_eq!(
            dec.feed(0x45),
            Err(FrameError::EchoMismatch { expected: 0x44, actual: 0x45 })
        );
        assert_eq!(dec.outstanding(), None);
        assert!(dec.is_idle());
    }

    #[test]
    fn bad_echo_end_clears_outstanding() {
        let mut bytes = exchange(MeterKind::Gas, [0x00, 0x05, 0x67]);
        bytes[3] = 0xD1;
        let mut dec = AccumDecoder::new();
        dec.arm(MeterKind::Gas).unwrap();
        let (frames, errors) = feed_all(&mut dec, &bytes);
        assert!(frames.is_empty());
        assert_eq!(errors, vec![FrameError::EchoMismatch { expected: ETX, actual: 0xD1 }]);
        assert_eq!(dec.outstanding(), None);
    }

    #[test]
    fn response_must_open_with_stx() {
        let mut bytes = exchange(MeterKind::Water, [0, 0, 1]);
        bytes[4] = 0x22;
        let mut dec = AccumDecoder::new();
        dec.arm(MeterKind::Water).unwrap();
        let (frames, errors) = feed_all(&mut dec, &bytes);
        assert!(frames.is_empty());
        assert_eq!(errors, vec![FrameError::MissingStart(0x22)]);
        assert_eq!(dec.outstanding(), None);
    }

    #[test]
    fn bcc_mismatch_rejected() {
        let mut bytes = exchange(MeterKind::Gas, [0x00, 0x05, 0x67]);
        bytes[13] ^= 0x01;
        let mut dec = AccumDecoder::new();
        dec.arm(MeterKind::Gas).unwrap();
        let (frames, errors) = feed_all(&mut dec, &bytes);
        assert!(frames.is_empty());
        assert!(matches!(errors[..], [FrameError::ChecksumMismatch { .. }]));
    }

    #[test]
    fn magic_mismatch_rejected() {
        let mut bytes = exchange(MeterKind::Water, [0, 0, 1]);
        bytes[6] = 0x70;
        let mut dec = AccumDecoder::new();
        dec.arm(MeterKind::Water).unwrap();
        let (frames, errors) = feed_all(&mut dec, &bytes);
        assert!(frames.is_empty());
        assert_eq!(errors[0], FrameError::MagicMismatch { index: 1, actual: 0x70 });
    }

    #[test]
    fn rearm_abandons_previous_exchange() {
        let mut dec = AccumDecoder::new();
        dec.arm(MeterKind::Gas).unwrap();
        feed_all(&mut dec, &exchange(MeterKind::Gas, [0, 0, 1])[..7]);
        assert!(!dec.is_idle());

        let req = dec.prepare_request(MeterKind::Heat).unwrap();
        assert_eq!(req.as_slice(), &[0xC0, 0x05, 0x45, 0xD0]);
        assert!(dec.is_idle());
        assert_eq!(dec.outstanding(), Some(MeterKind::Heat));

        let (frames, errors) = feed_all(&mut dec, &exchange(MeterKind::Heat, [0, 0, 2]));
        assert!(errors.is_empty());
        assert_eq!(frames[0].kind, MeterKind::Heat);
    }

    #[test]
    fn seoul_meter_not_on_this_line() {
        let mut dec = AccumDecoder::new();
        assert_eq!(
            dec.prepare_request(MeterKind::SeoulWater),
            Err(RequestError::WrongLine(MeterKind::SeoulWater))
        );
        assert_eq!(dec.outstanding(), None);
    }
}
