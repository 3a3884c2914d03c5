//! Mock line, meters and sink for integration tests.
//!
//! [`SimulatedBus`] stands in for a half-duplex meter line: every frame
//! written to it is echoed into the line's ingest ring (the way the RS-485
//! transceiver reflects it) and, if a simulated meter recognises the poll,
//! its reply follows.

use std::collections::HashMap;

use embedded_hal::delay::DelayNs;
use meterlink::app::ports::ResourceSink;
use meterlink::error::{LineError, PublishError};
use meterlink::ingest::IngestBuffer;
use meterlink::line::LineTx;
use meterlink::meter::MeterKind;
use meterlink::protocol::accum::{STX, encode_response};
use meterlink::protocol::mbus::encode_frame;
use meterlink::request::mbus_request;

// ── Simulated meter line ─────────────────────────────────────

pub struct SimulatedBus<'a, const N: usize> {
    buffer: &'a IngestBuffer<N>,
    /// Reflect outbound frames back into the receive ring.
    pub echo: bool,
    /// `writable()` reports false this many times before true.
    pub busy_polls: u32,
    /// Line never becomes writable.
    pub stuck: bool,
    /// Flip the checksum / BCC of every reply.
    pub corrupt: bool,
    /// Tail payload of the Seoul meter's reply (BCD, LSB first).
    pub seoul_counter: Option<[u8; 4]>,
    /// 3-byte BCD counters of accumulate-only meters.
    pub accum_counters: HashMap<MeterKind, [u8; 3]>,
    pub sent: Vec<Vec<u8>>,
}

#[allow(dead_code)]
impl<'a, const N: usize> SimulatedBus<'a, N> {
    pub fn new(buffer: &'a IngestBuffer<N>) -> Self {
        Self {
            buffer,
            echo: false,
            busy_polls: 0,
            stuck: false,
            corrupt: false,
            seoul_counter: None,
            accum_counters: HashMap::new(),
            sent: Vec::new(),
        }
    }

    /// A Protocol B line: echoes, with every accumulate-only meter present.
    pub fn accum_line(buffer: &'a IngestBuffer<N>, counter: [u8; 3]) -> Self {
        let mut bus = Self::new(buffer);
        bus.echo = true;
        for kind in [MeterKind::Water, MeterKind::HotWater, MeterKind::Gas, MeterKind::Heat] {
            bus.accum_counters.insert(kind, counter);
        }
        bus
    }

    /// A Protocol A line with the Seoul meter present.
    pub fn mbus_line(buffer: &'a IngestBuffer<N>, counter: [u8; 4]) -> Self {
        let mut bus = Self::new(buffer);
        bus.seoul_counter = Some(counter);
        bus
    }

    fn reply_to(&self, frame: &[u8]) -> Option<Vec<u8>> {
        if frame == mbus_request() {
            let counter = self.seoul_counter?;
            let mut payload = vec![0x78, 0x56, 0x34, 0x12, 0x01, 0x07, 0x00, 0x13];
            payload.extend_from_slice(&counter);
            let mut bytes = encode_frame(0x08, 0x01, 0x72, &payload)?;
            if self.corrupt {
                let cs = bytes.len() - 2;
                bytes[cs] = bytes[cs].wrapping_add(1);
            }
            return Some(bytes);
        }

        if frame.len() == 4 && frame[0] == STX {
            let kind = MeterKind::from_accum_type_id(frame[1])?;
            let counter = *self.accum_counters.get(&kind)?;
            let mut bytes = encode_response(kind, counter)?.to_vec();
            if self.corrupt {
                bytes[9] ^= 0x01;
            }
            return Some(bytes);
        }
        None
    }

    fn deliver(&self, bytes: &[u8]) {
        for &b in bytes {
            self.buffer.push(b);
        }
    }
}

impl<const N: usize> LineTx for SimulatedBus<'_, N> {
    fn writable(&mut self) -> bool {
        if self.stuck {
            return false;
        }
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            return false;
        }
        true
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), LineError> {
        self.sent.push(bytes.to_vec());
        if self.echo {
            self.deliver(bytes);
        }
        if let Some(reply) = self.reply_to(bytes) {
            self.deliver(&reply);
        }
        Ok(())
    }
}

// ── Delay ────────────────────────────────────────────────────

/// Delay that returns at once but remembers how long it was asked to wait.
#[derive(Default)]
pub struct InstantDelay {
    pub total_ns: u64,
}

impl DelayNs for InstantDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

// ── Resource sink ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub values: Vec<(String, f64)>,
    pub refuse: bool,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn value_of(&self, resource_id: &str) -> Option<f64> {
        self.values
            .iter()
            .rev()
            .find(|(id, _)| id == resource_id)
            .map(|&(_, v)| v)
    }
}

impl ResourceSink for RecordingSink {
    fn publish(&mut self, resource_id: &str, value: f64) -> Result<(), PublishError> {
        if self.refuse {
            return Err(PublishError::Rejected);
        }
        self.values.push((resource_id.to_owned(), value));
        Ok(())
    }
}
