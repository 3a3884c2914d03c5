//! Line session: the decoder loop body for one serial line.
//!
//! A session owns its decoder outright.  The receive context never sees
//! it; the only thing the two share is the line's [`IngestBuffer`].
//!
//! ```text
//! IngestBuffer ──pop──▶ decoder.feed ──Frame──▶ reading ──▶ Dispatcher
//!                           │
//!                           └──FrameError──▶ LineStats (+ throttled warn!)
//! ```

use burster::Limiter;
use core::time::Duration;
use log::warn;

use crate::app::ports::ResourceSink;
use crate::dispatch::Dispatcher;
use crate::error::RequestError;
use crate::ingest::IngestBuffer;
use crate::meter::MeterKind;
use crate::protocol::{DecodedFrame, ErrorClass, FrameError, MeterProtocol, RequestFrame};

/// Counters for one line.  All monotonic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStats {
    /// Frames that passed every check.
    pub frames: u32,
    /// Readings the dispatcher accepted.
    pub published: u32,
    /// Readings the dispatcher refused.
    pub publish_failures: u32,
    pub framing_errors: u32,
    pub checksum_errors: u32,
    pub identity_errors: u32,
    /// Bytes the ingest buffer refused (mirrors the buffer's counter).
    pub overflows: u32,
}

impl LineStats {
    fn record(&mut self, e: FrameError) {
        let slot = match e.class() {
            ErrorClass::Framing => &mut self.framing_errors,
            ErrorClass::Checksum => &mut self.checksum_errors,
            ErrorClass::Identity => &mut self.identity_errors,
        };
        *slot = slot.wrapping_add(1);
    }

    /// Frames discarded for any reason.
    pub fn rejected(&self) -> u32 {
        self.framing_errors
            .wrapping_add(self.checksum_errors)
            .wrapping_add(self.identity_errors)
    }
}

/// Decoder state plus bookkeeping for one line.
pub struct LineSession<P: MeterProtocol> {
    decoder: P,
    stats: LineStats,
    warn_limiter: burster::TokenBucket<fn() -> Duration>,
}

impl<P: MeterProtocol> LineSession<P> {
    pub fn new(decoder: P) -> Self {
        Self {
            decoder,
            stats: LineStats::default(),
            warn_limiter: burster::TokenBucket::new_with_time_provider(
                10,
                10, // 10 warnings per second, 10 burst
                platform_now as fn() -> Duration,
            ),
        }
    }

    /// Drain the bytes queued at entry, feeding each to the decoder.
    ///
    /// Bytes pushed while draining wait for the next call, so one pass
    /// does at most `buffer.size()` (as sampled on entry) steps.
    pub fn drain<S: ResourceSink, const N: usize>(
        &mut self,
        buffer: &IngestBuffer<N>,
        dispatcher: &mut Dispatcher<S>,
    ) -> usize {
        let budget = buffer.size();
        let mut consumed = 0;
        while consumed < budget {
            let Some(byte) = buffer.pop() else { break };
            self.process(byte, dispatcher);
            consumed += 1;
        }
        self.stats.overflows = buffer.overflow_count();
        consumed
    }

    /// Feed one byte and act on the outcome.
    pub fn process<S: ResourceSink>(&mut self, byte: u8, dispatcher: &mut Dispatcher<S>) {
        match self.decoder.feed(byte) {
            Ok(None) => {}
            Ok(Some(frame)) => {
                self.stats.frames = self.stats.frames.wrapping_add(1);
                if let Some(reading) = frame.reading() {
                    if dispatcher.publish(&reading) {
                        self.stats.published = self.stats.published.wrapping_add(1);
                    } else {
                        self.stats.publish_failures = self.stats.publish_failures.wrapping_add(1);
                    }
                }
            }
            Err(e) => {
                self.stats.record(e);
                if self.warn_limiter.try_consume(1).is_ok() {
                    warn!("{:?} line: frame dropped: {}", P::PROTOCOL, e);
                }
            }
        }
    }

    /// Build the poll frame for `kind` and ready the decoder for its reply.
    pub fn prepare_request(&mut self, kind: MeterKind) -> Result<RequestFrame, RequestError> {
        self.decoder.prepare_request(kind)
    }

    /// Abandon any frame in progress (and any outstanding request).
    pub fn reset(&mut self) {
        self.decoder.reset();
    }

    pub fn decoder(&self) -> &P {
        &self.decoder
    }

    pub fn stats(&self) -> LineStats {
        self.stats
    }
}

// ── Platform time for the warning limiter ───────────────────

#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    let us = unsafe { esp_idf_sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}
