//! Meter poll rotation.
//!
//! Every `poll_interval_secs`, or immediately on a user action, the next
//! meter in [`MeterKind::ALL`] order is requested through a
//! [`RequestTrigger`].  The poller knows nothing about lines or channels.
//!
//! ```text
//!   5 s tick ─┐
//!             ├──▶ PollSchedule ──▶ RequestTrigger::request_meter(kind)
//!   button  ──┘       (rotation)
//! ```

use log::{info, warn};

use crate::app::ports::RequestTrigger;
use crate::error::RequestError;
use crate::meter::MeterKind;

/// Round-robin poll scheduler.
///
/// Time is kept in whole milliseconds so a fixed tick period adds up to
/// the interval exactly.
pub struct PollSchedule {
    interval_ms: u32,
    elapsed_ms: u32,
    next: usize,
    enabled: bool,
}

impl PollSchedule {
    pub fn new(interval_secs: u32) -> Self {
        Self {
            interval_ms: interval_secs.max(1).saturating_mul(1000),
            elapsed_ms: 0,
            next: 0,
            enabled: true,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        info!("PollSchedule: {}", if enabled { "enabled" } else { "disabled" });
        self.enabled = enabled;
    }

    /// Meter the next firing will request.
    pub fn peek(&self) -> MeterKind {
        MeterKind::ALL[self.next]
    }

    /// Advance the clock by `elapsed_ms`.  Fires at most once per call;
    /// returns the meter requested, if any.
    pub fn tick(
        &mut self,
        elapsed_ms: u32,
        trigger: &mut dyn RequestTrigger,
    ) -> Option<MeterKind> {
        if !self.enabled {
            return None;
        }
        self.elapsed_ms = self.elapsed_ms.saturating_add(elapsed_ms);
        if self.elapsed_ms < self.interval_ms {
            return None;
        }
        self.elapsed_ms = 0;
        Some(self.fire(trigger))
    }

    /// Request the next meter now (button press) and restart the interval.
    pub fn trigger_now(&mut self, trigger: &mut dyn RequestTrigger) -> MeterKind {
        self.elapsed_ms = 0;
        self.fire(trigger)
    }

    fn fire(&mut self, trigger: &mut dyn RequestTrigger) -> MeterKind {
        let kind = self.peek();
        self.next = (self.next + 1) % MeterKind::ALL.len();

        match trigger.request_meter(kind) {
            Ok(()) => info!("PollSchedule: requesting {}", kind),
            Err(RequestError::QueueFull(_)) => warn!("PollSchedule: {} line busy, skipped", kind),
            Err(e) => warn!("PollSchedule: {} not requested: {}", kind, e),
        }
        kind
    }
}
