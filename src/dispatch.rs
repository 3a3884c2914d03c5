//! Reading dispatcher: meter kind → resource id → sink.
//!
//! Delivery is at-most-once.  A failed publish is logged and dropped; the
//! next poll of the same meter produces a fresh value.

use log::{debug, warn};

use crate::app::ports::ResourceSink;
use crate::error::PublishError;
use crate::meter::{MeterKind, MeterReading};

/// Routes decoded readings to a [`ResourceSink`].
pub struct Dispatcher<S: ResourceSink> {
    sink: S,
    bindings: [Option<&'static str>; MeterKind::ALL.len()],
    published: u32,
    failed: u32,
}

impl<S: ResourceSink> Dispatcher<S> {
    /// Dispatcher with every kind bound to its default resource id.
    pub fn new(sink: S) -> Self {
        let mut bindings = [None; MeterKind::ALL.len()];
        for kind in MeterKind::ALL {
            bindings[kind.index()] = Some(kind.default_resource_id());
        }
        Self {
            sink,
            bindings,
            published: 0,
            failed: 0,
        }
    }

    /// Replace the resource id for `kind`.  Startup only.
    pub fn bind(&mut self, kind: MeterKind, resource_id: &'static str) {
        self.bindings[kind.index()] = Some(resource_id);
    }

    /// Stop publishing `kind`.
    pub fn unbind(&mut self, kind: MeterKind) {
        self.bindings[kind.index()] = None;
    }

    pub fn resource_id(&self, kind: MeterKind) -> Option<&'static str> {
        self.bindings[kind.index()]
    }

    /// Forward one reading to the sink.
    pub fn try_publish(&mut self, reading: &MeterReading) -> Result<(), PublishError> {
        let id = self
            .resource_id(reading.kind)
            .ok_or(PublishError::Unbound(reading.kind))?;
        self.sink.publish(id, reading.value)
    }

    /// Forward one reading, swallowing failures.  Returns whether it was
    /// accepted.
    pub fn publish(&mut self, reading: &MeterReading) -> bool {
        match self.try_publish(reading) {
            Ok(()) => {
                self.published = self.published.wrapping_add(1);
                debug!("dispatch: {}", reading);
                true
            }
            Err(e) => {
                self.failed = self.failed.wrapping_add(1);
                warn!("dispatch: dropped {}: {}", reading, e);
                false
            }
        }
    }

    pub fn published(&self) -> u32 {
        self.published
    }

    pub fn failed(&self) -> u32 {
        self.failed
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
