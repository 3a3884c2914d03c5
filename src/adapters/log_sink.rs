//! Log-based resource sink adapter.
//!
//! Implements [`ResourceSink`] by writing every published value to the
//! ESP-IDF logger (UART / USB-CDC in production).  An LwM2M or MQTT
//! client would implement the same trait.

use log::info;

use crate::app::ports::ResourceSink;
use crate::error::PublishError;

/// Adapter that logs every published resource value to the serial console.
#[derive(Default)]
pub struct LogResourceSink {
    published: u32,
}

impl LogResourceSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values accepted so far.
    pub fn published(&self) -> u32 {
        self.published
    }
}

impl ResourceSink for LogResourceSink {
    fn publish(&mut self, resource_id: &str, value: f64) -> Result<(), PublishError> {
        if resource_id.is_empty() {
            return Err(PublishError::Rejected);
        }
        self.published = self.published.wrapping_add(1);
        info!("RSRC | {} = {}", resource_id, value);
        Ok(())
    }
}
