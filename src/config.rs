//! Gateway configuration
//!
//! Line bit rates, worker cadence, and the write bound.
//! Values can be overridden via NVS.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::ingest::INGEST_CAPACITY;

/// UART bits per transmitted byte (start + 8 data + stop).
pub const BITS_PER_BYTE: u32 = 10;

/// Core gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Lines ---
    /// Bus-framed (Seoul water) line, bit/s
    pub mbus_baud: u32,
    /// Accumulate-only meter line, bit/s
    pub accum_baud: u32,

    // --- Timing ---
    /// Line worker wake interval (milliseconds)
    pub drain_interval_ms: u32,
    /// Meter poll rotation period (seconds)
    pub poll_interval_secs: u32,
    /// Longest wait for a line to become writable (milliseconds)
    pub write_timeout_ms: u32,
    /// Delay between writable checks (microseconds)
    pub write_poll_us: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Lines
            mbus_baud: 1200,
            accum_baud: 4800,

            // Timing
            drain_interval_ms: 1000,
            poll_interval_secs: 5,
            write_timeout_ms: 100,
            write_poll_us: 500,
        }
    }
}

impl SystemConfig {
    /// Worst-case bytes a line at `baud` delivers during one drain interval.
    pub fn bytes_per_drain(&self, baud: u32) -> u64 {
        u64::from(baud / BITS_PER_BYTE) * u64::from(self.drain_interval_ms) / 1000
    }

    /// Range-check every field.  Stored configs must pass this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for baud in [self.mbus_baud, self.accum_baud] {
            if !(300..=115_200).contains(&baud) {
                return Err(ConfigError::ValidationFailed(
                    "line baud must be 300–115200",
                ));
            }
        }
        if !(10..=10_000).contains(&self.drain_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "drain_interval_ms must be 10–10000",
            ));
        }
        if !(1..=3600).contains(&self.poll_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "poll_interval_secs must be 1–3600",
            ));
        }
        if !(1..=10_000).contains(&self.write_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "write_timeout_ms must be 1–10000",
            ));
        }
        if self.write_poll_us == 0 || self.write_poll_us > self.write_timeout_ms * 1000 {
            return Err(ConfigError::ValidationFailed(
                "write_poll_us must be non-zero and within write_timeout_ms",
            ));
        }

        // A worker must be able to drain everything that arrives between
        // two wakes, or the ingest ring overflows under steady traffic.
        let worst = self.bytes_per_drain(self.mbus_baud.max(self.accum_baud));
        if worst > INGEST_CAPACITY as u64 {
            return Err(ConfigError::ValidationFailed(
                "drain_interval_ms too long for line baud and ingest capacity",
            ));
        }
        Ok(())
    }
}
