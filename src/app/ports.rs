//! Port traits: the boundary between the decode pipeline and the outside
//! world.
//!
//! ```text
//!   trigger ──▶ RequestTrigger ──▶ line worker ──▶ Dispatcher ──▶ ResourceSink
//! ```
//!
//! Adapters (log sink, NVS, UART) implement these traits.  The pipeline
//! consumes them via generics, so the decoders never touch hardware or the
//! resource tree directly.

use crate::config::SystemConfig;
use crate::error::{PublishError, RequestError};
use crate::meter::MeterKind;

// ───────────────────────────────────────────────────────────────
// Resource sink (driven adapter: pipeline → resource tree)
// ───────────────────────────────────────────────────────────────

/// Stores or forwards a decoded meter value under its resource id.
pub trait ResourceSink {
    fn publish(&mut self, resource_id: &str, value: f64) -> Result<(), PublishError>;
}

// ───────────────────────────────────────────────────────────────
// Request trigger (driving adapter: timer / button → lines)
// ───────────────────────────────────────────────────────────────

/// Asks the line that carries `kind` to poll that meter.
pub trait RequestTrigger {
    fn request_meter(&mut self, kind: MeterKind) -> Result<(), RequestError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: pipeline ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST run [`SystemConfig::validate`] before persisting;
/// invalid values are rejected with [`ConfigError::ValidationFailed`], not
/// clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::NotFound => Self::Config("not found"),
            ConfigError::Corrupted => Self::Config("corrupted"),
            ConfigError::IoError => Self::Config("storage I/O"),
        }
    }
}
