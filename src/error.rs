//! Unified error types for the meter gateway.
//!
//! Every subsystem error is `Copy` and converts into [`Error`], so the
//! worker loops can log and count failures without allocating.  None of
//! these are fatal: the worst outcome is a dropped frame that the next
//! poll recovers.

use core::fmt;

use crate::meter::MeterKind;

// ---------------------------------------------------------------------------
// Top-level gateway error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A serial line could not be read or written.
    Line(LineError),
    /// A poll request could not be built or delivered.
    Request(RequestError),
    /// The resource sink refused a reading.
    Publish(PublishError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(e) => write!(f, "line: {e}"),
            Self::Request(e) => write!(f, "request: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Line errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineError {
    /// The line never reported writable within the configured bound.
    WriteTimeout,
    /// The driver rejected or truncated an outbound write.
    WriteFailed,
    /// The driver failed while reading received bytes.
    ReadFailed,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteTimeout => write!(f, "timed out waiting for line to become writable"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::ReadFailed => write!(f, "read failed"),
        }
    }
}

impl From<LineError> for Error {
    fn from(e: LineError) -> Self {
        Self::Line(e)
    }
}

// ---------------------------------------------------------------------------
// Request errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// The meter is not reachable through this line's protocol.
    WrongLine(MeterKind),
    /// The line's request queue is full; the poll is dropped.
    QueueFull(MeterKind),
    /// The request frame could not be transmitted.
    Line(LineError),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongLine(kind) => write!(f, "{kind} is not served by this line"),
            Self::QueueFull(kind) => write!(f, "request queue full, dropped poll for {kind}"),
            Self::Line(e) => write!(f, "{e}"),
        }
    }
}

impl From<LineError> for RequestError {
    fn from(e: LineError) -> Self {
        Self::Line(e)
    }
}

impl From<RequestError> for Error {
    fn from(e: RequestError) -> Self {
        Self::Request(e)
    }
}

// ---------------------------------------------------------------------------
// Publish errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// No resource id is bound to this meter kind.
    Unbound(MeterKind),
    /// The sink refused the update.
    Rejected,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound(kind) => write!(f, "no resource bound for {kind}"),
            Self::Rejected => write!(f, "sink rejected update"),
        }
    }
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Self::Publish(e)
    }
}
