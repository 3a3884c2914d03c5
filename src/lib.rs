//! MeterLink gateway library.
//!
//! Serial utility-meter decode pipeline: per-line ingest rings, the two
//! meter protocols, BCD scaling, request building and dispatch to a
//! resource sink.  Everything except the UART adapter compiles and is
//! tested on the host; ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod line;
pub mod meter;
pub mod poller;
pub mod protocol;
pub mod request;
pub mod session;
pub mod worker;

pub mod adapters;
pub mod drivers;
pub mod pins;

mod esp_link_shims;
