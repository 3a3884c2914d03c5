//! Application boundary.
//!
//! The decode pipeline talks to the outside world only through the
//! **port traits** defined in [`ports`], keeping it fully testable
//! without real peripherals or a resource tree.

pub mod ports;
