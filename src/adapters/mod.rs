//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter     | Implements         | Connects to              |
//! |-------------|--------------------|--------------------------|
//! | `log_sink`  | ResourceSink       | Serial log output        |
//! | `nvs`       | ConfigPort         | NVS / in-memory store    |
//! | `uart`      | LineRx, LineTx     | ESP-IDF UART driver      |

pub mod log_sink;
pub mod nvs;
#[cfg(target_os = "espidf")]
pub mod uart;
