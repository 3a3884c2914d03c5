//! GPIO / peripheral pin assignments for the MeterLink gateway board.
//!
//! Single source of truth: the UART adapter and `main` reference this
//! module rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Bus-framed meter line (Seoul water meter, 1200 bit/s)
// ---------------------------------------------------------------------------

/// UART peripheral for the bus-framed line.
pub const MBUS_UART_PORT: i32 = 1;
pub const MBUS_TX_GPIO: i32 = 17;
pub const MBUS_RX_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// Accumulate-only meter line (water, hot water, gas, heat; 4800 bit/s)
// ---------------------------------------------------------------------------

/// UART peripheral for the accumulate-only line.
pub const ACCUM_UART_PORT: i32 = 2;
pub const ACCUM_TX_GPIO: i32 = 15;
pub const ACCUM_RX_GPIO: i32 = 16;

// ---------------------------------------------------------------------------
// User input
// ---------------------------------------------------------------------------

/// BOOT button: a press polls the next meter immediately.  Active LOW.
pub const POLL_BUTTON_GPIO: i32 = 0;
