//! ESP-IDF UART line driver.
//!
//! Implements [`LineRx`] / [`LineTx`] over the IDF UART driver using raw
//! sys calls, and provides the receive pump: a thread that blocks on the
//! UART and does nothing but push bytes into the line's ingest buffer.
//!
//! Target-only; the host build uses the scripted lines in the tests.

use esp_idf_svc::sys::*;
use log::{info, warn};

use crate::error::LineError;
use crate::ingest::LineBuffer;
use crate::line::{LineRx, LineTx, receive_pending};
use crate::protocol::MAX_REQUEST_LEN;

/// Driver-side buffers.  The IDF requires RX > 128 bytes.
const RX_DRIVER_BUF: i32 = 256;
const TX_DRIVER_BUF: i32 = 256;

/// Errors while bringing up a UART.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartError {
    Config(i32),
    Pins(i32),
    Install(i32),
}

impl core::fmt::Display for UartError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Config(rc) => write!(f, "UART param config failed (rc={})", rc),
            Self::Pins(rc) => write!(f, "UART pin assignment failed (rc={})", rc),
            Self::Install(rc) => write!(f, "UART driver install failed (rc={})", rc),
        }
    }
}

impl std::error::Error for UartError {}

/// Configure `port` for 8N1 at `baud` and split it into halves.
pub fn open(port: i32, tx_gpio: i32, rx_gpio: i32, baud: u32) -> Result<(UartRx, UartTx), UartError> {
    let cfg = uart_config_t {
        baud_rate: baud as i32,
        data_bits: uart_word_length_t_UART_DATA_8_BITS,
        parity: uart_parity_t_UART_PARITY_DISABLE,
        stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
        flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
        ..Default::default()
    };

    // SAFETY: called once per port from main() before any pump or worker
    // thread touches it.
    unsafe {
        let ret = uart_param_config(port as uart_port_t, &cfg);
        if ret != ESP_OK as i32 {
            return Err(UartError::Config(ret));
        }
        let ret = uart_set_pin(
            port as uart_port_t,
            tx_gpio,
            rx_gpio,
            UART_PIN_NO_CHANGE,
            UART_PIN_NO_CHANGE,
        );
        if ret != ESP_OK as i32 {
            return Err(UartError::Pins(ret));
        }
        let ret = uart_driver_install(
            port as uart_port_t,
            RX_DRIVER_BUF,
            TX_DRIVER_BUF,
            0,
            core::ptr::null_mut(),
            0,
        );
        if ret != ESP_OK as i32 {
            return Err(UartError::Install(ret));
        }
    }

    info!("uart{}: {} bit/s, tx=GPIO{} rx=GPIO{}", port, baud, tx_gpio, rx_gpio);
    Ok((UartRx { port }, UartTx { port }))
}

/// Receive half of an installed UART.
pub struct UartRx {
    port: i32,
}

impl UartRx {
    /// Block until one byte arrives.
    pub fn receive_blocking(&mut self) -> Result<u8, LineError> {
        let mut byte = 0u8;
        // SAFETY: the buffer is one valid byte; the driver is installed.
        let n = unsafe {
            uart_read_bytes(
                self.port as uart_port_t,
                (&raw mut byte).cast(),
                1,
                TickType_t::MAX,
            )
        };
        match n {
            1 => Ok(byte),
            _ => Err(LineError::ReadFailed),
        }
    }

    /// Receive pump.  Never returns.
    pub fn pump(mut self, buffer: &'static LineBuffer) -> ! {
        info!("uart{}: receive pump running", self.port);
        loop {
            match self.receive_blocking() {
                Ok(byte) => {
                    buffer.push(byte);
                    if let Err(e) = receive_pending(&mut self, buffer) {
                        warn!("uart{}: {}", self.port, e);
                    }
                }
                Err(e) => warn!("uart{}: {}", self.port, e),
            }
        }
    }
}

impl LineRx for UartRx {
    fn readable(&mut self) -> bool {
        let mut len: usize = 0;
        // SAFETY: out-pointer is a valid local.
        let ret = unsafe { uart_get_buffered_data_len(self.port as uart_port_t, &mut len) };
        ret == ESP_OK as i32 && len > 0
    }

    fn receive_byte(&mut self) -> Result<u8, LineError> {
        let mut byte = 0u8;
        // SAFETY: the buffer is one valid byte; zero timeout never blocks.
        let n = unsafe { uart_read_bytes(self.port as uart_port_t, (&raw mut byte).cast(), 1, 0) };
        if n == 1 { Ok(byte) } else { Err(LineError::ReadFailed) }
    }
}

/// Transmit half of an installed UART.
pub struct UartTx {
    port: i32,
}

impl LineTx for UartTx {
    fn writable(&mut self) -> bool {
        let mut free: usize = 0;
        // SAFETY: out-pointer is a valid local.
        let ret = unsafe { uart_get_tx_buffer_free_size(self.port as uart_port_t, &mut free) };
        ret == ESP_OK as i32 && free >= MAX_REQUEST_LEN
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), LineError> {
        // SAFETY: `bytes` is valid for `len` bytes for the duration of the
        // call; the driver copies into its ring.
        let n = unsafe { uart_write_bytes(self.port as uart_port_t, bytes.as_ptr().cast(), bytes.len()) };
        if n == bytes.len() as i32 { Ok(()) } else { Err(LineError::WriteFailed) }
    }
}
