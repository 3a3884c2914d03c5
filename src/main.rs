//! MeterLink Gateway: Main Entry Point
//!
//! Two serial meter lines, each with a receive pump and a periodic worker.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  core 0                         core 1                           │
//! │                                                                  │
//! │  rx-mbus  ──push──▶ MBUS_RX  ──drain──▶ mbus worker ──┐          │
//! │  (uart1)                        ▲                     │          │
//! │                   MBUS_REQUESTS ┤                     ├─▶ LogResourceSink
//! │                                 │                     │          │
//! │  rx-accum ──push──▶ ACCUM_RX ──drain──▶ accum worker ─┘          │
//! │  (uart2)                        ▲                                │
//! │                  ACCUM_REQUESTS ┤                                │
//! │                                 │                                │
//! │               main: PollSchedule + button ──▶ RequestRouter      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::{Delay, FreeRtos};
use log::{info, warn};

use meterlink::adapters::log_sink::LogResourceSink;
use meterlink::adapters::nvs::NvsAdapter;
use meterlink::adapters::uart;
use meterlink::app::ports::ConfigPort;
use meterlink::config::SystemConfig;
use meterlink::dispatch::Dispatcher;
use meterlink::error::Error;
use meterlink::drivers::button::ButtonDriver;
use meterlink::drivers::task_pin::{Core, spawn_on_core};
use meterlink::ingest::LineBuffer;
use meterlink::pins;
use meterlink::poller::PollSchedule;
use meterlink::protocol::accum::AccumDecoder;
use meterlink::protocol::mbus::MbusDecoder;
use meterlink::request::WriteBound;
use meterlink::worker::{LineWorker, RequestChannel, RequestRouter};

// ── Per-line shared state ─────────────────────────────────────
//
// The only things a pump and its worker share: the ingest ring (pump
// pushes, worker pops) and the request channel (main sends, worker
// receives).

static MBUS_RX: LineBuffer = LineBuffer::new();
static ACCUM_RX: LineBuffer = LineBuffer::new();
static MBUS_REQUESTS: RequestChannel = RequestChannel::new();
static ACCUM_REQUESTS: RequestChannel = RequestChannel::new();

const PUMP_PRIORITY: u8 = 10;
const WORKER_PRIORITY: u8 = 5;
const PUMP_STACK_KB: usize = 4;
const WORKER_STACK_KB: usize = 8;

/// Main-loop period for the button and poll rotation.
const POLL_TICK_MS: u32 = 100;

fn now_ms() -> u32 {
    // SAFETY: esp_timer_get_time is a read of the monotonic system timer.
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1000) as u32
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  MeterLink v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let config = match NvsAdapter::new().and_then(|nvs| nvs.load()).map_err(Error::from) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config unavailable ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    info!("Config: {:?}", config);
    let bound = WriteBound::from_config(&config);

    // ── 3. Serial lines ───────────────────────────────────────
    let (mbus_rx, mbus_tx) = uart::open(
        pins::MBUS_UART_PORT,
        pins::MBUS_TX_GPIO,
        pins::MBUS_RX_GPIO,
        config.mbus_baud,
    )?;
    let (accum_rx, accum_tx) = uart::open(
        pins::ACCUM_UART_PORT,
        pins::ACCUM_TX_GPIO,
        pins::ACCUM_RX_GPIO,
        config.accum_baud,
    )?;

    // ── 4. Receive pumps (core 0) ─────────────────────────────
    spawn_on_core(Core::Pro, PUMP_PRIORITY, PUMP_STACK_KB, "rx-mbus\0", move || {
        mbus_rx.pump(&MBUS_RX);
    })?;
    spawn_on_core(Core::Pro, PUMP_PRIORITY, PUMP_STACK_KB, "rx-accum\0", move || {
        accum_rx.pump(&ACCUM_RX);
    })?;

    // ── 5. Line workers (core 1) ──────────────────────────────
    let interval_ms = config.drain_interval_ms;

    let mbus_worker = LineWorker::new(
        MbusDecoder::new(),
        mbus_tx,
        Delay::new_default(),
        Dispatcher::new(LogResourceSink::new()),
        &MBUS_RX,
        &MBUS_REQUESTS,
        bound,
    );
    spawn_on_core(Core::App, WORKER_PRIORITY, WORKER_STACK_KB, "mbus-line\0", move || {
        mbus_worker.run(interval_ms);
    })?;

    let accum_worker = LineWorker::new(
        AccumDecoder::new(),
        accum_tx,
        Delay::new_default(),
        Dispatcher::new(LogResourceSink::new()),
        &ACCUM_RX,
        &ACCUM_REQUESTS,
        bound,
    );
    spawn_on_core(Core::App, WORKER_PRIORITY, WORKER_STACK_KB, "accum-line\0", move || {
        accum_worker.run(interval_ms);
    })?;

    // ── 6. Poll rotation ──────────────────────────────────────
    let mut router = RequestRouter::new(&MBUS_REQUESTS, &ACCUM_REQUESTS);
    let mut poller = PollSchedule::new(config.poll_interval_secs);
    let mut button = ButtonDriver::new(pins::POLL_BUTTON_GPIO);
    if let Err(rc) = button.configure() {
        warn!("Poll button GPIO{} config failed (rc={})", button.gpio(), rc);
    }

    info!("System ready. Polling every {} s.", config.poll_interval_secs);

    loop {
        FreeRtos::delay_ms(POLL_TICK_MS);

        if button.tick(now_ms()) {
            info!("Button: polling next meter");
            poller.trigger_now(&mut router);
        }
        poller.tick(POLL_TICK_MS, &mut router);
    }
}
