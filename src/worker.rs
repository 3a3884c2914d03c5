//! Per-line worker and request routing.
//!
//! Uses `embassy-sync` bounded channels to hand poll requests from the
//! trigger (timer, button) to the worker that owns the target line.  The
//! worker is the only code that touches its decoder, so arming Protocol B
//! for a response never races with decoding.
//!
//! ```text
//! ┌──────────────┐  MeterKind  ┌──────────────┐  drain  ┌──────────────┐
//! │ RequestRouter│────────────▶│  LineWorker  │◀────────│ IngestBuffer │
//! │  (trigger)   │  (channel)  │  (periodic)  │         │  (rx pump)   │
//! └──────────────┘             └──────┬───────┘         └──────────────┘
//!                                     │ send_frame
//!                                     ▼
//!                                  LineTx
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::app::ports::{RequestTrigger, ResourceSink};
use crate::dispatch::Dispatcher;
use crate::error::{Error, RequestError};
use crate::ingest::IngestBuffer;
use crate::line::LineTx;
use crate::meter::{MeterKind, Protocol};
use crate::protocol::MeterProtocol;
use crate::request::{WriteBound, send_frame};
use crate::session::{LineSession, LineStats};

/// Queued polls per line.
pub const REQUEST_DEPTH: usize = 4;

/// Poll requests for one line: trigger → worker.
pub type RequestChannel = Channel<CriticalSectionRawMutex, MeterKind, REQUEST_DEPTH>;

/// Everything one line's decoder loop owns.
pub struct LineWorker<'a, P, T, D, S, const N: usize>
where
    P: MeterProtocol,
    T: LineTx,
    D: DelayNs,
    S: ResourceSink,
{
    session: LineSession<P>,
    tx: T,
    delay: D,
    dispatcher: Dispatcher<S>,
    buffer: &'a IngestBuffer<N>,
    requests: &'a RequestChannel,
    bound: WriteBound,
}

impl<'a, P, T, D, S, const N: usize> LineWorker<'a, P, T, D, S, N>
where
    P: MeterProtocol,
    T: LineTx,
    D: DelayNs,
    S: ResourceSink,
{
    pub fn new(
        decoder: P,
        tx: T,
        delay: D,
        dispatcher: Dispatcher<S>,
        buffer: &'a IngestBuffer<N>,
        requests: &'a RequestChannel,
        bound: WriteBound,
    ) -> Self {
        Self {
            session: LineSession::new(decoder),
            tx,
            delay,
            dispatcher,
            buffer,
            requests,
            bound,
        }
    }

    /// Build and transmit the poll for `kind`.
    ///
    /// On failure the decoder is reset so no reply is expected for a
    /// request that never left.
    pub fn send_request(&mut self, kind: MeterKind) -> Result<(), RequestError> {
        let frame = self.session.prepare_request(kind)?;
        if let Err(e) = send_frame(&mut self.tx, &mut self.delay, &frame, self.bound) {
            self.session.reset();
            return Err(e.into());
        }
        info!("{}: poll sent ({} bytes)", kind, frame.len());
        Ok(())
    }

    /// Send every queued poll.  Returns how many went out.
    pub fn service_requests(&mut self) -> usize {
        let mut sent = 0;
        while let Ok(kind) = self.requests.try_receive() {
            match self.send_request(kind) {
                Ok(()) => sent += 1,
                Err(e) => warn!("{:?} line: poll for {} failed: {}", P::PROTOCOL, kind, Error::from(e)),
            }
        }
        sent
    }

    /// One wake: decode what has arrived, then issue queued polls.
    pub fn run_once(&mut self) -> usize {
        let consumed = self.session.drain(self.buffer, &mut self.dispatcher);
        if consumed > 0 {
            debug!("{:?} line: drained {} bytes", P::PROTOCOL, consumed);
        }
        self.service_requests();
        consumed
    }

    /// Worker loop.  Never returns.
    pub fn run(mut self, interval_ms: u32) -> ! {
        info!("{:?} line worker started ({} ms)", P::PROTOCOL, interval_ms);
        loop {
            self.run_once();
            self.delay.delay_ms(interval_ms);
        }
    }

    pub fn stats(&self) -> LineStats {
        self.session.stats()
    }

    pub fn session(&self) -> &LineSession<P> {
        &self.session
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    pub fn tx(&self) -> &T {
        &self.tx
    }
}

/// Sends each poll to the channel of the line that carries the meter.
pub struct RequestRouter<'a> {
    mbus: &'a RequestChannel,
    accum: &'a RequestChannel,
}

impl<'a> RequestRouter<'a> {
    pub fn new(mbus: &'a RequestChannel, accum: &'a RequestChannel) -> Self {
        Self { mbus, accum }
    }
}

impl RequestTrigger for RequestRouter<'_> {
    fn request_meter(&mut self, kind: MeterKind) -> Result<(), RequestError> {
        let channel = match kind.protocol() {
            Protocol::Mbus => self.mbus,
            Protocol::Accum => self.accum,
        };
        channel.try_send(kind).map_err(|_| RequestError::QueueFull(kind))
    }
}
