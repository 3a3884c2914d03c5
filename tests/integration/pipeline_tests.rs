//! End-to-end pipeline: trigger → request channel → worker → simulated
//! meter line → ingest ring → decoder → dispatcher → sink.

use meterlink::app::ports::RequestTrigger;
use meterlink::dispatch::Dispatcher;
use meterlink::error::{LineError, RequestError};
use meterlink::ingest::{INGEST_CAPACITY, IngestBuffer, LineBuffer};
use meterlink::meter::MeterKind;
use meterlink::poller::PollSchedule;
use meterlink::protocol::MeterProtocol;
use meterlink::protocol::accum::AccumDecoder;
use meterlink::protocol::mbus::{MbusDecoder, encode_frame};
use meterlink::request::WriteBound;
use meterlink::worker::{LineWorker, RequestChannel, RequestRouter};

use crate::mock_line::{InstantDelay, RecordingSink, SimulatedBus};

const BOUND: WriteBound = WriteBound { timeout_us: 100_000, poll_us: 500 };

/// Seoul tail payload: BCD LSB first, 00 00 12 34 → 1234 L.
const SEOUL_1234: [u8; 4] = [0x34, 0x12, 0x00, 0x00];
/// Accumulate-only payload: BCD MSB first, 00 05 67 → 567.
const ACCUM_567: [u8; 3] = [0x00, 0x05, 0x67];

type MbusWorker<'a> =
    LineWorker<'a, MbusDecoder, SimulatedBus<'a, INGEST_CAPACITY>, InstantDelay, RecordingSink, INGEST_CAPACITY>;
type AccumWorker<'a> =
    LineWorker<'a, AccumDecoder, SimulatedBus<'a, INGEST_CAPACITY>, InstantDelay, RecordingSink, INGEST_CAPACITY>;

fn mbus_worker<'a>(
    buf: &'a LineBuffer,
    requests: &'a RequestChannel,
    bus: SimulatedBus<'a, INGEST_CAPACITY>,
) -> MbusWorker<'a> {
    LineWorker::new(
        MbusDecoder::new(),
        bus,
        InstantDelay::default(),
        Dispatcher::new(RecordingSink::default()),
        buf,
        requests,
        BOUND,
    )
}

fn accum_worker<'a>(
    buf: &'a LineBuffer,
    requests: &'a RequestChannel,
    bus: SimulatedBus<'a, INGEST_CAPACITY>,
) -> AccumWorker<'a> {
    LineWorker::new(
        AccumDecoder::new(),
        bus,
        InstantDelay::default(),
        Dispatcher::new(RecordingSink::default()),
        buf,
        requests,
        BOUND,
    )
}

/// Two wakes: the first sends queued polls, the second decodes replies.
fn two_wakes<P, const N: usize>(
    worker: &mut LineWorker<'_, P, SimulatedBus<'_, N>, InstantDelay, RecordingSink, N>,
) where
    P: MeterProtocol,
{
    worker.run_once();
    worker.run_once();
}

#[test]
fn seoul_meter_publishes_cubic_metres() {
    let buf = LineBuffer::new();
    let mbus_q = RequestChannel::new();
    let accum_q = RequestChannel::new();
    let mut worker = mbus_worker(&buf, &mbus_q, SimulatedBus::mbus_line(&buf, SEOUL_1234));

    RequestRouter::new(&mbus_q, &accum_q)
        .request_meter(MeterKind::SeoulWater)
        .unwrap();
    two_wakes(&mut worker);

    assert_eq!(worker.tx().sent, vec![vec![0x10, 0x5B, 0x01, 0x5C, 0x16]]);
    assert_eq!(worker.dispatcher().sink().value_of("4110/0/5700"), Some(1.234));
    assert_eq!(worker.stats().frames, 1);
    assert!(accum_q.try_receive().is_err());
}

#[test]
fn seoul_line_echo_is_skipped_while_hunting() {
    let buf = LineBuffer::new();
    let q = RequestChannel::new();
    let mut bus = SimulatedBus::mbus_line(&buf, SEOUL_1234);
    bus.echo = true;
    let mut worker = mbus_worker(&buf, &q, bus);

    q.try_send(MeterKind::SeoulWater).unwrap();
    two_wakes(&mut worker);

    assert_eq!(worker.dispatcher().sink().value_of("4110/0/5700"), Some(1.234));
    assert_eq!(worker.stats().rejected(), 0);
}

#[test]
fn same_payload_scales_per_meter() {
    let buf = LineBuffer::new();
    let q = RequestChannel::new();
    let mut worker = accum_worker(&buf, &q, SimulatedBus::accum_line(&buf, ACCUM_567));

    q.try_send(MeterKind::Gas).unwrap();
    two_wakes(&mut worker);
    q.try_send(MeterKind::Heat).unwrap();
    two_wakes(&mut worker);

    let sink = worker.dispatcher().sink();
    assert_eq!(sink.value_of("4120/0/5700"), Some(56.7));
    assert_eq!(sink.value_of("4150/0/5700"), Some(5.67));
    assert_eq!(worker.stats().published, 2);
}

#[test]
fn full_rotation_reaches_every_meter_once() {
    let mbus_buf = LineBuffer::new();
    let accum_buf = LineBuffer::new();
    let mbus_q = RequestChannel::new();
    let accum_q = RequestChannel::new();

    let mut mbus = mbus_worker(&mbus_buf, &mbus_q, SimulatedBus::mbus_line(&mbus_buf, SEOUL_1234));
    let mut accum = accum_worker(&accum_buf, &accum_q, SimulatedBus::accum_line(&accum_buf, ACCUM_567));

    let mut router = RequestRouter::new(&mbus_q, &accum_q);
    let mut poller = PollSchedule::new(5);

    // 25 s of 1 s ticks with one worker wake per tick.
    for _ in 0..25 {
        poller.tick(1000, &mut router);
        mbus.run_once();
        accum.run_once();
    }
    mbus.run_once();
    accum.run_once();

    let accum_sink = accum.dispatcher().sink();
    assert_eq!(mbus.dispatcher().sink().values, vec![("4110/0/5700".to_owned(), 1.234)]);
    assert_eq!(
        accum_sink.values,
        vec![
            ("4130/0/5700".to_owned(), 56.7),
            ("4140/0/5700".to_owned(), 56.7),
            ("4120/0/5700".to_owned(), 56.7),
            ("4150/0/5700".to_owned(), 5.67),
        ]
    );
}

#[test]
fn corrupted_checksum_publishes_nothing() {
    let buf = LineBuffer::new();
    let q = RequestChannel::new();
    let mut bus = SimulatedBus::mbus_line(&buf, SEOUL_1234);
    bus.corrupt = true;
    let mut worker = mbus_worker(&buf, &q, bus);

    q.try_send(MeterKind::SeoulWater).unwrap();
    two_wakes(&mut worker);

    assert!(worker.dispatcher().sink().values.is_empty());
    assert_eq!(worker.stats().checksum_errors, 1);
    assert!(worker.session().decoder().is_idle());
}

#[test]
fn corrupted_bcc_publishes_nothing_and_line_recovers() {
    let buf = LineBuffer::new();
    let q = RequestChannel::new();
    let mut bus = SimulatedBus::accum_line(&buf, ACCUM_567);
    bus.corrupt = true;
    let mut worker = accum_worker(&buf, &q, bus);

    q.try_send(MeterKind::Water).unwrap();
    two_wakes(&mut worker);
    assert!(worker.dispatcher().sink().values.is_empty());
    assert_eq!(worker.stats().checksum_errors, 1);
    assert_eq!(worker.session().decoder().outstanding(), None);
}

#[test]
fn stuck_line_times_out_without_hanging() {
    let buf = LineBuffer::new();
    let q = RequestChannel::new();
    let mut bus = SimulatedBus::accum_line(&buf, ACCUM_567);
    bus.stuck = true;
    let mut worker = accum_worker(&buf, &q, bus);

    assert_eq!(
        worker.send_request(MeterKind::Gas),
        Err(RequestError::Line(LineError::WriteTimeout))
    );
    assert!(worker.tx().sent.is_empty());
    assert_eq!(worker.session().decoder().outstanding(), None);

    // A queued poll on a stuck line is dropped, not retried forever.
    q.try_send(MeterKind::Gas).unwrap();
    assert_eq!(worker.service_requests(), 0);
}

#[test]
fn slow_line_is_waited_for() {
    let buf = LineBuffer::new();
    let q = RequestChannel::new();
    let mut bus = SimulatedBus::accum_line(&buf, ACCUM_567);
    bus.busy_polls = 10;
    let mut worker = accum_worker(&buf, &q, bus);

    q.try_send(MeterKind::HotWater).unwrap();
    two_wakes(&mut worker);
    assert_eq!(worker.dispatcher().sink().value_of("4140/0/5700"), Some(56.7));
}

#[test]
fn refused_publish_does_not_stop_decoding() {
    let buf = LineBuffer::new();
    let q = RequestChannel::new();
    let mut worker = LineWorker::new(
        AccumDecoder::new(),
        SimulatedBus::accum_line(&buf, ACCUM_567),
        InstantDelay::default(),
        Dispatcher::new(RecordingSink { refuse: true, ..Default::default() }),
        &buf,
        &q,
        BOUND,
    );

    q.try_send(MeterKind::Gas).unwrap();
    two_wakes(&mut worker);
    q.try_send(MeterKind::Heat).unwrap();
    two_wakes(&mut worker);

    let stats = worker.stats();
    assert_eq!(stats.frames, 2);
    assert_eq!(stats.publish_failures, 2);
    assert_eq!(worker.dispatcher().failed(), 2);
}

#[test]
fn overflow_keeps_oldest_bytes_deterministically() {
    let buf = LineBuffer::new();
    let q = RequestChannel::new();
    let mut worker = mbus_worker(&buf, &q, SimulatedBus::new(&buf));

    // 12-byte payload → 21-byte frames; 30 of them (630 bytes) arrive
    // before the worker wakes.
    let mut payload = vec![0u8; 8];
    payload.extend_from_slice(&SEOUL_1234);
    let frame = encode_frame(0x08, 0x01, 0x72, &payload).unwrap();
    assert_eq!(frame.len(), 21);
    let mut pushed = 0;
    for _ in 0..30 {
        for &b in &frame {
            buf.push(b);
            pushed += 1;
        }
    }

    assert_eq!(worker.run_once(), INGEST_CAPACITY);
    let stats = worker.stats();
    assert_eq!(stats.overflows as usize, pushed - INGEST_CAPACITY);
    // 512 = 24 * 21 + 8: 24 whole frames, then a truncated one.
    assert_eq!(stats.frames, 24);
    assert_eq!(worker.dispatcher().sink().values.len(), 24);
    assert!(!worker.session().decoder().is_idle());
}

#[test]
fn small_ring_policy_is_reject_new() {
    let buf = IngestBuffer::<16>::new();
    for b in 0..20u8 {
        buf.push(b);
    }
    let kept: Vec<u8> = std::iter::from_fn(|| buf.pop()).collect();
    assert_eq!(kept, (0..16).collect::<Vec<u8>>());
    assert_eq!(buf.overflow_count(), 4);
}
