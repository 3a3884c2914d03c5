//! Per-line byte ingest buffer.
//!
//! The UART receive context pushes, the line's worker pops.  Nothing else
//! is shared between the two, so the queue is a lock-free SPSC ring with
//! atomic head/tail counters.
//!
//! ```text
//! ┌──────────────┐  push   ┌──────────────────┐  pop   ┌──────────────┐
//! │ RX context   │────────▶│  IngestBuffer<N> │───────▶│ Line worker  │
//! │ (producer)   │         │  (lock-free)     │        │ (consumer)   │
//! └──────────────┘         └──────────────────┘        └──────────────┘
//! ```
//!
//! Full-buffer policy is **reject-new**: a push into a full ring returns
//! `false`, leaves the queued bytes untouched, and bumps a monotonic
//! overflow counter.  The oldest bytes are never evicted, so the
//! consumer sees an unbroken prefix of the stream followed by a gap.

use core::sync::atomic::{AtomicU8, AtomicU32, AtomicUsize, Ordering};

/// Ingest capacity for every meter line.
pub const INGEST_CAPACITY: usize = 512;

/// Fixed-capacity SPSC byte ring.
///
/// `head` and `tail` are free-running counters; their difference is the
/// fill level.  `N` must be a power of two so the counters wrap cleanly.
pub struct IngestBuffer<const N: usize> {
    head: AtomicUsize,
    tail: AtomicUsize,
    overflows: AtomicU32,
    slots: [AtomicU8; N],
}

impl<const N: usize> IngestBuffer<N> {
    const POWER_OF_TWO: () = assert!(N.is_power_of_two(), "ingest capacity must be a power of two");

    pub const fn new() -> Self {
        let () = Self::POWER_OF_TWO;
        Self {
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            overflows: AtomicU32::new(0),
            slots: [const { AtomicU8::new(0) }; N],
        }
    }

    /// Queue one received byte.
    ///
    /// Producer side only.  Never blocks; returns `false` when the ring is
    /// full and the byte is dropped.
    pub fn push(&self, byte: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if head.wrapping_sub(tail) >= N {
            self.overflows.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.slots[head % N].store(byte, Ordering::Relaxed);
        self.head.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    /// Take the oldest queued byte.  Consumer side only.
    pub fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        if tail == head {
            return None;
        }

        let byte = self.slots[tail % N].load(Ordering::Relaxed);
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(byte)
    }

    /// Number of bytes currently queued.
    pub fn size(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.size() >= N
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Discard everything queued.  Consumer side only.
    pub fn reset(&self) {
        let head = self.head.load(Ordering::Acquire);
        self.tail.store(head, Ordering::Release);
    }

    /// Total bytes rejected because the ring was full (monotonic).
    pub fn overflow_count(&self) -> u32 {
        self.overflows.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for IngestBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The ring used by every meter line.
pub type LineBuffer = IngestBuffer<INGEST_CAPACITY>;
