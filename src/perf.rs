//! Thread-local perf counters for the block read path.
//!
//! Counters accumulate per thread and are read back with
//! [`perf_context`]; embedding engines reset them around an operation with
//! [`reset_perf_context`] to obtain per-operation numbers. Counter updates
//! happen on **every** block-read completion path, success or failure;
//! checksum time is accumulated only when verification actually runs.

use std::cell::Cell;
use std::time::Instant;

/// Snapshot of this thread's read-path counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfContext {
    /// Nanoseconds spent inside block reads (I/O plus post-processing).
    pub block_read_time: u64,
    /// Number of block reads issued.
    pub block_read_count: u64,
    /// Bytes delivered by block reads.
    pub block_read_byte: u64,
    /// Nanoseconds spent verifying block checksums.
    pub block_checksum_time: u64,
}

thread_local! {
    static BLOCK_READ_TIME: Cell<u64> = const { Cell::new(0) };
    static BLOCK_READ_COUNT: Cell<u64> = const { Cell::new(0) };
    static BLOCK_READ_BYTE: Cell<u64> = const { Cell::new(0) };
    static BLOCK_CHECKSUM_TIME: Cell<u64> = const { Cell::new(0) };
}

/// Read this thread's counters.
pub fn perf_context() -> PerfContext {
    PerfContext {
        block_read_time: BLOCK_READ_TIME.with(Cell::get),
        block_read_count: BLOCK_READ_COUNT.with(Cell::get),
        block_read_byte: BLOCK_READ_BYTE.with(Cell::get),
        block_checksum_time: BLOCK_CHECKSUM_TIME.with(Cell::get),
    }
}

/// Zero this thread's counters.
pub fn reset_perf_context() {
    BLOCK_READ_TIME.with(|c| c.set(0));
    BLOCK_READ_COUNT.with(|c| c.set(0));
    BLOCK_READ_BYTE.with(|c| c.set(0));
    BLOCK_CHECKSUM_TIME.with(|c| c.set(0));
}

pub(crate) fn add_block_read_time(nanos: u64) {
    BLOCK_READ_TIME.with(|c| c.set(c.get().saturating_add(nanos)));
}

pub(crate) fn add_block_read_count(count: u64) {
    BLOCK_READ_COUNT.with(|c| c.set(c.get().saturating_add(count)));
}

pub(crate) fn add_block_read_byte(bytes: u64) {
    BLOCK_READ_BYTE.with(|c| c.set(c.get().saturating_add(bytes)));
}

pub(crate) fn add_block_checksum_time(nanos: u64) {
    BLOCK_CHECKSUM_TIME.with(|c| c.set(c.get().saturating_add(nanos)));
}

/// Measures wall time from construction and adds it to one counter on drop.
pub(crate) struct PerfTimer {
    start: Instant,
    sink: fn(u64),
}

impl PerfTimer {
    pub(crate) fn block_read() -> Self {
        PerfTimer {
            start: Instant::now(),
            sink: add_block_read_time,
        }
    }

    pub(crate) fn block_checksum() -> Self {
        PerfTimer {
            start: Instant::now(),
            sink: add_block_checksum_time,
        }
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        (self.sink)(self.start.elapsed().as_nanos() as u64);
    }
}
