//! Shared fixtures for the read-pipeline tests: in-memory file readers
//! (counting, deferring, failing), block/table byte builders, and tracing
//! setup.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::fmt::Subscriber;

use crate::checksum::{compute_block_checksum, ChecksumType};
use crate::encoding::put_fixed32;
use crate::file::{IoCompletion, RandomAccessFileReader, ReadSlice};
use crate::format::{BlockHandle, Footer, BLOCK_BASED_TABLE_MAGIC_NUMBER};
use crate::status::{Status, Submission};

pub fn init_tracing() {
    let _ = Subscriber::builder()
        .with_max_level(Level::TRACE)
        .try_init();
}

// ------------------------------------------------------------------------------------------------
// Byte builders
// ------------------------------------------------------------------------------------------------

/// Encode one on-disk block: payload followed by the 5-byte trailer
/// (compression-type byte + checksum over `payload || type`).
pub fn build_block(payload: &[u8], ctype: u8, checksum_type: ChecksumType) -> Vec<u8> {
    let mut block = payload.to_vec();
    block.push(ctype);
    let checksum = compute_block_checksum(&block, checksum_type);
    put_fixed32(&mut block, checksum);
    block
}

/// A footer describing a table whose blocks use `checksum_type`.
pub fn test_footer(checksum_type: ChecksumType) -> Footer {
    let mut footer = Footer::new(BLOCK_BASED_TABLE_MAGIC_NUMBER, 2);
    footer.set_checksum(checksum_type);
    footer.set_metaindex_handle(BlockHandle::new(0, 0));
    footer.set_index_handle(BlockHandle::new(0, 0));
    footer
}

/// Lay blocks out back to back and return the file image plus one handle
/// per block (handles exclude the trailer, as on disk).
pub fn build_table(
    payloads_and_types: &[(&[u8], u8)],
    checksum_type: ChecksumType,
) -> (Vec<u8>, Vec<BlockHandle>) {
    let mut image = Vec::new();
    let mut handles = Vec::new();
    for (payload, ctype) in payloads_and_types {
        let offset = image.len() as u64;
        handles.push(BlockHandle::new(offset, payload.len() as u64));
        image.extend_from_slice(&build_block(payload, *ctype, checksum_type));
    }
    (image, handles)
}

fn serve(data: &[u8], offset: u64, n: usize, mut scratch: Vec<u8>) -> ReadSlice {
    if scratch.len() < n {
        scratch.resize(n, 0);
    }
    let start = (offset as usize).min(data.len());
    let end = start.saturating_add(n).min(data.len());
    let len = end - start;
    scratch[..len].copy_from_slice(&data[start..end]);
    ReadSlice::Scratch { buf: scratch, len }
}

// ------------------------------------------------------------------------------------------------
// MemoryFileReader
// ------------------------------------------------------------------------------------------------

/// Serves reads from an in-memory image, counting how often it is touched.
pub struct MemoryFileReader {
    data: Vec<u8>,
    reads: AtomicU64,
}

impl MemoryFileReader {
    pub fn new(data: Vec<u8>) -> Self {
        MemoryFileReader {
            data,
            reads: AtomicU64::new(0),
        }
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn file_size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl RandomAccessFileReader for MemoryFileReader {
    fn read(&self, offset: u64, n: usize, scratch: Vec<u8>) -> (Status, ReadSlice) {
        self.reads.fetch_add(1, Ordering::SeqCst);
        (Status::ok(), serve(&self.data, offset, n, scratch))
    }
}

// ------------------------------------------------------------------------------------------------
// DirectFileReader
// ------------------------------------------------------------------------------------------------

/// Serves reads out of its own buffer (`ReadSlice::Direct`), modelling a
/// reader whose results do not land in the caller's scratch.
pub struct DirectFileReader {
    data: Vec<u8>,
}

impl DirectFileReader {
    pub fn new(data: Vec<u8>) -> Self {
        DirectFileReader { data }
    }
}

impl RandomAccessFileReader for DirectFileReader {
    fn read(&self, offset: u64, n: usize, _scratch: Vec<u8>) -> (Status, ReadSlice) {
        let start = (offset as usize).min(self.data.len());
        let end = start.saturating_add(n).min(self.data.len());
        (
            Status::ok(),
            ReadSlice::Direct {
                buf: self.data[start..end].to_vec(),
            },
        )
    }
}

// ------------------------------------------------------------------------------------------------
// FailingFileReader
// ------------------------------------------------------------------------------------------------

/// Fails every read with a fixed status.
pub struct FailingFileReader {
    status: Status,
}

impl FailingFileReader {
    pub fn new(status: Status) -> Self {
        FailingFileReader { status }
    }
}

impl RandomAccessFileReader for FailingFileReader {
    fn read(&self, _offset: u64, _n: usize, _scratch: Vec<u8>) -> (Status, ReadSlice) {
        (self.status.clone(), ReadSlice::empty())
    }
}

// ------------------------------------------------------------------------------------------------
// DeferredFileReader
// ------------------------------------------------------------------------------------------------

struct PendingRead {
    offset: u64,
    n: usize,
    scratch: Vec<u8>,
    done: IoCompletion,
}

/// Accepts every submission as pending; the test decides when (and how)
/// each completion fires. Blocking reads are served immediately.
pub struct DeferredFileReader {
    data: Vec<u8>,
    pending: Mutex<VecDeque<PendingRead>>,
}

impl DeferredFileReader {
    pub fn new(data: Vec<u8>) -> Self {
        DeferredFileReader {
            data,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Fire the oldest pending completion with the real bytes.
    /// Returns `false` when nothing is pending.
    pub fn complete_next(&self) -> bool {
        // Release the queue lock before invoking the completion so a
        // reentrant submission from inside the callback cannot deadlock.
        let next = self.pending.lock().unwrap().pop_front();
        match next {
            Some(read) => {
                let slice = serve(&self.data, read.offset, read.n, read.scratch);
                (read.done)(Status::ok(), slice);
                true
            }
            None => false,
        }
    }

    /// Fire the oldest pending completion with a failure status.
    pub fn fail_next(&self, status: Status) -> bool {
        let next = self.pending.lock().unwrap().pop_front();
        match next {
            Some(read) => {
                (read.done)(status, ReadSlice::empty());
                true
            }
            None => false,
        }
    }
}

impl RandomAccessFileReader for DeferredFileReader {
    fn read(&self, offset: u64, n: usize, scratch: Vec<u8>) -> (Status, ReadSlice) {
        (Status::ok(), serve(&self.data, offset, n, scratch))
    }

    fn request_read(
        &self,
        offset: u64,
        n: usize,
        scratch: Vec<u8>,
        done: IoCompletion,
    ) -> Submission<ReadSlice> {
        self.pending.lock().unwrap().push_back(PendingRead {
            offset,
            n,
            scratch,
            done,
        });
        Submission::Pending
    }
}
