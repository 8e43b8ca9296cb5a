//! Random-Access File Readers
//!
//! The read pipeline talks to storage through the
//! [`RandomAccessFileReader`] trait: one bounded positional read at a time,
//! in either of two modes sharing one completion shape:
//!
//! - **Blocking**: [`RandomAccessFileReader::read`] returns when the bytes
//!   are available.
//! - **Submission**: [`RandomAccessFileReader::request_read`] either
//!   completes inline (the callback is dropped uninvoked and the result is
//!   returned to the submitter) or returns
//!   [`Submission::Pending`](crate::status::Submission), in which case the
//!   reader owns the boxed callback and must invoke it exactly once.
//!
//! # Buffer ownership
//!
//! A completed read is a [`ReadSlice`]: either the caller's scratch buffer
//! handed back with a valid length (`Scratch`), or a buffer the reader
//! materialized itself (`Direct`) — e.g. a copy out of a memory map. The
//! distinction is load-bearing: the contents pipeline caches `Scratch`
//! results but marks `Direct` results non-cachable.
//!
//! Short reads at end-of-file are **not** errors; the slice is simply
//! shorter than requested and consumers enforce their own length
//! requirements.

#[cfg(test)]
mod tests;

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;

use memmap2::Mmap;

use crate::status::{Status, Submission};

// ------------------------------------------------------------------------------------------------
// ReadSlice
// ------------------------------------------------------------------------------------------------

/// The bytes delivered by a completed read, tagged with their provenance.
#[derive(Debug)]
pub enum ReadSlice {
    /// The reader filled the scratch buffer that accompanied the request;
    /// the valid bytes are `buf[..len]`.
    Scratch {
        /// The scratch buffer, returned to the pipeline.
        buf: Vec<u8>,
        /// Number of valid bytes at the front of `buf`.
        len: usize,
    },
    /// The reader surrendered a buffer of its own; all of `buf` is valid.
    Direct {
        /// The reader-materialized buffer.
        buf: Vec<u8>,
    },
}

impl ReadSlice {
    /// The valid bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ReadSlice::Scratch { buf, len } => &buf[..(*len).min(buf.len())],
            ReadSlice::Direct { buf } => buf,
        }
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the read produced no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the bytes live in a reader-internal buffer rather than the
    /// request's scratch.
    pub fn is_direct(&self) -> bool {
        matches!(self, ReadSlice::Direct { .. })
    }

    /// An empty scratch-backed slice, used on failed reads.
    pub fn empty() -> ReadSlice {
        ReadSlice::Scratch {
            buf: Vec::new(),
            len: 0,
        }
    }

    /// Surrender the underlying buffer, truncated to the valid length.
    pub fn into_vec(self) -> Vec<u8> {
        match self {
            ReadSlice::Scratch { mut buf, len } => {
                buf.truncate(len);
                buf
            }
            ReadSlice::Direct { buf } => buf,
        }
    }
}

/// Completion callback for a submitted read. Invoked exactly once, and only
/// when the submission returned `Pending`.
pub type IoCompletion = Box<dyn FnOnce(Status, ReadSlice) + Send>;

// ------------------------------------------------------------------------------------------------
// Reader trait
// ------------------------------------------------------------------------------------------------

/// A file exposing bounded positional reads, usable blocking or via
/// completion callback.
pub trait RandomAccessFileReader: Send + Sync {
    /// Blocking positional read of up to `n` bytes at `offset`.
    ///
    /// `scratch` must hold at least `n` bytes; the reader either fills it
    /// (`ReadSlice::Scratch`) or returns its own buffer
    /// (`ReadSlice::Direct`). On error the status is non-ok and the slice
    /// is empty.
    fn read(&self, offset: u64, n: usize, scratch: Vec<u8>) -> (Status, ReadSlice);

    /// Submit a positional read.
    ///
    /// Returns [`Submission::Inline`] when the read completed on the
    /// calling thread — `done` is dropped uninvoked. Returns
    /// [`Submission::Pending`] when the reader accepted the request; it now
    /// owns `done` and must invoke it exactly once with the completion
    /// status and slice.
    ///
    /// The default implementation completes inline via [`Self::read`].
    fn request_read(
        &self,
        offset: u64,
        n: usize,
        scratch: Vec<u8>,
        done: IoCompletion,
    ) -> Submission<ReadSlice> {
        drop(done);
        let (status, slice) = self.read(offset, n, scratch);
        Submission::Inline(status, slice)
    }

    /// Whether the file was opened for direct I/O.
    fn use_direct_io(&self) -> bool {
        false
    }

    /// Alignment the reader requires of scratch buffers (bytes).
    fn required_buffer_alignment(&self) -> usize {
        1
    }
}

// ------------------------------------------------------------------------------------------------
// FsFileReader
// ------------------------------------------------------------------------------------------------

/// Reader backed by an open [`File`], using positional reads.
#[derive(Debug)]
pub struct FsFileReader {
    file: File,
}

impl FsFileReader {
    /// Open `path` read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<FsFileReader, Status> {
        let file = File::open(path)?;
        Ok(FsFileReader { file })
    }

    /// Wrap an already-open file.
    pub fn new(file: File) -> FsFileReader {
        FsFileReader { file }
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> Result<u64, Status> {
        Ok(self.file.metadata()?.len())
    }
}

impl RandomAccessFileReader for FsFileReader {
    fn read(&self, offset: u64, n: usize, mut scratch: Vec<u8>) -> (Status, ReadSlice) {
        if scratch.len() < n {
            scratch.resize(n, 0);
        }

        let mut filled = 0;
        while filled < n {
            match self.file.read_at(&mut scratch[filled..n], offset + filled as u64) {
                Ok(0) => break, // end of file: short read, not an error
                Ok(read) => filled += read,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return (e.into(), ReadSlice::empty()),
            }
        }

        (
            Status::ok(),
            ReadSlice::Scratch {
                buf: scratch,
                len: filled,
            },
        )
    }
}

// ------------------------------------------------------------------------------------------------
// MmapFileReader
// ------------------------------------------------------------------------------------------------

/// Reader backed by a read-only memory map.
///
/// Results are delivered as [`ReadSlice::Direct`]: the bytes come from the
/// reader's own mapping, not the request's scratch buffer, so the contents
/// pipeline treats them as non-cachable pass-through.
#[derive(Debug)]
pub struct MmapFileReader {
    map: Mmap,
}

impl MmapFileReader {
    /// Open and map `path`.
    ///
    /// The mapping is read-only and the file is expected to be immutable
    /// for the lifetime of the reader, which is what makes the `Mmap::map`
    /// call sound.
    pub fn open(path: impl AsRef<Path>) -> Result<MmapFileReader, Status> {
        let file = File::open(path)?;
        let map = unsafe { Mmap::map(&file) }.map_err(Status::from)?;
        Ok(MmapFileReader { map })
    }

    /// Total mapped size in bytes.
    pub fn file_size(&self) -> u64 {
        self.map.len() as u64
    }
}

impl RandomAccessFileReader for MmapFileReader {
    fn read(&self, offset: u64, n: usize, _scratch: Vec<u8>) -> (Status, ReadSlice) {
        let len = self.map.len();
        let start = (offset as usize).min(len);
        let end = start.saturating_add(n).min(len);
        (
            Status::ok(),
            ReadSlice::Direct {
                buf: self.map[start..end].to_vec(),
            },
        )
    }
}
