//! Block Read Pipelines
//!
//! The three composed read pipelines of the table format, each usable
//! synchronously or through an I/O-completion callback over a single
//! completion path:
//!
//! 1. **Footer read** — [`read_footer_from_file`] /
//!    [`request_footer_read`]: read the last bytes of the file and decode
//!    the [`Footer`], optionally enforcing an expected magic number.
//! 2. **Block read** — [`read_block`] / [`request_block_read`]: read one
//!    block (payload plus 5-byte trailer) named by a [`BlockHandle`] and
//!    verify its trailer checksum.
//! 3. **Block contents** — [`read_block_contents`] /
//!    [`request_block_contents_read`]: the top-level composer. Probe the
//!    persistent cache, fall back to the block read, populate the raw
//!    cache, decompress if requested, populate the uncompressed cache, and
//!    deliver [`BlockContents`].
//!
//! ## Execution model
//!
//! Every pipeline is written as a pure completion function over
//! `(request parameters, status, slice)`. The synchronous entry point runs
//! the completion inline; the asynchronous entry point packages the same
//! completion (plus the client callback) into the boxed [`IoCompletion`]
//! handed to the file reader. [`Submission::Pending`] therefore *is* the
//! heap-owned in-flight context: the reader owns the closure and must
//! invoke it exactly once, and every status delivered through it is tagged
//! [`Status::is_async`]. When the reader completes inline the closure is
//! dropped uninvoked and the submitter drives the identical completion
//! directly. Resubmission from inside a completion callback is permitted —
//! no pipeline state outlives the closure and no locks are held across the
//! invocation.
//!
//! ## Error policy
//!
//! Corruption (decode, length, checksum, decompression) and I/O errors
//! short-circuit all later stages and surface to the caller. Persistent
//! cache errors other than NotFound are logged at `info` and treated as
//! misses; cache insert failures are logged and swallowed.

#[cfg(test)]
mod tests;

use tracing::{info, trace};

use crate::cache::{
    insert_raw_page, insert_uncompressed_page, lookup_raw_page, lookup_uncompressed_page,
    PersistentCache, PersistentCacheOptions,
};
use crate::checksum::{verify_block_checksum, ChecksumType};
use crate::compression::{uncompress_block_contents, CompressionType};
use crate::encoding::decode_fixed32;
use crate::file::{IoCompletion, RandomAccessFileReader, ReadSlice};
use crate::format::{BlockContents, BlockHandle, Footer, BLOCK_TRAILER_SIZE};
use crate::options::{ImmutableOptions, ReadOptions};
use crate::perf::{add_block_read_byte, add_block_read_count, PerfTimer};
use crate::status::{Status, Submission};

// ------------------------------------------------------------------------------------------------
// Callback aliases
// ------------------------------------------------------------------------------------------------

/// Completion callback of [`request_footer_read`]. The footer is present
/// exactly when the status is ok.
pub type FooterCallback = Box<dyn FnOnce(Status, Option<Footer>) + Send>;

/// Completion callback of [`request_block_read`]. The slice is delivered
/// even on failure (it may hold the partial bytes that failed validation).
pub type ReadBlockCallback = Box<dyn FnOnce(Status, ReadSlice) + Send>;

/// Completion callback of [`request_block_contents_read`]. The contents are
/// present exactly when the status is ok.
pub type BlockContentsCallback = Box<dyn FnOnce(Status, Option<BlockContents>) + Send>;

// ------------------------------------------------------------------------------------------------
// RandomReadContext
// ------------------------------------------------------------------------------------------------

/// One bounded range read against a file reader.
///
/// Records the reader's direct-I/O flag and buffer alignment at
/// construction, sizes the scratch buffer accordingly, and normalizes the
/// completed slice to at most the requested length.
#[derive(Debug, Clone, Copy)]
pub struct RandomReadContext {
    offset: u64,
    n: usize,
    direct_io: bool,
    alignment: usize,
}

impl RandomReadContext {
    /// Prepare a read of `n` bytes at `offset`.
    pub fn new(file: &dyn RandomAccessFileReader, offset: u64, n: usize) -> Self {
        RandomReadContext {
            offset,
            n,
            direct_io: file.use_direct_io(),
            alignment: file.required_buffer_alignment().max(1),
        }
    }

    /// The requested read length.
    pub fn requested_size(&self) -> usize {
        self.n
    }

    /// Allocate the scratch buffer for this read. Direct-I/O readers get a
    /// buffer rounded up to their required alignment.
    pub fn prepare_read(&self) -> Vec<u8> {
        let len = if self.direct_io {
            self.n.div_ceil(self.alignment) * self.alignment
        } else {
            self.n
        };
        vec![0u8; len]
    }

    /// Blocking read.
    pub fn read(&self, file: &dyn RandomAccessFileReader) -> (Status, ReadSlice) {
        let (status, slice) = file.read(self.offset, self.n, self.prepare_read());
        (status, self.on_random_read_complete(slice))
    }

    /// Submit the read; a pending submission normalizes the slice before
    /// invoking `done`.
    pub fn request_read(
        &self,
        file: &dyn RandomAccessFileReader,
        done: IoCompletion,
    ) -> Submission<ReadSlice> {
        let ctx = *self;
        let normalized: IoCompletion = Box::new(move |status, slice| {
            done(status, ctx.on_random_read_complete(slice));
        });
        match file.request_read(self.offset, self.n, self.prepare_read(), normalized) {
            Submission::Inline(status, slice) => {
                Submission::Inline(status, self.on_random_read_complete(slice))
            }
            Submission::Pending => Submission::Pending,
        }
    }

    /// Clamp the returned slice to the requested length. Aligned direct-I/O
    /// reads may deliver more bytes than asked for.
    pub fn on_random_read_complete(&self, slice: ReadSlice) -> ReadSlice {
        match slice {
            ReadSlice::Scratch { buf, len } => ReadSlice::Scratch {
                buf,
                len: len.min(self.n),
            },
            ReadSlice::Direct { mut buf } => {
                buf.truncate(self.n);
                ReadSlice::Direct { buf }
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Footer read
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct FooterReadRequest {
    enforce_table_magic_number: u64,
}

fn footer_read_context(
    file: &dyn RandomAccessFileReader,
    file_size: u64,
) -> Result<RandomReadContext, Status> {
    if file_size < Footer::MIN_ENCODED_LENGTH as u64 {
        return Err(Status::corruption("file is too short to be an sstable"));
    }
    let read_size = (Footer::MAX_ENCODED_LENGTH as u64).min(file_size) as usize;
    let offset = file_size - read_size as u64;
    Ok(RandomReadContext::new(file, offset, read_size))
}

fn complete_footer_read(
    req: &FooterReadRequest,
    status: Status,
    slice: &ReadSlice,
) -> Result<Footer, Status> {
    status.into_result()?;

    // The file size the caller reported may have been wrong; re-check what
    // the reader actually delivered.
    let mut input = slice.as_bytes();
    if input.len() < Footer::MIN_ENCODED_LENGTH {
        return Err(Status::corruption("file is too short to be an sstable"));
    }

    let footer = Footer::decode_from(&mut input)?;

    if req.enforce_table_magic_number != 0
        && req.enforce_table_magic_number != footer.table_magic_number()
    {
        return Err(Status::corruption("Bad table magic number"));
    }
    Ok(footer)
}

/// Read and decode the footer of a file of `file_size` bytes.
///
/// `enforce_table_magic_number` of 0 disables magic enforcement; any other
/// value must match the decoded (upconverted) magic or the read fails with
/// "Bad table magic number".
pub fn read_footer_from_file(
    file: &dyn RandomAccessFileReader,
    file_size: u64,
    enforce_table_magic_number: u64,
) -> Result<Footer, Status> {
    let ctx = footer_read_context(file, file_size)?;
    let req = FooterReadRequest {
        enforce_table_magic_number,
    };
    let (status, slice) = ctx.read(file);
    complete_footer_read(&req, status, &slice)
}

/// Submit a footer read. See [`read_footer_from_file`] for the protocol and
/// the module docs for the submission contract.
pub fn request_footer_read(
    file: &dyn RandomAccessFileReader,
    file_size: u64,
    enforce_table_magic_number: u64,
    cb: FooterCallback,
) -> Submission<Option<Footer>> {
    let ctx = match footer_read_context(file, file_size) {
        Ok(ctx) => ctx,
        Err(status) => return Submission::Inline(status, None),
    };
    let req = FooterReadRequest {
        enforce_table_magic_number,
    };

    let done: IoCompletion = Box::new(move |status, slice| {
        match complete_footer_read(&req, status, &slice) {
            Ok(footer) => cb(Status::ok().into_async(), Some(footer)),
            Err(status) => cb(status.into_async(), None),
        }
    });

    match ctx.request_read(file, done) {
        Submission::Pending => Submission::Pending,
        Submission::Inline(status, slice) => match complete_footer_read(&req, status, &slice) {
            Ok(footer) => Submission::Inline(Status::ok(), Some(footer)),
            Err(status) => Submission::Inline(status, None),
        },
    }
}

// ------------------------------------------------------------------------------------------------
// Block read
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct BlockReadRequest {
    checksum_type: ChecksumType,
    verify_checksums: bool,
    /// `handle.size + BLOCK_TRAILER_SIZE`.
    requested: usize,
}

impl BlockReadRequest {
    fn new(footer: &Footer, options: &ReadOptions, handle: &BlockHandle) -> Self {
        BlockReadRequest {
            checksum_type: footer.checksum(),
            verify_checksums: options.verify_checksums,
            requested: handle.size() as usize + BLOCK_TRAILER_SIZE,
        }
    }
}

/// Shared completion of a block read: counters, length check, checksum.
/// Runs on every completion path, success or failure.
fn complete_block_read(req: &BlockReadRequest, status: Status, slice: &ReadSlice) -> Status {
    add_block_read_count(1);
    add_block_read_byte(slice.len() as u64);

    if let Err(status) = status.into_result() {
        return status;
    }

    let bytes = slice.as_bytes();
    if bytes.len() != req.requested {
        return Status::corruption("truncated block read");
    }
    let n = req.requested - BLOCK_TRAILER_SIZE;

    if req.verify_checksums {
        let _timer = PerfTimer::block_checksum();
        let stored = match decode_fixed32(&bytes[n + 1..]) {
            Some(stored) => stored,
            None => return Status::corruption("truncated block read"),
        };
        if let Err(status) = verify_block_checksum(&bytes[..n + 1], stored, req.checksum_type) {
            return status;
        }
    }
    Status::ok()
}

/// Read the block at `handle` plus its trailer, verifying the trailer
/// checksum when `options.verify_checksums` is set.
///
/// The returned slice spans the full `handle.size + BLOCK_TRAILER_SIZE`
/// bytes; callers strip the trailer.
pub fn read_block(
    file: &dyn RandomAccessFileReader,
    footer: &Footer,
    options: &ReadOptions,
    handle: &BlockHandle,
) -> Result<ReadSlice, Status> {
    trace!(offset = handle.offset(), size = handle.size(), "block read");
    let req = BlockReadRequest::new(footer, options, handle);
    let ctx = RandomReadContext::new(file, handle.offset(), req.requested);

    let timer = PerfTimer::block_read();
    let (status, slice) = ctx.read(file);
    let status = complete_block_read(&req, status, &slice);
    drop(timer);

    status.into_result()?;
    Ok(slice)
}

/// Submit a block read; `cb` receives the final composed status and the
/// slice (which may hold partial bytes on failure).
pub fn request_block_read(
    file: &dyn RandomAccessFileReader,
    footer: &Footer,
    options: &ReadOptions,
    handle: &BlockHandle,
    cb: ReadBlockCallback,
) -> Submission<ReadSlice> {
    trace!(offset = handle.offset(), size = handle.size(), "block read submitted");
    let req = BlockReadRequest::new(footer, options, handle);
    let ctx = RandomReadContext::new(file, handle.offset(), req.requested);

    let timer = PerfTimer::block_read();
    let done: IoCompletion = Box::new(move |status, slice| {
        let status = complete_block_read(&req, status, &slice);
        drop(timer);
        cb(status.into_async(), slice);
    });

    match ctx.request_read(file, done) {
        Submission::Pending => Submission::Pending,
        Submission::Inline(status, slice) => {
            let status = complete_block_read(&req, status, &slice);
            Submission::Inline(status, slice)
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Block contents read
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ContentsRequest {
    handle: BlockHandle,
    format_version: u32,
    read_options: ReadOptions,
    options: ImmutableOptions,
    decompression_requested: bool,
    compression_dict: Vec<u8>,
    cache_options: PersistentCacheOptions,
}

enum CacheProbe {
    /// Final contents served directly from the uncompressed cache.
    UncompressedHit(BlockContents),
    /// Raw page (payload + trailer) served from the compressed cache;
    /// proceeds to decompression, skipping the file read.
    RawHit(ReadSlice),
    Miss,
}

fn uncompressed_cache(options: &PersistentCacheOptions) -> Option<&dyn PersistentCache> {
    options
        .persistent_cache
        .as_deref()
        .filter(|cache| !cache.is_compressed())
}

fn compressed_cache(options: &PersistentCacheOptions) -> Option<&dyn PersistentCache> {
    options
        .persistent_cache
        .as_deref()
        .filter(|cache| cache.is_compressed())
}

fn check_persistent_cache(req: &ContentsRequest) -> CacheProbe {
    let n = req.handle.size() as usize;

    if let Some(cache) = uncompressed_cache(&req.cache_options) {
        match lookup_uncompressed_page(cache, &req.handle) {
            Ok(contents) => return CacheProbe::UncompressedHit(contents),
            Err(status) if !status.is_not_found() => {
                info!("error reading from persistent cache: {status}");
            }
            Err(_) => {}
        }
    }

    if let Some(cache) = compressed_cache(&req.cache_options) {
        match lookup_raw_page(cache, &req.handle, n + BLOCK_TRAILER_SIZE) {
            Ok(buf) => {
                return CacheProbe::RawHit(ReadSlice::Scratch {
                    len: buf.len(),
                    buf,
                });
            }
            Err(status) if !status.is_not_found() => {
                info!("error reading from persistent cache: {status}");
            }
            Err(_) => {}
        }
    }

    CacheProbe::Miss
}

/// Post-acquisition stage: raw-cache insert, then decompress or repackage.
/// `slice` holds the verified `n + BLOCK_TRAILER_SIZE` bytes.
fn complete_contents_read(
    req: &ContentsRequest,
    slice: ReadSlice,
) -> Result<BlockContents, Status> {
    let n = req.handle.size() as usize;

    if req.read_options.fill_cache {
        if let Some(cache) = compressed_cache(&req.cache_options) {
            if let Err(status) = insert_raw_page(cache, &req.handle, slice.as_bytes()) {
                info!("error writing to persistent cache: {status}");
            }
        }
    }

    let tag = *slice
        .as_bytes()
        .get(n)
        .ok_or_else(|| Status::corruption("truncated block read"))?;
    let compression_type = CompressionType::from_u8(tag)
        .ok_or_else(|| Status::corruption("bad block type"))?;

    if req.decompression_requested && compression_type != CompressionType::None {
        return uncompress_block_contents(
            slice.as_bytes(),
            n,
            req.format_version,
            &req.compression_dict,
            &req.options,
        );
    }

    // No decompression: repackage the payload without the trailer. Bytes
    // from a reader-internal buffer must not be re-cached.
    let cachable = !slice.is_direct();
    let mut data = slice.into_vec();
    data.truncate(n);
    Ok(BlockContents::new(data, cachable, compression_type))
}

/// Final stage: uncompressed-cache insert on success.
fn finish_contents_read(
    req: &ContentsRequest,
    result: Result<BlockContents, Status>,
) -> Result<BlockContents, Status> {
    let contents = result?;
    if req.read_options.fill_cache {
        if let Some(cache) = uncompressed_cache(&req.cache_options) {
            if let Err(status) = insert_uncompressed_page(cache, &req.handle, &contents) {
                info!("error writing to persistent cache: {status}");
            }
        }
    }
    Ok(contents)
}

/// Read the contents of the block at `handle`.
///
/// Probes the persistent cache first: an uncompressed-cache hit returns
/// immediately without touching `file`; a raw-cache hit skips the file read
/// and proceeds to decompression. On a miss the block is read and verified
/// per `read_options`, the raw page is inserted into a compressed cache
/// (when `fill_cache`), the payload is decompressed when
/// `decompression_requested` and the block is compressed, and the final
/// contents are inserted into an uncompressed cache (when `fill_cache`).
#[allow(clippy::too_many_arguments)]
pub fn read_block_contents(
    file: &dyn RandomAccessFileReader,
    footer: &Footer,
    read_options: &ReadOptions,
    handle: &BlockHandle,
    options: &ImmutableOptions,
    decompression_requested: bool,
    compression_dict: &[u8],
    cache_options: &PersistentCacheOptions,
) -> Result<BlockContents, Status> {
    let req = ContentsRequest {
        handle: *handle,
        format_version: footer.version(),
        read_options: *read_options,
        options: options.clone(),
        decompression_requested,
        compression_dict: compression_dict.to_vec(),
        cache_options: cache_options.clone(),
    };

    match check_persistent_cache(&req) {
        CacheProbe::UncompressedHit(contents) => Ok(contents),
        CacheProbe::RawHit(slice) => {
            finish_contents_read(&req, complete_contents_read(&req, slice))
        }
        CacheProbe::Miss => {
            let slice = read_block(file, footer, read_options, handle)?;
            finish_contents_read(&req, complete_contents_read(&req, slice))
        }
    }
}

/// Submit a block-contents read. Cache hits complete inline (the probe
/// never suspends); only the file read can defer.
#[allow(clippy::too_many_arguments)]
pub fn request_block_contents_read(
    file: &dyn RandomAccessFileReader,
    footer: &Footer,
    read_options: &ReadOptions,
    handle: &BlockHandle,
    options: &ImmutableOptions,
    decompression_requested: bool,
    compression_dict: &[u8],
    cache_options: &PersistentCacheOptions,
    cb: BlockContentsCallback,
) -> Submission<Option<BlockContents>> {
    let req = ContentsRequest {
        handle: *handle,
        format_version: footer.version(),
        read_options: *read_options,
        options: options.clone(),
        decompression_requested,
        compression_dict: compression_dict.to_vec(),
        cache_options: cache_options.clone(),
    };

    match check_persistent_cache(&req) {
        CacheProbe::UncompressedHit(contents) => {
            Submission::Inline(Status::ok(), Some(contents))
        }
        CacheProbe::RawHit(slice) => {
            inline_contents(finish_contents_read(&req, complete_contents_read(&req, slice)))
        }
        CacheProbe::Miss => {
            let block_req = BlockReadRequest::new(footer, read_options, handle);
            let ctx = RandomReadContext::new(file, handle.offset(), block_req.requested);

            let timer = PerfTimer::block_read();
            let pending_req = req.clone();
            let done: IoCompletion = Box::new(move |status, slice| {
                let status = complete_block_read(&block_req, status, &slice);
                drop(timer);
                let result = status.into_result().and_then(|()| {
                    finish_contents_read(
                        &pending_req,
                        complete_contents_read(&pending_req, slice),
                    )
                });
                match result {
                    Ok(contents) => cb(Status::ok().into_async(), Some(contents)),
                    Err(status) => cb(status.into_async(), None),
                }
            });

            match ctx.request_read(file, done) {
                Submission::Pending => Submission::Pending,
                Submission::Inline(status, slice) => {
                    let status = complete_block_read(&block_req, status, &slice);
                    inline_contents(status.into_result().and_then(|()| {
                        finish_contents_read(&req, complete_contents_read(&req, slice))
                    }))
                }
            }
        }
    }
}

fn inline_contents(result: Result<BlockContents, Status>) -> Submission<Option<BlockContents>> {
    match result {
        Ok(contents) => Submission::Inline(Status::ok(), Some(contents)),
        Err(status) => Submission::Inline(status, None),
    }
}
