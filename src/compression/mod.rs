//! Block Compression Codecs
//!
//! Format-version-aware compressors and uncompressors for every codec a
//! block trailer can name. The dispatch is keyed by the compression-type
//! byte stored in the block trailer; the table's format version selects the
//! codec-internal framing.
//!
//! # Framing
//!
//! | Codec       | format ≥ 2                          | format < 2                  |
//! |-------------|-------------------------------------|-----------------------------|
//! | Snappy      | self-framing                        | self-framing                |
//! | Zlib        | varint32 size prefix + raw deflate  | raw deflate, streamed       |
//! | BZip2       | varint32 size prefix + bz2 stream   | bz2 stream                  |
//! | LZ4 / LZ4HC | varint32 size prefix + lz4 block    | 8-byte legacy size header   |
//! | ZSTD        | varint32 size prefix (always)       | varint32 size prefix        |
//! | XPRESS      | not compiled in — always rejected   | —                           |
//!
//! Every codec failure is reported as a `Corruption` with a codec-specific
//! message; an unknown compression tag fails with "bad block type".
//!
//! # Detailed timing
//!
//! Decompression nanos, bytes produced, and a block counter are recorded
//! only when the [`ImmutableOptions`] carry both a clock and a statistics
//! sink whose level is above `ExceptDetailedTimers`.


use std::io::Read;

use crate::encoding::get_varint32;
use crate::format::BlockContents;
use crate::options::ImmutableOptions;
use crate::stats::{should_report_detailed_time, Histogram, Ticker};
use crate::status::Status;

// ------------------------------------------------------------------------------------------------
// Compression type tag
// ------------------------------------------------------------------------------------------------

/// Compression algorithm tag as stored in every block trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionType {
    /// Uncompressed payload.
    #[default]
    None = 0,
    /// Snappy.
    Snappy = 1,
    /// Raw-deflate Zlib.
    Zlib = 2,
    /// BZip2.
    BZip2 = 3,
    /// LZ4 block format.
    Lz4 = 4,
    /// LZ4 block format, high-compression encoder. Identical wire shape to
    /// [`CompressionType::Lz4`].
    Lz4hc = 5,
    /// Windows XPRESS. Recognized in the tag space; no codec is compiled in.
    Xpress = 6,
    /// ZSTD.
    Zstd = 7,
    /// Tag written by pre-release ZSTD builds; decoded as ZSTD.
    ZstdNotFinal = 0x40,
}

impl CompressionType {
    /// Decode a wire tag.
    pub fn from_u8(tag: u8) -> Option<CompressionType> {
        match tag {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Snappy),
            2 => Some(CompressionType::Zlib),
            3 => Some(CompressionType::BZip2),
            4 => Some(CompressionType::Lz4),
            5 => Some(CompressionType::Lz4hc),
            6 => Some(CompressionType::Xpress),
            7 => Some(CompressionType::Zstd),
            0x40 => Some(CompressionType::ZstdNotFinal),
            _ => None,
        }
    }

    /// The wire tag for this codec.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Codec-internal framing revision selected by the table format version.
///
/// As of format version 2 the decompressed size is stored as a varint32
/// prefix for the codecs that cannot recover it from their own stream.
/// Only meaningful for the versioned codecs; Snappy is self-framing, ZSTD
/// always carries the prefix, and XPRESS is never compiled in.
pub fn compress_format_for_version(ty: CompressionType, version: u32) -> u32 {
    debug_assert_ne!(ty, CompressionType::Snappy);
    debug_assert_ne!(ty, CompressionType::Xpress);
    debug_assert_ne!(ty, CompressionType::None);
    if version >= 2 {
        2
    } else {
        1
    }
}

const SNAPPY_CORRUPT_MSG: &str =
    "Snappy not supported or corrupted Snappy compressed block contents";
const ZLIB_CORRUPT_MSG: &str = "Zlib not supported or corrupted Zlib compressed block contents";
const BZIP2_CORRUPT_MSG: &str =
    "Bzip2 not supported or corrupted Bzip2 compressed block contents";
const LZ4_CORRUPT_MSG: &str = "LZ4 not supported or corrupted LZ4 compressed block contents";
const LZ4HC_CORRUPT_MSG: &str =
    "LZ4HC not supported or corrupted LZ4HC compressed block contents";
const XPRESS_CORRUPT_MSG: &str =
    "XPRESS not supported or corrupted XPRESS compressed block contents";
const ZSTD_CORRUPT_MSG: &str = "ZSTD not supported or corrupted ZSTD compressed block contents";

// ------------------------------------------------------------------------------------------------
// Uncompression dispatch
// ------------------------------------------------------------------------------------------------

/// Uncompress one block payload whose trailer names the codec.
///
/// `data` holds the raw block bytes followed by the compression-type byte:
/// the payload is `data[..n]` and the tag is `data[n]`. The result owns a
/// fresh heap buffer and is tagged [`CompressionType::None`].
pub fn uncompress_block_contents(
    data: &[u8],
    n: usize,
    format_version: u32,
    compression_dict: &[u8],
    opts: &ImmutableOptions,
) -> Result<BlockContents, Status> {
    let tag = *data
        .get(n)
        .ok_or_else(|| Status::corruption("bad block type"))?;
    debug_assert_ne!(tag, CompressionType::None.as_u8());
    let ty = CompressionType::from_u8(tag)
        .ok_or_else(|| Status::corruption("bad block type"))?;
    uncompress_block_contents_for_type(&data[..n], format_version, compression_dict, ty, opts)
}

/// Uncompress a block payload with an explicitly-named codec.
pub fn uncompress_block_contents_for_type(
    data: &[u8],
    format_version: u32,
    compression_dict: &[u8],
    ty: CompressionType,
    opts: &ImmutableOptions,
) -> Result<BlockContents, Status> {
    debug_assert_ne!(ty, CompressionType::None);

    let report = should_report_detailed_time(
        opts.env.as_deref(),
        opts.statistics.as_deref(),
    );
    let start_nanos = if report {
        opts.env.as_deref().map(|env| env.now_nanos())
    } else {
        None
    };

    let ubuf = match ty {
        CompressionType::Snappy => snappy_uncompress(data)?,
        CompressionType::Zlib => zlib_uncompress(
            data,
            compress_format_for_version(ty, format_version),
            compression_dict,
        )?,
        CompressionType::BZip2 => {
            bzip2_uncompress(data, compress_format_for_version(ty, format_version))?
        }
        CompressionType::Lz4 => lz4_uncompress(
            data,
            compress_format_for_version(ty, format_version),
            compression_dict,
            LZ4_CORRUPT_MSG,
        )?,
        CompressionType::Lz4hc => lz4_uncompress(
            data,
            compress_format_for_version(ty, format_version),
            compression_dict,
            LZ4HC_CORRUPT_MSG,
        )?,
        CompressionType::Xpress => return Err(Status::corruption(XPRESS_CORRUPT_MSG)),
        CompressionType::Zstd | CompressionType::ZstdNotFinal => {
            zstd_uncompress(data, compression_dict)?
        }
        CompressionType::None => return Err(Status::corruption("bad block type")),
    };

    if let (Some(start), Some(env), Some(stats)) =
        (start_nanos, opts.env.as_deref(), opts.statistics.as_deref())
    {
        stats.measure_time(
            Histogram::DecompressionTimeNanos,
            env.now_nanos().saturating_sub(start),
        );
        stats.measure_time(Histogram::BytesDecompressed, ubuf.len() as u64);
        stats.record_tick(Ticker::BlocksDecompressed, 1);
    }

    Ok(BlockContents::new(ubuf, true, CompressionType::None))
}

// ------------------------------------------------------------------------------------------------
// Per-codec uncompressors
// ------------------------------------------------------------------------------------------------

/// Split off the varint32 decompressed-size prefix used by format-2 framing.
fn decompressed_size_info<'a>(data: &'a [u8], corrupt_msg: &'static str) -> Result<(usize, &'a [u8]), Status> {
    let mut cursor = data;
    let output_len = get_varint32(&mut cursor)
        .ok_or_else(|| Status::corruption(corrupt_msg))?;
    Ok((output_len as usize, cursor))
}

fn snappy_uncompress(data: &[u8]) -> Result<Vec<u8>, Status> {
    // Probe the self-framed length first so an unparsable header and a
    // failed decompression report the same corruption.
    snap::raw::decompress_len(data).map_err(|_| Status::corruption(SNAPPY_CORRUPT_MSG))?;
    snap::raw::Decoder::new()
        .decompress_vec(data)
        .map_err(|_| Status::corruption(SNAPPY_CORRUPT_MSG))
}

fn zlib_uncompress(data: &[u8], fmt: u32, dict: &[u8]) -> Result<Vec<u8>, Status> {
    if fmt == 2 {
        let (output_len, payload) = decompressed_size_info(data, ZLIB_CORRUPT_MSG)?;
        let out = inflate_raw(payload, dict, Some(output_len))
            .ok_or_else(|| Status::corruption(ZLIB_CORRUPT_MSG))?;
        if out.len() != output_len {
            return Err(Status::corruption(ZLIB_CORRUPT_MSG));
        }
        Ok(out)
    } else {
        inflate_raw(data, dict, None).ok_or_else(|| Status::corruption(ZLIB_CORRUPT_MSG))
    }
}

fn bzip2_uncompress(data: &[u8], fmt: u32) -> Result<Vec<u8>, Status> {
    let (expected_len, payload) = if fmt == 2 {
        let (len, payload) = decompressed_size_info(data, BZIP2_CORRUPT_MSG)?;
        (Some(len), payload)
    } else {
        (None, data)
    };

    let mut out = Vec::with_capacity(expected_len.unwrap_or(payload.len() * 4));
    bzip2::read::BzDecoder::new(payload)
        .read_to_end(&mut out)
        .map_err(|_| Status::corruption(BZIP2_CORRUPT_MSG))?;
    if let Some(expected) = expected_len {
        if out.len() != expected {
            return Err(Status::corruption(BZIP2_CORRUPT_MSG));
        }
    }
    Ok(out)
}

fn lz4_uncompress(
    data: &[u8],
    fmt: u32,
    dict: &[u8],
    corrupt_msg: &'static str,
) -> Result<Vec<u8>, Status> {
    let (output_len, payload) = if fmt == 2 {
        decompressed_size_info(data, corrupt_msg)?
    } else {
        // Legacy framing: decompressed size in the first 4 bytes of an
        // 8-byte header.
        if data.len() < 8 {
            return Err(Status::corruption(corrupt_msg));
        }
        let len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        (len, &data[8..])
    };

    let out = if dict.is_empty() {
        lz4_flex::block::decompress(payload, output_len)
    } else {
        lz4_flex::block::decompress_with_dict(payload, output_len, dict)
    }
    .map_err(|_| Status::corruption(corrupt_msg))?;

    if out.len() != output_len {
        return Err(Status::corruption(corrupt_msg));
    }
    Ok(out)
}

fn zstd_uncompress(data: &[u8], dict: &[u8]) -> Result<Vec<u8>, Status> {
    let (output_len, payload) = decompressed_size_info(data, ZSTD_CORRUPT_MSG)?;
    let out = if dict.is_empty() {
        zstd::bulk::decompress(payload, output_len)
    } else {
        zstd::bulk::Decompressor::with_dictionary(dict)
            .and_then(|mut d| d.decompress(payload, output_len))
    }
    .map_err(|_| Status::corruption(ZSTD_CORRUPT_MSG))?;

    if out.len() != output_len {
        return Err(Status::corruption(ZSTD_CORRUPT_MSG));
    }
    Ok(out)
}

/// Raw-deflate inflate with optional preset dictionary and growing output.
fn inflate_raw(input: &[u8], dict: &[u8], size_hint: Option<usize>) -> Option<Vec<u8>> {
    use flate2::{Decompress, FlushDecompress};

    let mut inflater = Decompress::new(false);
    if !dict.is_empty() {
        inflater.set_dictionary(dict).ok()?;
    }

    let mut out = Vec::with_capacity(size_hint.unwrap_or_else(|| (input.len() * 4).max(64)));
    loop {
        let consumed = inflater.total_in() as usize;
        if consumed > input.len() {
            return None;
        }
        let status = inflater
            .decompress_vec(&input[consumed..], &mut out, FlushDecompress::Finish)
            .ok()?;
        match status {
            flate2::Status::StreamEnd => return Some(out),
            flate2::Status::Ok | flate2::Status::BufError => {
                if out.len() == out.capacity() {
                    out.reserve(out.capacity().max(64));
                } else if inflater.total_in() as usize == consumed {
                    // No forward progress and no stream end: truncated input.
                    return None;
                }
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Compression dispatch (write-side twin, used by builders and tests)
// ------------------------------------------------------------------------------------------------

/// Compress `data` with the named codec in the framing selected by
/// `format_version`.
///
/// The output is exactly what [`uncompress_block_contents_for_type`]
/// consumes. [`CompressionType::None`] is rejected (there is nothing to
/// do), and XPRESS is reported as unsupported.
pub fn compress_block_contents(
    data: &[u8],
    ty: CompressionType,
    format_version: u32,
    compression_dict: &[u8],
) -> Result<Vec<u8>, Status> {
    match ty {
        CompressionType::None => {
            Err(Status::invalid_argument("nothing to compress for kNoCompression"))
        }
        CompressionType::Snappy => Ok(snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| Status::io_error(e.to_string()))?),
        CompressionType::Zlib => {
            let body = deflate_raw(data, compression_dict)
                .ok_or_else(|| Status::io_error("deflate failed"))?;
            Ok(frame_with_size(
                &body,
                data.len(),
                compress_format_for_version(ty, format_version),
            ))
        }
        CompressionType::BZip2 => {
            let mut body = Vec::new();
            bzip2::read::BzEncoder::new(data, bzip2::Compression::default())
                .read_to_end(&mut body)
                .map_err(|e| Status::io_error(e.to_string()))?;
            Ok(frame_with_size(
                &body,
                data.len(),
                compress_format_for_version(ty, format_version),
            ))
        }
        CompressionType::Lz4 | CompressionType::Lz4hc => {
            let body = if compression_dict.is_empty() {
                lz4_flex::block::compress(data)
            } else {
                lz4_flex::block::compress_with_dict(data, compression_dict)
            };
            if compress_format_for_version(ty, format_version) == 2 {
                Ok(frame_with_size(&body, data.len(), 2))
            } else {
                let mut out = Vec::with_capacity(8 + body.len());
                out.extend_from_slice(&(data.len() as u32).to_le_bytes());
                out.extend_from_slice(&[0u8; 4]);
                out.extend_from_slice(&body);
                Ok(out)
            }
        }
        CompressionType::Xpress => Err(Status::not_supported("XPRESS compression not compiled in")),
        CompressionType::Zstd | CompressionType::ZstdNotFinal => {
            let body = if compression_dict.is_empty() {
                zstd::bulk::compress(data, 0)
            } else {
                zstd::bulk::Compressor::with_dictionary(0, compression_dict)
                    .and_then(|mut c| c.compress(data))
            }
            .map_err(|e| Status::io_error(e.to_string()))?;
            // ZSTD framing always carries the size prefix.
            Ok(frame_with_size(&body, data.len(), 2))
        }
    }
}

fn frame_with_size(body: &[u8], uncompressed_len: usize, fmt: u32) -> Vec<u8> {
    if fmt == 2 {
        let mut out = Vec::with_capacity(body.len() + 5);
        crate::encoding::put_varint32(&mut out, uncompressed_len as u32);
        out.extend_from_slice(body);
        out
    } else {
        body.to_vec()
    }
}

/// Raw-deflate with optional preset dictionary.
fn deflate_raw(input: &[u8], dict: &[u8]) -> Option<Vec<u8>> {
    use flate2::{Compress, Compression, FlushCompress};

    let mut deflater = Compress::new(Compression::default(), false);
    if !dict.is_empty() {
        deflater.set_dictionary(dict).ok()?;
    }

    let mut out = Vec::with_capacity((input.len() / 2).max(64));
    loop {
        let consumed = deflater.total_in() as usize;
        if consumed > input.len() {
            return None;
        }
        let status = deflater
            .compress_vec(&input[consumed..], &mut out, FlushCompress::Finish)
            .ok()?;
        match status {
            flate2::Status::StreamEnd => return Some(out),
            flate2::Status::Ok | flate2::Status::BufError => {
                if out.len() == out.capacity() {
                    out.reserve(out.capacity().max(64));
                }
            }
        }
    }
}
