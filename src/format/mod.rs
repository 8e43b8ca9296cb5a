//! Table Format Module
//!
//! On-disk layout types for block-based sorted-string-table files: the
//! [`BlockHandle`] block locator, the versioned [`Footer`] trailer, and the
//! [`BlockContents`] value produced by the read pipeline.
//!
//! ## Design Overview
//!
//! An SSTable file ends with a fixed-layout footer, terminated by an 8-byte
//! magic number. The footer carries the handles of the metaindex and index
//! blocks; every other block in the file is reached by following handles.
//! Each block is followed by a 5-byte trailer (compression-type byte plus a
//! fixed32 checksum) that is **not** covered by the handle's `size`.
//!
//! # On-disk layout
//!
//! ```text
//! legacy footer (48 bytes):
//!   metaindex_handle (varint64 offset, varint64 size)
//!   index_handle     (varint64 offset, varint64 size)
//!   <zero padding to 40 bytes>
//!   magic_lo (fixed32)  magic_hi (fixed32)
//!
//! current footer (53 bytes):
//!   checksum_type    (1 byte)
//!   metaindex_handle (varint64 offset, varint64 size)
//!   index_handle     (varint64 offset, varint64 size)
//!   <zero padding to 41 bytes>
//!   format_version   (fixed32)
//!   magic_lo (fixed32)  magic_hi (fixed32)
//! ```
//!
//! The two shapes are discriminated by the magic number alone: files written
//! by pre-versioning builds carry a *legacy* magic and are silently
//! upconverted on decode (`format_version = 0`, checksum CRC32C).
//!
//! # Guarantees
//!
//! - `decode(encode(h)) == h` for every initialized [`BlockHandle`].
//! - `decode(encode(f)) == f` for every current-format [`Footer`].
//! - Wire constants are frozen; they are part of the file format.


use std::fmt;

use crate::checksum::ChecksumType;
use crate::compression::CompressionType;
use crate::encoding::{
    decode_fixed32, get_varint32, get_varint64, put_fixed32, put_varint64_varint64,
    MAX_VARINT64_LENGTH,
};
use crate::status::Status;

// ------------------------------------------------------------------------------------------------
// Wire constants
// ------------------------------------------------------------------------------------------------

/// Length of the magic number at the very end of the file.
pub const MAGIC_NUMBER_LENGTH: usize = 8;

/// Bytes appended to every block: 1-byte compression type + fixed32 checksum.
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Magic number of current block-based table files.
pub const BLOCK_BASED_TABLE_MAGIC_NUMBER: u64 = 0x88e2_41b7_85f4_cff7;

/// Magic number of pre-versioning block-based table files.
pub const LEGACY_BLOCK_BASED_TABLE_MAGIC_NUMBER: u64 = 0xdb47_7524_8b80_fb57;

/// Magic number of current plain-table files (recognized, not read here).
pub const PLAIN_TABLE_MAGIC_NUMBER: u64 = 0x8242_2296_63bf_9564;

/// Magic number of pre-versioning plain-table files.
pub const LEGACY_PLAIN_TABLE_MAGIC_NUMBER: u64 = 0x4f34_18eb_7a8f_13b8;

fn is_legacy_footer_format(magic: u64) -> bool {
    magic == LEGACY_BLOCK_BASED_TABLE_MAGIC_NUMBER || magic == LEGACY_PLAIN_TABLE_MAGIC_NUMBER
}

fn upconvert_legacy_footer_format(magic: u64) -> u64 {
    match magic {
        LEGACY_BLOCK_BASED_TABLE_MAGIC_NUMBER => BLOCK_BASED_TABLE_MAGIC_NUMBER,
        LEGACY_PLAIN_TABLE_MAGIC_NUMBER => PLAIN_TABLE_MAGIC_NUMBER,
        other => other,
    }
}

// ------------------------------------------------------------------------------------------------
// BlockHandle
// ------------------------------------------------------------------------------------------------

/// Locator of a block within a table file: byte offset plus payload size.
///
/// The `size` excludes the 5-byte block trailer; readers request
/// `size + BLOCK_TRAILER_SIZE` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    offset: u64,
    size: u64,
}

impl BlockHandle {
    /// Maximum encoded length of a handle: two maximal varint64 values.
    pub const MAX_ENCODED_LENGTH: usize = 2 * MAX_VARINT64_LENGTH;

    /// The null handle, used where "no block" must be representable.
    pub const NULL: BlockHandle = BlockHandle { offset: 0, size: 0 };

    /// Create a handle for a block at `offset` spanning `size` payload bytes.
    pub fn new(offset: u64, size: u64) -> BlockHandle {
        BlockHandle { offset, size }
    }

    /// Byte offset of the block within the file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Payload size in bytes, excluding the block trailer.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Append the varint64 pair `(offset, size)` to `dst`.
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        // Uninitialized handles (the all-ones sentinel) must never reach
        // the encoder.
        debug_assert_ne!(self.offset, u64::MAX);
        debug_assert_ne!(self.size, u64::MAX);
        put_varint64_varint64(dst, self.offset, self.size);
    }

    /// Decode a handle from the front of `input`, advancing the cursor past
    /// the consumed bytes.
    pub fn decode_from(input: &mut &[u8]) -> Result<BlockHandle, Status> {
        match (get_varint64(input), get_varint64(input)) {
            (Some(offset), Some(size)) => Ok(BlockHandle { offset, size }),
            _ => Err(Status::corruption("bad block handle")),
        }
    }

    /// Hex rendering of the encoded form, for diagnostics.
    pub fn to_hex_string(&self) -> String {
        let mut encoded = Vec::with_capacity(Self::MAX_ENCODED_LENGTH);
        self.encode_to(&mut encoded);
        encoded.iter().map(|b| format!("{b:02X}")).collect()
    }
}

/// The all-ones "uninitialized" sentinel.
impl Default for BlockHandle {
    fn default() -> Self {
        BlockHandle {
            offset: u64::MAX,
            size: u64::MAX,
        }
    }
}

impl fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.offset, self.size)
    }
}

// ------------------------------------------------------------------------------------------------
// Footer
// ------------------------------------------------------------------------------------------------

/// Versioned trailer at the end of every table file.
///
/// Constructed either by the write path ([`Footer::new`]) or by decoding the
/// tail of a file ([`Footer::decode_from`]); immutable after decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    table_magic_number: u64,
    format_version: u32,
    checksum: ChecksumType,
    metaindex_handle: BlockHandle,
    index_handle: BlockHandle,
}

impl Footer {
    /// Encoded length of the legacy footer shape.
    pub const VERSION0_ENCODED_LENGTH: usize =
        2 * BlockHandle::MAX_ENCODED_LENGTH + MAGIC_NUMBER_LENGTH;

    /// Encoded length of the current footer shape.
    pub const NEW_VERSIONS_ENCODED_LENGTH: usize =
        1 + 2 * BlockHandle::MAX_ENCODED_LENGTH + 4 + MAGIC_NUMBER_LENGTH;

    /// Shortest possible footer (the legacy shape).
    pub const MIN_ENCODED_LENGTH: usize = Self::VERSION0_ENCODED_LENGTH;

    /// Longest possible footer (the current shape).
    pub const MAX_ENCODED_LENGTH: usize = Self::NEW_VERSIONS_ENCODED_LENGTH;

    /// Write-path constructor.
    ///
    /// A legacy magic number forces `format_version == 0`; the checksum
    /// defaults to CRC32C and may be overridden with [`Footer::set_checksum`]
    /// for non-legacy footers.
    pub fn new(table_magic_number: u64, format_version: u32) -> Footer {
        debug_assert!(!is_legacy_footer_format(table_magic_number) || format_version == 0);
        Footer {
            table_magic_number,
            format_version,
            checksum: ChecksumType::Crc32c,
            metaindex_handle: BlockHandle::default(),
            index_handle: BlockHandle::default(),
        }
    }

    /// The table magic number (legacy magics are upconverted on decode).
    pub fn table_magic_number(&self) -> u64 {
        self.table_magic_number
    }

    /// Format version; 0 denotes the legacy layout.
    pub fn version(&self) -> u32 {
        self.format_version
    }

    /// Checksum algorithm used by every block trailer in this file.
    pub fn checksum(&self) -> ChecksumType {
        self.checksum
    }

    /// Handle of the metaindex block.
    pub fn metaindex_handle(&self) -> BlockHandle {
        self.metaindex_handle
    }

    /// Handle of the index block.
    pub fn index_handle(&self) -> BlockHandle {
        self.index_handle
    }

    /// Select the block-trailer checksum algorithm (non-legacy files only).
    pub fn set_checksum(&mut self, ty: ChecksumType) {
        self.checksum = ty;
    }

    /// Point the footer at the metaindex block.
    pub fn set_metaindex_handle(&mut self, handle: BlockHandle) {
        self.metaindex_handle = handle;
    }

    /// Point the footer at the index block.
    pub fn set_index_handle(&mut self, handle: BlockHandle) {
        self.index_handle = handle;
    }

    /// Append the encoded footer to `dst` in the shape selected by the
    /// magic number (legacy vs current).
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        let original_size = dst.len();
        if is_legacy_footer_format(self.table_magic_number) {
            // The legacy shape has no checksum field; only CRC32C files can
            // be written in it.
            debug_assert_eq!(self.checksum, ChecksumType::Crc32c);
            self.metaindex_handle.encode_to(dst);
            self.index_handle.encode_to(dst);
            dst.resize(original_size + 2 * BlockHandle::MAX_ENCODED_LENGTH, 0);
            put_fixed32(dst, (self.table_magic_number & 0xffff_ffff) as u32);
            put_fixed32(dst, (self.table_magic_number >> 32) as u32);
            debug_assert_eq!(dst.len(), original_size + Self::VERSION0_ENCODED_LENGTH);
        } else {
            dst.push(self.checksum.as_u8());
            self.metaindex_handle.encode_to(dst);
            self.index_handle.encode_to(dst);
            dst.resize(original_size + Self::NEW_VERSIONS_ENCODED_LENGTH - 12, 0);
            put_fixed32(dst, self.format_version);
            put_fixed32(dst, (self.table_magic_number & 0xffff_ffff) as u32);
            put_fixed32(dst, (self.table_magic_number >> 32) as u32);
            debug_assert_eq!(dst.len(), original_size + Self::NEW_VERSIONS_ENCODED_LENGTH);
        }
    }

    /// Decode a footer from the tail of `input`.
    ///
    /// `input` must hold *at least* the footer (it may be longer; only the
    /// tail is examined). On success the cursor is advanced past the entire
    /// footer, i.e. to the end of the input.
    pub fn decode_from(input: &mut &[u8]) -> Result<Footer, Status> {
        let buf = *input;
        if buf.len() < Self::MIN_ENCODED_LENGTH {
            return Err(Status::corruption("file is too short to be an sstable"));
        }

        let magic_region = &buf[buf.len() - MAGIC_NUMBER_LENGTH..];
        let magic_lo = decode_fixed32(magic_region)
            .ok_or_else(|| Status::corruption("file is too short to be an sstable"))?;
        let magic_hi = decode_fixed32(&magic_region[4..])
            .ok_or_else(|| Status::corruption("file is too short to be an sstable"))?;
        let mut magic = (u64::from(magic_hi) << 32) | u64::from(magic_lo);

        let legacy = is_legacy_footer_format(magic);
        if legacy {
            magic = upconvert_legacy_footer_format(magic);
        }

        let (format_version, checksum, mut cursor) = if legacy {
            let window = &buf[buf.len() - Self::VERSION0_ENCODED_LENGTH..];
            (0, ChecksumType::Crc32c, window)
        } else {
            let version_region = &buf[buf.len() - MAGIC_NUMBER_LENGTH - 4..];
            let format_version = decode_fixed32(version_region)
                .ok_or_else(|| Status::corruption("input is too short to be an sstable"))?;
            if buf.len() < Self::NEW_VERSIONS_ENCODED_LENGTH {
                return Err(Status::corruption("input is too short to be an sstable"));
            }
            let mut window = &buf[buf.len() - Self::NEW_VERSIONS_ENCODED_LENGTH..];
            let tag = get_varint32(&mut window)
                .ok_or_else(|| Status::corruption("bad checksum type"))?;
            let checksum = u8::try_from(tag)
                .ok()
                .and_then(ChecksumType::from_u8)
                .ok_or_else(|| Status::corruption("bad checksum type"))?;
            (format_version, checksum, window)
        };

        let metaindex_handle = BlockHandle::decode_from(&mut cursor)?;
        let index_handle = BlockHandle::decode_from(&mut cursor)?;
        // Whatever remains before the version/magic region is padding.

        *input = &buf[buf.len()..];

        Ok(Footer {
            table_magic_number: magic,
            format_version,
            checksum,
            metaindex_handle,
            index_handle,
        })
    }
}

impl fmt::Display for Footer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if is_legacy_footer_format(self.table_magic_number) {
            write!(
                f,
                "metaindex handle: {}  index handle: {}  table_magic_number: {}",
                self.metaindex_handle, self.index_handle, self.table_magic_number
            )
        } else {
            write!(
                f,
                "checksum: {:?}  metaindex handle: {}  index handle: {}  \
                 footer version: {}  table_magic_number: {}",
                self.checksum,
                self.metaindex_handle,
                self.index_handle,
                self.format_version,
                self.table_magic_number
            )
        }
    }
}

// ------------------------------------------------------------------------------------------------
// BlockContents
// ------------------------------------------------------------------------------------------------

/// The payload of one block, as delivered to the caller of the read
/// pipeline.
///
/// After a successful read with decompression the payload is raw block
/// bytes and `compression_type` is [`CompressionType::None`]. `cachable`
/// is `false` when the bytes were surrendered by a reader-internal buffer
/// and must not be inserted into block caches.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BlockContents {
    /// Block payload, without the trailer.
    pub data: Vec<u8>,
    /// Whether the contents may be inserted into caches.
    pub cachable: bool,
    /// Compression state of `data`.
    pub compression_type: CompressionType,
}

impl BlockContents {
    /// Contents owned by the pipeline, eligible for caching.
    pub fn new(data: Vec<u8>, cachable: bool, compression_type: CompressionType) -> Self {
        BlockContents {
            data,
            cachable,
            compression_type,
        }
    }
}
