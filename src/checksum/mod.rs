//! Block Checksum Engines
//!
//! Every on-disk block is followed by a 5-byte trailer: a compression-type
//! byte and a fixed32 checksum. The checksum covers the block payload *and*
//! the compression-type byte (`data[0..n+1]` for an `n`-byte payload), so a
//! flipped type tag is caught the same way as flipped payload bytes.
//!
//! Two engines are supported, selected by the [`ChecksumType`] tag stored in
//! the table footer:
//!
//! - **CRC32C** (Castagnoli). The stored value is *masked*: the raw CRC is
//!   rotated and offset by a constant so that a stored checksum can never be
//!   mistaken for an in-band CRC computed over bytes that themselves contain
//!   checksums.
//! - **xxHash32**, seed 0, stored unmasked.
//!
//! # Guarantees
//!
//! - [`mask`] and [`unmask`] are exact inverses for every 32-bit value.
//! - [`verify_block_checksum`] fails with a `Corruption` status on any
//!   single-bit flip in the covered range, and on unknown checksum tags.

#[cfg(test)]
mod tests;

use crate::status::Status;

// ------------------------------------------------------------------------------------------------
// Checksum type tag
// ------------------------------------------------------------------------------------------------

/// Checksum algorithm tag as stored in the table footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ChecksumType {
    /// No verification. Recognized in the tag space but never written by
    /// the current format.
    NoChecksum = 0,
    /// Masked CRC32C (Castagnoli).
    #[default]
    Crc32c = 1,
    /// xxHash32 with seed 0.
    XxHash32 = 2,
}

impl ChecksumType {
    /// Decode a wire tag. Unknown tags return `None`; the caller decides
    /// whether that is a footer-level or block-level corruption.
    pub fn from_u8(tag: u8) -> Option<ChecksumType> {
        match tag {
            0 => Some(ChecksumType::NoChecksum),
            1 => Some(ChecksumType::Crc32c),
            2 => Some(ChecksumType::XxHash32),
            _ => None,
        }
    }

    /// The wire tag for this algorithm.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

// ------------------------------------------------------------------------------------------------
// CRC32C with masking
// ------------------------------------------------------------------------------------------------

const MASK_DELTA: u32 = 0xa282_ead8;

/// CRC32C (Castagnoli) of `data`.
#[inline]
pub fn value(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// Transform a raw CRC into the masked form stored on disk.
#[inline]
pub fn mask(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Recover the raw CRC from its masked stored form.
#[inline]
pub fn unmask(masked: u32) -> u32 {
    masked.wrapping_sub(MASK_DELTA).rotate_left(15)
}

// ------------------------------------------------------------------------------------------------
// xxHash32
// ------------------------------------------------------------------------------------------------

/// xxHash32 of `data` with the given seed. Block trailers always use seed 0.
#[inline]
pub fn xxhash32(data: &[u8], seed: u32) -> u32 {
    twox_hash::XxHash32::oneshot(seed, data)
}

// ------------------------------------------------------------------------------------------------
// Block-trailer verification
// ------------------------------------------------------------------------------------------------

/// Compute the checksum a block trailer should store for
/// `block_and_type` (payload followed by its compression-type byte).
///
/// For CRC32C this is the *masked* value, ready for `put_fixed32`.
pub fn compute_block_checksum(block_and_type: &[u8], ty: ChecksumType) -> u32 {
    match ty {
        ChecksumType::NoChecksum => 0,
        ChecksumType::Crc32c => mask(value(block_and_type)),
        ChecksumType::XxHash32 => xxhash32(block_and_type, 0),
    }
}

/// Verify the stored trailer checksum against `block_and_type`
/// (payload followed by its compression-type byte).
///
/// `ty` comes from the footer; `stored` is the fixed32 read from the block
/// trailer. Unknown tags fail with "unknown checksum type"; a value
/// mismatch fails with "block checksum mismatch".
pub fn verify_block_checksum(
    block_and_type: &[u8],
    stored: u32,
    ty: ChecksumType,
) -> Result<(), Status> {
    let (expected, actual) = match ty {
        ChecksumType::Crc32c => (unmask(stored), value(block_and_type)),
        ChecksumType::XxHash32 => (stored, xxhash32(block_and_type, 0)),
        ChecksumType::NoChecksum => {
            return Err(Status::corruption("unknown checksum type"));
        }
    };
    if actual != expected {
        return Err(Status::corruption("block checksum mismatch"));
    }
    Ok(())
}
