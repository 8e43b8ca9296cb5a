//! # lapistable
//!
//! The read pipeline for **block-based sorted-string-table (SSTable)**
//! files: footer location and decoding, checksummed block reads,
//! persistent-cache read-through, and block decompression. One code path
//! serves both a synchronous blocking mode and a cooperative asynchronous
//! mode that hands off via an I/O-completion callback.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                  read_block_contents                       │
//! │                                                            │
//! │  ┌─────────────────┐   miss   ┌─────────────────────────┐  │
//! │  │ persistent cache├─────────►│ block read              │  │
//! │  │ (uncompressed / │          │  RandomReadContext      │  │
//! │  │  raw pages)     │          │  └─ FileReader.read     │  │
//! │  └───────┬─────────┘          │  trailer checksum       │  │
//! │          │ hit                └───────────┬─────────────┘  │
//! │          │                                │                │
//! │          ▼                                ▼                │
//! │   BlockContents ◄── decompress ◄── raw cache insert        │
//! │                       (codec dispatch by trailer byte)     │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The footer pipeline sits in front: it reads the last bytes of the file,
//! decodes the versioned trailer (silently upconverting legacy files), and
//! hands the block handles and checksum type to everything above.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`read`] | Footer / block / block-contents pipelines, sync + async |
//! | [`format`] | `BlockHandle`, `Footer`, `BlockContents`, wire constants |
//! | [`encoding`] | Fixed-width and varint codec primitives |
//! | [`checksum`] | Masked CRC32C and xxHash32 trailer verification |
//! | [`compression`] | Codec dispatch: Snappy, Zlib, BZip2, LZ4, LZ4HC, ZSTD |
//! | [`file`] | `RandomAccessFileReader` trait, fs- and mmap-backed readers |
//! | [`cache`] | Persistent (flash-tier) cache trait and helpers |
//! | [`options`] | Per-read and table-lifetime option bundles |
//! | [`stats`] | Clock and statistics sinks for detailed timing |
//! | [`perf`] | Thread-local read-path perf counters |
//! | [`status`] | Status taxonomy and the inline-vs-pending submission type |
//!
//! ## Key Features
//!
//! - **Bit-exact format parsing** — varint block handles, two footer
//!   shapes discriminated by magic number, legacy files upconverted
//!   transparently.
//! - **Checksum verification** — masked CRC32C or xxHash32 over every
//!   block and its compression-type byte.
//! - **Multi-tier lookup** — persistent cache (uncompressed or raw pages)
//!   consulted before the file; cache failures degrade, never corrupt.
//! - **One completion path, two modes** — every pipeline runs blocking or
//!   via completion callback; pending submissions own their in-flight
//!   state and deliver exactly one async-flagged completion.
//! - **Format-versioned decompression** — per-codec framing differences
//!   between table format versions are handled inside the codec layer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lapistable::cache::PersistentCacheOptions;
//! use lapistable::file::FsFileReader;
//! use lapistable::format::BLOCK_BASED_TABLE_MAGIC_NUMBER;
//! use lapistable::options::{ImmutableOptions, ReadOptions};
//! use lapistable::read::{read_block_contents, read_footer_from_file};
//!
//! let file = FsFileReader::open("/data/tables/000042.sst").unwrap();
//! let file_size = file.file_size().unwrap();
//!
//! // Decode the trailer, enforcing the block-based magic number.
//! let footer =
//!     read_footer_from_file(&file, file_size, BLOCK_BASED_TABLE_MAGIC_NUMBER).unwrap();
//!
//! // Read the index block: verified, decompressed, cache-aware.
//! let contents = read_block_contents(
//!     &file,
//!     &footer,
//!     &ReadOptions::default(),
//!     &footer.index_handle(),
//!     &ImmutableOptions::default(),
//!     true,
//!     &[],
//!     &PersistentCacheOptions::default(),
//! )
//! .unwrap();
//! assert!(!contents.data.is_empty());
//! ```

pub mod cache;
pub mod checksum;
pub mod compression;
pub mod encoding;
pub mod file;
pub mod format;
pub mod options;
pub mod perf;
pub mod read;
pub mod stats;
pub mod status;
