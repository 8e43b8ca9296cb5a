//! Persistent Cache Module
//!
//! A persistent cache is an external byte-addressable store (typically
//! flash) consulted before the table file itself. The read pipeline issues
//! read-through and write-through operations against it and never holds
//! locks of its own; the cache provides its own synchronization.
//!
//! ## Two operating modes
//!
//! A cache instance is either **compressed** or **uncompressed**, reported
//! by [`PersistentCache::is_compressed`]:
//!
//! - *Uncompressed* caches store final block payloads. A hit short-circuits
//!   the entire pipeline — no file I/O, no checksum, no decompression.
//! - *Compressed* (raw) caches store the exact on-disk page: payload plus
//!   the 5-byte trailer. A hit skips the file read but still flows through
//!   decompression.
//!
//! Pages are keyed by [`BlockHandle`]; within one file a handle uniquely
//! names a block.
//!
//! ## Error policy
//!
//! `NotFound` is the ordinary miss signal. Any other cache error is logged
//! by the pipeline and treated as a miss — a broken cache degrades
//! performance, never correctness.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::compression::CompressionType;
use crate::format::{BlockContents, BlockHandle};
use crate::status::Status;

// ------------------------------------------------------------------------------------------------
// Trait and options
// ------------------------------------------------------------------------------------------------

/// An external page cache consulted before the table file.
pub trait PersistentCache: Send + Sync {
    /// Whether this cache stores raw (compressed, trailer-included) pages.
    fn is_compressed(&self) -> bool;

    /// Fetch the page stored under `key`, or `NotFound`.
    fn lookup(&self, key: &BlockHandle) -> Result<Vec<u8>, Status>;

    /// Store `data` under `key`.
    fn insert(&self, key: &BlockHandle, data: &[u8]) -> Result<(), Status>;
}

/// Cache wiring carried through the read pipeline.
#[derive(Clone, Default)]
pub struct PersistentCacheOptions {
    /// The configured cache, if any.
    pub persistent_cache: Option<Arc<dyn PersistentCache>>,
}

impl PersistentCacheOptions {
    /// Wire up a cache.
    pub fn new(cache: Arc<dyn PersistentCache>) -> Self {
        PersistentCacheOptions {
            persistent_cache: Some(cache),
        }
    }
}

impl std::fmt::Debug for PersistentCacheOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentCacheOptions")
            .field("persistent_cache", &self.persistent_cache.is_some())
            .finish()
    }
}

// ------------------------------------------------------------------------------------------------
// Page helpers
// ------------------------------------------------------------------------------------------------

/// Fetch a final (uncompressed-mode) page and wrap it as cachable contents.
pub fn lookup_uncompressed_page(
    cache: &dyn PersistentCache,
    handle: &BlockHandle,
) -> Result<BlockContents, Status> {
    let data = cache.lookup(handle)?;
    Ok(BlockContents::new(data, true, CompressionType::None))
}

/// Store final block contents in an uncompressed-mode cache.
pub fn insert_uncompressed_page(
    cache: &dyn PersistentCache,
    handle: &BlockHandle,
    contents: &BlockContents,
) -> Result<(), Status> {
    cache.insert(handle, &contents.data)
}

/// Fetch a raw page (payload plus trailer) and require its exact size.
pub fn lookup_raw_page(
    cache: &dyn PersistentCache,
    handle: &BlockHandle,
    expected_len: usize,
) -> Result<Vec<u8>, Status> {
    let data = cache.lookup(handle)?;
    if data.len() != expected_len {
        return Err(Status::corruption("persistent cache raw page size mismatch"));
    }
    Ok(data)
}

/// Store a raw page (payload plus trailer) in a compressed-mode cache.
pub fn insert_raw_page(
    cache: &dyn PersistentCache,
    handle: &BlockHandle,
    data: &[u8],
) -> Result<(), Status> {
    cache.insert(handle, data)
}

// ------------------------------------------------------------------------------------------------
// In-memory implementation
// ------------------------------------------------------------------------------------------------

/// A mutex-guarded in-memory [`PersistentCache`].
///
/// Used by the test suite and by embedders that want cache semantics
/// without a flash tier. Hit/miss/insert counters are exposed for
/// observability and assertions.
pub struct MemoryPersistentCache {
    pages: Mutex<HashMap<(u64, u64), Vec<u8>>>,
    compressed: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
}

impl MemoryPersistentCache {
    /// A cache storing raw (compressed) pages.
    pub fn new_compressed() -> Self {
        Self::new(true)
    }

    /// A cache storing final (uncompressed) pages.
    pub fn new_uncompressed() -> Self {
        Self::new(false)
    }

    fn new(compressed: bool) -> Self {
        MemoryPersistentCache {
            pages: Mutex::new(HashMap::new()),
            compressed,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
        }
    }

    /// Number of successful lookups.
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of missed lookups.
    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of pages stored.
    pub fn insert_count(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Number of distinct pages currently held.
    pub fn len(&self) -> usize {
        self.pages.lock().map(|pages| pages.len()).unwrap_or(0)
    }

    /// Whether the cache holds no pages.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PersistentCache for MemoryPersistentCache {
    fn is_compressed(&self) -> bool {
        self.compressed
    }

    fn lookup(&self, key: &BlockHandle) -> Result<Vec<u8>, Status> {
        let pages = self
            .pages
            .lock()
            .map_err(|_| Status::io_error("persistent cache mutex poisoned"))?;
        match pages.get(&(key.offset(), key.size())) {
            Some(page) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(page.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(Status::not_found())
            }
        }
    }

    fn insert(&self, key: &BlockHandle, data: &[u8]) -> Result<(), Status> {
        let mut pages = self
            .pages
            .lock()
            .map_err(|_| Status::io_error("persistent cache mutex poisoned"))?;
        pages.insert((key.offset(), key.size()), data.to_vec());
        self.inserts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
