//! Read-pipeline configuration.
//!
//! Two small option bundles, mirroring the split between per-call knobs and
//! table-lifetime wiring:
//!
//! - [`ReadOptions`] — per-read behavior (checksum verification, cache
//!   population).
//! - [`ImmutableOptions`] — environment wiring shared by every read against
//!   a table: a clock source and a statistics sink. Both are optional; a
//!   default-constructed value disables detailed timing entirely.

use std::sync::Arc;

use crate::stats::{Env, Statistics};

/// Per-read options.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Verify block-trailer checksums against the data read.
    pub verify_checksums: bool,
    /// Populate configured caches with blocks read from the file.
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            verify_checksums: true,
            fill_cache: true,
        }
    }
}

/// Table-lifetime wiring: clock and statistics sink.
#[derive(Clone, Default)]
pub struct ImmutableOptions {
    /// Monotonic clock used for detailed timing. `None` disables timing.
    pub env: Option<Arc<dyn Env>>,
    /// Statistics sink. `None` disables all metric recording.
    pub statistics: Option<Arc<dyn Statistics>>,
}

impl std::fmt::Debug for ImmutableOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImmutableOptions")
            .field("env", &self.env.is_some())
            .field("statistics", &self.statistics.is_some())
            .finish()
    }
}
