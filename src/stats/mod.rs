//! Environment and Statistics Sinks
//!
//! Optional observability wiring for the read pipeline. Nothing here is
//! required for correctness: with no [`Env`] or no [`Statistics`] configured
//! the pipeline performs zero timing work.
//!
//! Detailed decompression timing is deliberately expensive to enable: it is
//! recorded only when **both** an environment (clock) and a statistics sink
//! are wired **and** the sink's level is above
//! [`StatsLevel::ExceptDetailedTimers`] — see
//! [`should_report_detailed_time`].

use std::time::Instant;

// ------------------------------------------------------------------------------------------------
// Env
// ------------------------------------------------------------------------------------------------

/// Clock source for detailed timing.
pub trait Env: Send + Sync {
    /// Monotonic nanosecond timestamp.
    fn now_nanos(&self) -> u64;
}

/// The process-default clock, backed by [`std::time::Instant`].
#[derive(Debug)]
pub struct SystemEnv {
    origin: Instant,
}

impl SystemEnv {
    /// Create a clock anchored at construction time.
    pub fn new() -> Self {
        SystemEnv {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Env for SystemEnv {
    fn now_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

// ------------------------------------------------------------------------------------------------
// Statistics
// ------------------------------------------------------------------------------------------------

/// How much a statistics sink wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatsLevel {
    /// Everything except per-operation timer metrics.
    ExceptDetailedTimers,
    /// All metrics, including detailed timers.
    All,
}

/// Monotonically increasing event counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ticker {
    /// Number of blocks decompressed.
    BlocksDecompressed,
}

/// Value-distribution metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Histogram {
    /// Nanoseconds spent in a single block decompression.
    DecompressionTimeNanos,
    /// Uncompressed bytes produced by a single block decompression.
    BytesDecompressed,
}

/// A user-supplied metrics sink.
pub trait Statistics: Send + Sync {
    /// Reporting level of this sink.
    fn level(&self) -> StatsLevel;

    /// Record one observation of a histogram metric.
    fn measure_time(&self, histogram: Histogram, value: u64);

    /// Increment a ticker.
    fn record_tick(&self, ticker: Ticker, count: u64);
}

/// Whether detailed (per-operation) timing should be measured and reported.
pub fn should_report_detailed_time(
    env: Option<&dyn Env>,
    statistics: Option<&dyn Statistics>,
) -> bool {
    match (env, statistics) {
        (Some(_), Some(stats)) => stats.level() > StatsLevel::ExceptDetailedTimers,
        _ => false,
    }
}
