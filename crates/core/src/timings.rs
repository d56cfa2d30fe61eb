//! Lightweight timing handles used to measure plugin event handlers

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Calls slower than this are reported at warn level
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(50);

/// Accumulates call count and duration statistics for a single named section
#[derive(Debug)]
pub struct TimingsHandler {
    name: String,
    count: AtomicU64,
    total_nanos: AtomicU64,
    peak_nanos: AtomicU64,
    slow_threshold: Duration,
}

impl TimingsHandler {
    /// Create a new timings handler with the default slow threshold
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_threshold(name, DEFAULT_SLOW_THRESHOLD)
    }

    /// Create a new timings handler with a custom slow threshold
    pub fn with_threshold(name: impl Into<String>, slow_threshold: Duration) -> Self {
        Self {
            name: name.into(),
            count: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            peak_nanos: AtomicU64::new(0),
            slow_threshold,
        }
    }

    /// Name of the timed section
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `f`, recording how long it took
    pub fn time<R>(&self, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = f();
        self.record(start.elapsed());
        result
    }

    /// Record a single measurement
    pub fn record(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);

        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.peak_nanos.fetch_max(nanos, Ordering::Relaxed);

        if elapsed > self.slow_threshold {
            tracing::warn!("Slow operation detected: {} took {:?}", self.name, elapsed);
        }
    }

    /// Clear all recorded measurements
    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.total_nanos.store(0, Ordering::Relaxed);
        self.peak_nanos.store(0, Ordering::Relaxed);
    }

    /// Take a consistent-enough copy of the current statistics
    pub fn snapshot(&self) -> TimingsSnapshot {
        TimingsSnapshot {
            name: self.name.clone(),
            count: self.count.load(Ordering::Relaxed),
            total: Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed)),
            peak: Duration::from_nanos(self.peak_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of a [`TimingsHandler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingsSnapshot {
    pub name: String,
    pub count: u64,
    pub total: Duration,
    pub peak: Duration,
}

impl TimingsSnapshot {
    /// Average duration per call, zero if never called
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }

        self.total / u32::try_from(self.count).unwrap_or(u32::MAX)
    }
}
