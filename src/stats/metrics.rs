//! Delivery counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Server-wide delivery counters, updated by every request
#[derive(Debug)]
pub struct DeliveryStats {
    started_at: Instant,
    requests: AtomicU64,
    not_found: AtomicU64,
    originals: AtomicU64,
    derived: AtomicU64,
    cache_hits: AtomicU64,
    encodes: AtomicU64,
    failures: AtomicU64,
}

impl Default for DeliveryStats {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryStats {
    /// Create new zeroed counters
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests: AtomicU64::new(0),
            not_found: AtomicU64::new(0),
            originals: AtomicU64::new(0),
            derived: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            encodes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Record an incoming HTTP request
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a 404 response
    pub fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a response that streamed the source file unchanged
    pub fn record_original(&self) {
        self.originals.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transcoded response; `cached` is false when this request encoded it
    pub fn record_derived(&self, cached: bool) {
        self.derived.fetch_add(1, Ordering::Relaxed);
        if cached {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.encodes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a 500 response
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            originals: self.originals.load(Ordering::Relaxed),
            derived: self.derived.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            encodes: self.encodes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

/// Copy of the delivery counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Requests received
    pub requests: u64,
    /// 404 responses
    pub not_found: u64,
    /// Source files served untouched
    pub originals: u64,
    /// Transcoded files served
    pub derived: u64,
    /// Transcoded files that were already cached
    pub cache_hits: u64,
    /// Transcodes performed
    pub encodes: u64,
    /// 500 responses
    pub failures: u64,
    /// Time since the counters were created
    pub uptime: Duration,
}

impl StatsSnapshot {
    /// Share of transcoded responses served from cache, 0.0 when none
    pub fn hit_ratio(&self) -> f64 {
        if self.derived > 0 {
            self.cache_hits as f64 / self.derived as f64
        } else {
            0.0
        }
    }
}
