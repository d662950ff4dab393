//! Metrics hooks for the shipper.
//!
//! The shipper reports what it does through an injected [`MetricsSink`]
//! instead of process-wide counters. Hosts that export Prometheus or StatsD
//! metrics implement the trait; everyone else gets [`NoopMetrics`], or
//! [`ShipperStats`] when plain counters are enough.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Why an entry never reached the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The cache was full and the overflow policy rejected the entry.
    QueueFull,
    /// The cache stayed full for the whole overflow timeout.
    Timeout,
    /// The handler was closed before the entry was accepted.
    Closed,
    /// The entry could not be serialised.
    Serialisation,
    /// The batch carrying the entry failed after the retry.
    WriteFailed,
}

/// Receiver for shipper events. Every hook defaults to a no-op.
pub trait MetricsSink: Send + Sync {
    /// A record passed the severity floor and was offered to the cache.
    fn record_submitted(&self) {}
    /// A record was below the severity floor.
    fn record_filtered(&self) {}
    /// `count` entries were lost for `reason`.
    fn record_dropped(&self, _reason: DropReason, _count: u64) {}
    /// A batch of `entries` entries totalling `bytes` bytes was written.
    fn record_flush(&self, _entries: usize, _bytes: usize) {}
    /// A write failed (before or after the reconnect).
    fn record_write_failure(&self) {}
    /// A connection was (re-)established.
    fn record_connect(&self) {}
}

/// Sink that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// Plain atomic counters implementing [`MetricsSink`].
#[derive(Debug, Default)]
pub struct ShipperStats {
    submitted: AtomicU64,
    filtered: AtomicU64,
    dropped_queue_full: AtomicU64,
    dropped_timeout: AtomicU64,
    dropped_closed: AtomicU64,
    dropped_serialisation: AtomicU64,
    dropped_write_failed: AtomicU64,
    flushes: AtomicU64,
    flushed_entries: AtomicU64,
    flushed_bytes: AtomicU64,
    write_failures: AtomicU64,
    connects: AtomicU64,
}

/// Point-in-time copy of [`ShipperStats`], serialisable for status endpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub filtered: u64,
    pub dropped_queue_full: u64,
    pub dropped_timeout: u64,
    pub dropped_closed: u64,
    pub dropped_serialisation: u64,
    pub dropped_write_failed: u64,
    pub flushes: u64,
    pub flushed_entries: u64,
    pub flushed_bytes: u64,
    pub write_failures: u64,
    pub connects: u64,
}

impl StatsSnapshot {
    pub fn dropped(&self) -> u64 {
        self.dropped_queue_full
            + self.dropped_timeout
            + self.dropped_closed
            + self.dropped_serialisation
            + self.dropped_write_failed
    }
}

impl ShipperStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            submitted: load(&self.submitted),
            filtered: load(&self.filtered),
            dropped_queue_full: load(&self.dropped_queue_full),
            dropped_timeout: load(&self.dropped_timeout),
            dropped_closed: load(&self.dropped_closed),
            dropped_serialisation: load(&self.dropped_serialisation),
            dropped_write_failed: load(&self.dropped_write_failed),
            flushes: load(&self.flushes),
            flushed_entries: load(&self.flushed_entries),
            flushed_bytes: load(&self.flushed_bytes),
            write_failures: load(&self.write_failures),
            connects: load(&self.connects),
        }
    }
}

impl MetricsSink for ShipperStats {
    fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped(&self, reason: DropReason, count: u64) {
        let counter = match reason {
            DropReason::QueueFull => &self.dropped_queue_full,
            DropReason::Timeout => &self.dropped_timeout,
            DropReason::Closed => &self.dropped_closed,
            DropReason::Serialisation => &self.dropped_serialisation,
            DropReason::WriteFailed => &self.dropped_write_failed,
        };
        counter.fetch_add(count, Ordering::Relaxed);
    }

    fn record_flush(&self, entries: usize, bytes: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flushed_entries
            .fetch_add(entries as u64, Ordering::Relaxed);
        self.flushed_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }
}
