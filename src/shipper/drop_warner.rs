//! Rate-limited reporting of lost entries.
//!
//! Every lost entry is counted on the metrics sink immediately; the local
//! `warn!` diagnostics are coalesced per reason so a dead downstream or a
//! saturated cache produces one summary per interval instead of one line per
//! entry.

use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::metrics::{DropReason, MetricsSink};
use crate::rate_limited_warner::RateLimitedWarner;

/// Tracks dropped entries and emits rate-limited warnings.
pub(crate) struct DropWarner {
    queue_full: RateLimitedWarner,
    timeout: RateLimitedWarner,
    closed: RateLimitedWarner,
    serialisation: RateLimitedWarner,
    write_failed: RateLimitedWarner,
    metrics: Arc<dyn MetricsSink>,
}

impl DropWarner {
    pub(crate) fn new(interval: Duration, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            queue_full: RateLimitedWarner::new(interval),
            timeout: RateLimitedWarner::new(interval),
            closed: RateLimitedWarner::new(interval),
            serialisation: RateLimitedWarner::new(interval),
            write_failed: RateLimitedWarner::new(interval),
            metrics,
        }
    }

    fn warner(&self, reason: DropReason) -> &RateLimitedWarner {
        match reason {
            DropReason::QueueFull => &self.queue_full,
            DropReason::Timeout => &self.timeout,
            DropReason::Closed => &self.closed,
            DropReason::Serialisation => &self.serialisation,
            DropReason::WriteFailed => &self.write_failed,
        }
    }

    pub(crate) fn record(&self, reason: DropReason, count: u64) {
        if count == 0 {
            return;
        }
        self.metrics.record_dropped(reason, count);
        let warner = self.warner(reason);
        warner.record_drops(count);
        warner.warn_if_due(|dropped| emit(reason, dropped));
    }

    /// Emit pending summaries regardless of the interval.
    pub(crate) fn flush(&self) {
        for reason in [
            DropReason::QueueFull,
            DropReason::Timeout,
            DropReason::Closed,
            DropReason::Serialisation,
            DropReason::WriteFailed,
        ] {
            self.warner(reason).flush(|dropped| emit(reason, dropped));
        }
    }
}

fn emit(reason: DropReason, count: u64) {
    match reason {
        DropReason::QueueFull => {
            warn!("logship: {count} log entries dropped because the cache was full");
        }
        DropReason::Timeout => {
            warn!("logship: {count} log entries dropped after waiting for cache space");
        }
        DropReason::Closed => {
            warn!("logship: {count} log entries dropped after the handler was closed");
        }
        DropReason::Serialisation => {
            warn!("logship: {count} log entries dropped because they could not be serialised");
        }
        DropReason::WriteFailed => {
            warn!("logship: {count} log entries lost in batches that failed to send");
        }
    }
}
