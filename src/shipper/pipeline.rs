//! Drain-encode-write path shared by the flush worker and `close`.

use std::sync::Arc;

use log::{debug, warn};

use crate::entry::encode_batch;
use crate::metrics::{DropReason, MetricsSink};

use super::cache::BoundedCache;
use super::connection::{ConnectionManager, TransportError};
use super::drop_warner::DropWarner;
use super::worker::FlushTrigger;

/// State touched by a flush. The worker thread holds this rather than the
/// owning [`super::Shipper`], so dropping the last handler still closes it.
pub(crate) struct Pipeline {
    pub(crate) cache: BoundedCache,
    pub(crate) connection: ConnectionManager,
    pub(crate) metrics: Arc<dyn MetricsSink>,
    pub(crate) drops: DropWarner,
}

impl Pipeline {
    /// Drain the cache and write its contents as one batch.
    ///
    /// Returns the number of entries written. An empty cache is a no-op and
    /// never touches the connection. A batch that still fails after the
    /// reconnect-and-retry is not requeued; its entries are counted as lost.
    pub(crate) fn flush(&self, trigger: FlushTrigger) -> Result<usize, TransportError> {
        let entries = self.cache.drain();
        if entries.is_empty() {
            return Ok(0);
        }
        let batch = encode_batch(&entries, |_, err| {
            debug!("logship: skipping entry that failed to serialise: {err}");
        });
        self.drops
            .record(DropReason::Serialisation, batch.dropped as u64);
        if batch.is_empty() {
            return Ok(0);
        }
        match self.connection.write(&batch.payload) {
            Ok(()) => {
                self.metrics.record_flush(batch.encoded, batch.payload.len());
                debug!(
                    "logship: flushed {} entries ({} bytes) on {trigger:?}",
                    batch.encoded,
                    batch.payload.len()
                );
                Ok(batch.encoded)
            }
            Err(err) => {
                if !matches!(err, TransportError::Closed) {
                    warn!(
                        "logship: dropping batch of {} entries on {trigger:?}: {err}",
                        batch.encoded
                    );
                }
                self.drops
                    .record(DropReason::WriteFailed, batch.encoded as u64);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverflowPolicy;
    use crate::entry::FlatEntry;
    use crate::log_record::Attributes;
    use crate::metrics::ShipperStats;
    use crate::shipper::connection::ConnectPolicy;
    use crate::test_utils::{MemoryDialer, WriteOutcome};
    use rstest::{fixture, rstest};
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        dialer: MemoryDialer,
        stats: Arc<ShipperStats>,
        pipeline: Pipeline,
    }

    #[fixture]
    fn harness() -> Harness {
        let dialer = MemoryDialer::new();
        let stats = Arc::new(ShipperStats::new());
        let metrics: Arc<dyn MetricsSink> = stats.clone();
        let policy = ConnectPolicy {
            connect_timeout: Duration::from_millis(10),
            write_timeout: Duration::from_millis(10),
            reconnect_interval: Duration::from_millis(1),
            max_retry: 1,
        };
        let pipeline = Pipeline {
            cache: BoundedCache::new(10),
            connection: ConnectionManager::new(
                Arc::new(dialer.clone()),
                policy,
                Arc::clone(&metrics),
            ),
            drops: DropWarner::new(Duration::from_secs(60), Arc::clone(&metrics)),
            metrics,
        };
        Harness {
            dialer,
            stats,
            pipeline,
        }
    }

    fn push(pipeline: &Pipeline, message: &str) {
        let mut fields = Attributes::new();
        fields.insert("message".into(), json!(message));
        pipeline
            .cache
            .push(FlatEntry::from(fields), OverflowPolicy::Drop, || {})
            .expect("cache has room");
    }

    #[rstest]
    fn empty_cache_flush_is_a_no_op(harness: Harness) {
        assert_eq!(harness.pipeline.flush(FlushTrigger::Timer).unwrap(), 0);
        assert_eq!(harness.dialer.dial_count(), 0);
        assert_eq!(harness.stats.snapshot().flushes, 0);
    }

    #[rstest]
    fn batch_is_written_in_one_call(harness: Harness) {
        push(&harness.pipeline, "a");
        push(&harness.pipeline, "b");
        assert_eq!(harness.pipeline.flush(FlushTrigger::BatchSize).unwrap(), 2);
        let batches = harness.dialer.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            String::from_utf8(batches[0].clone()).unwrap(),
            "{\"message\":\"a\"}\n{\"message\":\"b\"}\n"
        );
        let snap = harness.stats.snapshot();
        assert_eq!(snap.flushed_entries, 2);
        assert_eq!(snap.flushed_bytes, batches[0].len() as u64);
        assert!(harness.pipeline.cache.is_empty());
    }

    #[rstest]
    fn failed_batch_is_dropped_not_requeued(harness: Harness) {
        push(&harness.pipeline, "lost");
        harness
            .dialer
            .script_writes([WriteOutcome::Fail, WriteOutcome::Fail]);
        let err = harness.pipeline.flush(FlushTrigger::Timer).unwrap_err();
        assert!(matches!(err, TransportError::Write { .. }));
        assert!(harness.pipeline.cache.is_empty());
        assert_eq!(harness.stats.snapshot().dropped_write_failed, 1);

        assert_eq!(harness.pipeline.flush(FlushTrigger::Timer).unwrap(), 0);
        assert!(harness.dialer.received().is_empty());
    }
}
