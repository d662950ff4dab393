//! The shared shipping engine behind every [`LogHandler`] view.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    thread::JoinHandle,
};

use crossbeam_channel::{RecvTimeoutError, SendTimeoutError, Sender, TrySendError, bounded};
use log::warn;
use parking_lot::Mutex;

use crate::config::ShipperConfig;
use crate::entry::{FlatEntry, flatten};
use crate::handler::{HandlerError, LogHandler};
use crate::level::ShipLevel;
use crate::log_record::{Attributes, LogRecord};
use crate::metrics::{DropReason, MetricsSink, NoopMetrics};

use super::cache::{BoundedCache, CacheError};
use super::connection::{ConnectPolicy, ConnectionManager};
use super::drop_warner::DropWarner;
use super::pipeline::Pipeline;
use super::transport::{Dialer, TcpDialer};
use super::worker::{FlushTrigger, ShipCommand, spawn_worker};

/// Builder wiring a [`Shipper`] to its transport and metrics sink.
pub struct ShipperBuilder {
    config: ShipperConfig,
    dialer: Option<Arc<dyn Dialer>>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl ShipperBuilder {
    pub fn new(config: ShipperConfig) -> Self {
        Self {
            config,
            dialer: None,
            metrics: None,
        }
    }

    /// Replace the default TCP dialer.
    pub fn with_dialer(mut self, dialer: impl Dialer + 'static) -> Self {
        self.dialer = Some(Arc::new(dialer));
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration, connect and start the flush worker.
    pub fn build_shipper(self) -> Result<Shipper, HandlerError> {
        let config = self.config.normalised()?;
        let dialer = self
            .dialer
            .unwrap_or_else(|| Arc::new(TcpDialer::new(config.address.clone())));
        let metrics = self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics));
        Shipper::start(config, dialer, metrics)
    }

    /// Build the shipper and return the root handler view over it.
    pub fn build(self) -> Result<LogHandler, HandlerError> {
        self.build_shipper()
            .map(|shipper| LogHandler::from_shipper(Arc::new(shipper)))
    }
}

/// Owns the cache, the connection and the flush worker.
///
/// Producers only append to the cache; all network I/O happens on the worker
/// thread (or in [`Shipper::close`] once the worker has stopped).
pub struct Shipper {
    config: ShipperConfig,
    pipeline: Arc<Pipeline>,
    tx: Sender<ShipCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    level: AtomicU8,
}

impl Shipper {
    fn start(
        config: ShipperConfig,
        dialer: Arc<dyn Dialer>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, HandlerError> {
        let pipeline = Arc::new(Pipeline {
            cache: BoundedCache::new(config.max_cache_size),
            connection: ConnectionManager::new(
                dialer,
                ConnectPolicy::from(&config),
                Arc::clone(&metrics),
            ),
            drops: DropWarner::new(config.warn_interval, Arc::clone(&metrics)),
            metrics,
        });
        pipeline.connection.connect()?;
        let (tx, handle) = spawn_worker(Arc::clone(&pipeline), config.batch_max_wait)
            .map_err(HandlerError::Spawn)?;
        Ok(Self {
            level: AtomicU8::new(config.level.into()),
            config,
            pipeline,
            tx,
            handle: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn level(&self) -> ShipLevel {
        ShipLevel::try_from(self.level.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set_level(&self, level: ShipLevel) {
        self.level.store(level.into(), Ordering::Relaxed);
    }

    pub fn enabled(&self, level: ShipLevel) -> bool {
        level >= self.level()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Entries waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.pipeline.cache.len()
    }

    pub fn is_connected(&self) -> bool {
        self.pipeline.connection.is_connected()
    }

    /// Flatten `record` with the caller's view and queue it for shipping.
    ///
    /// Only a closed shipper is reported as an error. Entries lost to the
    /// overflow policy are counted and warned about, then swallowed.
    pub fn submit(
        &self,
        record: LogRecord,
        globals: &Attributes,
        groups: &[String],
    ) -> Result<(), HandlerError> {
        if self.is_closed() {
            self.pipeline.drops.record(DropReason::Closed, 1);
            return Err(HandlerError::Closed);
        }
        if !self.enabled(record.level) {
            self.pipeline.metrics.record_filtered();
            return Ok(());
        }
        self.pipeline.metrics.record_submitted();
        self.enqueue(flatten(record, &self.config.source, globals, groups))
    }

    fn enqueue(&self, entry: FlatEntry) -> Result<(), HandlerError> {
        let pushed = self
            .pipeline
            .cache
            .push(entry, self.config.overflow_policy, || {
                self.signal(FlushTrigger::Overflow)
            });
        match pushed {
            Ok(len) => {
                if len >= self.config.batch_size {
                    self.signal(FlushTrigger::BatchSize);
                }
                Ok(())
            }
            Err(CacheError::Full) => {
                self.pipeline.drops.record(DropReason::QueueFull, 1);
                Ok(())
            }
            Err(CacheError::Timeout) => {
                self.pipeline.drops.record(DropReason::Timeout, 1);
                Ok(())
            }
            Err(CacheError::Closed) => {
                self.pipeline.drops.record(DropReason::Closed, 1);
                Err(HandlerError::Closed)
            }
        }
    }

    fn signal(&self, trigger: FlushTrigger) {
        // A full command queue already holds a pending flush.
        if let Err(TrySendError::Disconnected(_)) = self.tx.try_send(ShipCommand::Trigger(trigger))
        {
            warn!("logship: flush worker is gone; {trigger:?} trigger ignored");
        }
    }

    /// Ask the worker to send everything cached now and wait for the result.
    pub fn flush(&self) -> Result<(), HandlerError> {
        if self.is_closed() {
            return Err(HandlerError::Closed);
        }
        // The worker may still be finishing an earlier flush.
        let budget = self.config.flush_budget().saturating_mul(2);
        let (ack_tx, ack_rx) = bounded(1);
        match self.tx.send_timeout(ShipCommand::Flush(ack_tx), budget) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => return Err(HandlerError::Timeout(budget)),
            Err(SendTimeoutError::Disconnected(_)) => return Err(HandlerError::Closed),
        }
        match ack_rx.recv_timeout(budget) {
            Ok(result) => result.map(drop).map_err(HandlerError::from),
            Err(RecvTimeoutError::Timeout) => Err(HandlerError::Timeout(budget)),
            Err(RecvTimeoutError::Disconnected) => Err(HandlerError::Closed),
        }
    }

    /// Stop accepting entries, flush what is cached and release the connection.
    ///
    /// Only the first call has any effect; later calls return `Ok(())`.
    pub fn close(&self) -> Result<(), HandlerError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        self.pipeline.cache.close();
        let mut result = Ok(0);
        let (ack_tx, ack_rx) = bounded(1);
        if self.tx.send(ShipCommand::Shutdown(ack_tx)).is_ok()
            && let Ok(worker_result) = ack_rx.recv()
        {
            result = worker_result;
        }
        self.join_worker();
        // Covers a worker that exited without draining.
        let leftover = self.pipeline.flush(FlushTrigger::Shutdown);
        if result.is_ok() {
            result = leftover;
        }
        self.pipeline.connection.close();
        self.pipeline.drops.flush();
        result.map(drop).map_err(HandlerError::from)
    }

    fn join_worker(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            warn!("logship: flush worker panicked");
        }
    }
}

impl Drop for Shipper {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("logship: closing on drop failed: {err}");
        }
    }
}

impl fmt::Debug for Shipper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shipper")
            .field("target", &self.config.address)
            .field("level", &self.level())
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}
