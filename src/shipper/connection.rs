//! Ownership of the outbound connection.
//!
//! [`ConnectionManager`] dials with bounded retries, writes whole batches
//! under a per-write deadline, and on a failed write reconnects once and
//! resends the same batch before giving up. A single mutex guards the
//! connection so concurrent flushes can neither interleave partial writes nor
//! race on reconnection.

use std::{io, sync::Arc, thread, time::Duration};

use log::{debug, warn};
use parking_lot::Mutex;
use thiserror::Error;

use crate::config::ShipperConfig;
use crate::metrics::MetricsSink;

use super::transport::{Connection, Dialer};

/// Errors surfaced by the connection manager.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {target} after {attempts} attempts: {source}")]
    Connect {
        target: String,
        attempts: usize,
        #[source]
        source: io::Error,
    },
    #[error("batch write failed after reconnect: {source}")]
    Write {
        #[source]
        source: io::Error,
    },
    #[error("connection has been closed")]
    Closed,
}

/// Timing knobs used when dialling and writing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectPolicy {
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub reconnect_interval: Duration,
    pub max_retry: usize,
}

impl From<&ShipperConfig> for ConnectPolicy {
    fn from(config: &ShipperConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            write_timeout: config.write_timeout,
            reconnect_interval: config.reconnect_interval,
            max_retry: config.max_retry.max(1),
        }
    }
}

#[derive(Default)]
struct Slot {
    conn: Option<Box<dyn Connection>>,
    closed: bool,
}

pub struct ConnectionManager {
    dialer: Arc<dyn Dialer>,
    policy: ConnectPolicy,
    slot: Mutex<Slot>,
    metrics: Arc<dyn MetricsSink>,
}

impl ConnectionManager {
    pub fn new(
        dialer: Arc<dyn Dialer>,
        policy: ConnectPolicy,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            dialer,
            policy,
            slot: Mutex::new(Slot::default()),
            metrics,
        }
    }

    /// Drop any existing connection and dial a fresh one.
    pub fn connect(&self) -> Result<(), TransportError> {
        let mut slot = self.slot.lock();
        if slot.closed {
            return Err(TransportError::Closed);
        }
        self.connect_locked(&mut slot)
    }

    fn connect_locked(&self, slot: &mut Slot) -> Result<(), TransportError> {
        slot.conn = None;
        let attempts = self.policy.max_retry;
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.dialer.dial(self.policy.connect_timeout) {
                Ok(conn) => {
                    slot.conn = Some(conn);
                    self.metrics.record_connect();
                    debug!("logship: connected to {}", self.dialer.target());
                    return Ok(());
                }
                Err(err) => {
                    if attempt < attempts {
                        warn!(
                            "logship: connecting to {} failed (attempt {attempt}/{attempts}): {err}",
                            self.dialer.target()
                        );
                        thread::sleep(self.policy.reconnect_interval);
                    }
                    last_err = Some(err);
                }
            }
        }
        Err(TransportError::Connect {
            target: self.dialer.target().to_owned(),
            attempts,
            source: last_err.unwrap_or_else(|| io::Error::other("no connection attempt made")),
        })
    }

    fn send(conn: &mut dyn Connection, payload: &[u8], timeout: Duration) -> io::Result<()> {
        conn.set_write_timeout(timeout)?;
        conn.write_all(payload)?;
        conn.flush()
    }

    fn send_current(&self, slot: &mut Slot, payload: &[u8]) -> io::Result<()> {
        match slot.conn.as_deref_mut() {
            Some(conn) => Self::send(conn, payload, self.policy.write_timeout),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no active connection",
            )),
        }
    }

    /// Write `payload` as one unit, reconnecting and retrying once on failure.
    pub fn write(&self, payload: &[u8]) -> Result<(), TransportError> {
        let mut slot = self.slot.lock();
        if slot.closed {
            return Err(TransportError::Closed);
        }
        if slot.conn.is_none() {
            self.connect_locked(&mut slot)?;
        }
        let Err(err) = self.send_current(&mut slot, payload) else {
            return Ok(());
        };
        self.metrics.record_write_failure();
        warn!(
            "logship: write of {} bytes to {} failed, reconnecting: {err}",
            payload.len(),
            self.dialer.target()
        );
        self.connect_locked(&mut slot)?;
        match self.send_current(&mut slot, payload) {
            Ok(()) => {
                debug!("logship: retried write succeeded");
                Ok(())
            }
            Err(source) => {
                self.metrics.record_write_failure();
                slot.conn = None;
                Err(TransportError::Write { source })
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.slot.lock().conn.is_some()
    }

    /// Release the connection. Later writes fail with [`TransportError::Closed`].
    pub fn close(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        if let Some(mut conn) = slot.conn.take()
            && let Err(err) = conn.flush()
        {
            debug!("logship: flush on close failed: {err}");
        }
    }
}
