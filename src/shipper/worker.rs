//! Background flush worker.
//!
//! The worker is the only thread that drains the cache while the shipper is
//! open. It wakes on a `batch_max_wait` ticker, on triggers sent by producers
//! when the cache reaches the batch size or its capacity, and on explicit
//! flush requests. A shutdown command (or every sender disappearing) moves it
//! to the stopping state: it performs one final drain-and-send, acknowledges
//! the result and exits.

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use log::debug;

use super::connection::TransportError;
use super::pipeline::Pipeline;

/// What caused a flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The cache reached the configured batch size.
    BatchSize,
    /// A producer found the cache at capacity.
    Overflow,
    /// The batch timer fired.
    Timer,
    /// A caller asked for a flush.
    Explicit,
    /// The shipper is closing.
    Shutdown,
}

pub(crate) type FlushAck = Sender<Result<usize, TransportError>>;

/// Commands processed by the worker thread.
pub(crate) enum ShipCommand {
    Trigger(FlushTrigger),
    Flush(FlushAck),
    Shutdown(FlushAck),
}

/// Room for a few coalesced triggers plus a flush or shutdown request.
pub(crate) const COMMAND_CAPACITY: usize = 16;

pub(crate) fn spawn_worker(
    pipeline: Arc<Pipeline>,
    batch_max_wait: Duration,
) -> io::Result<(Sender<ShipCommand>, JoinHandle<()>)> {
    let (tx, rx) = bounded(COMMAND_CAPACITY);
    let handle = thread::Builder::new()
        .name("logship-flush".into())
        .spawn(move || worker_loop(&rx, &pipeline, batch_max_wait))?;
    Ok((tx, handle))
}

fn worker_loop(rx: &Receiver<ShipCommand>, pipeline: &Pipeline, batch_max_wait: Duration) {
    let ticker = tick(batch_max_wait);
    loop {
        select! {
            recv(rx) -> cmd => match cmd {
                Ok(ShipCommand::Trigger(trigger)) => {
                    let _ = pipeline.flush(trigger);
                }
                Ok(ShipCommand::Flush(ack)) => {
                    let _ = ack.send(pipeline.flush(FlushTrigger::Explicit));
                }
                Ok(ShipCommand::Shutdown(ack)) => {
                    let _ = ack.send(pipeline.flush(FlushTrigger::Shutdown));
                    break;
                }
                Err(_) => {
                    let _ = pipeline.flush(FlushTrigger::Shutdown);
                    break;
                }
            },
            recv(ticker) -> _ => {
                let _ = pipeline.flush(FlushTrigger::Timer);
            }
        }
    }
    debug!("logship: flush worker stopped");
}
