//! Batching engine that ships flattened entries over a persistent connection.
//!
//! [`Shipper`] owns a size-capped cache, a [`ConnectionManager`] and one
//! background flush worker. Producers append entries to the cache and nudge
//! the worker when the batch size or the cache capacity is reached; the
//! worker also flushes on a `batch_max_wait` ticker. Each flush drains the
//! cache and writes the whole batch as newline-delimited JSON in a single
//! write, reconnecting and resending once if that write fails.

mod cache;
mod connection;
mod drop_warner;
mod engine;
mod pipeline;
mod transport;
mod worker;


pub use connection::{ConnectPolicy, ConnectionManager, TransportError};
pub use engine::{Shipper, ShipperBuilder};
pub use transport::{Connection, Dialer, TcpDialer};
pub use worker::FlushTrigger;
