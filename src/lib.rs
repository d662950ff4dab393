//! Batching structured-log shipper.
//!
//! Records submitted through a [`LogHandler`] are flattened into single-level
//! JSON objects, buffered in a bounded cache and written downstream by one
//! background worker as newline-delimited JSON over a persistent TCP
//! connection. See [`shipper`] for the batching engine and [`config`] for the
//! recognised options.

pub mod config;
pub mod entry;
pub mod handler;
pub mod level;
#[cfg(feature = "log-compat")]
pub mod log_compat;
pub mod log_record;
pub mod metrics;
pub mod rate_limited_warner;
pub mod shipper;
#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;
#[cfg(feature = "tracing-compat")]
pub mod tracing_layer;

pub use config::{ConfigError, OverflowPolicy, ShipperConfig, ShipperConfigBuilder};
pub use entry::{FlatEntry, flatten};
pub use handler::{HandlerError, LogHandler, RecordHandler};
pub use level::{ParseLevelError, ShipLevel};
#[cfg(feature = "log-compat")]
pub use log_compat::{LogBridge, install_log_bridge};
pub use log_record::{Attributes, LogRecord};
pub use metrics::{DropReason, MetricsSink, NoopMetrics, ShipperStats, StatsSnapshot};
pub use shipper::{Dialer, Shipper, ShipperBuilder, TcpDialer, TransportError};
#[cfg(feature = "tracing-compat")]
pub use tracing_layer::ShipperLayer;
