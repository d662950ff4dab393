pub mod collector;

pub use collector::{Collector, messages};

use std::time::Duration;

use logship::ShipperConfig;

/// Upper bound for waiting on asynchronous delivery.
#[allow(dead_code)]
pub const WAIT: Duration = Duration::from_secs(5);

/// Fast-failing configuration targeting `address` with a long batch timer,
/// so only explicit triggers flush unless a test shortens it.
#[allow(dead_code)]
pub fn config_for(address: impl Into<String>) -> ShipperConfig {
    ShipperConfig {
        address: address.into(),
        connect_timeout: Duration::from_millis(500),
        write_timeout: Duration::from_millis(500),
        reconnect_interval: Duration::from_millis(10),
        max_retry: 2,
        batch_max_wait: Duration::from_secs(60),
        ..ShipperConfig::default()
    }
}
