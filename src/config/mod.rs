//! Configuration for the log shipper.
//!
//! [`ShipperConfig`] carries every tunable the shipper understands. Callers
//! either fill it directly, use [`ShipperConfigBuilder`], or load it from an
//! INI section via [`ShipperConfig::from_ini_str`] / [`ShipperConfig::from_ini_file`].
//!
//! Thresholds left at zero are replaced by the defaults below when the config
//! is normalised; only the address is mandatory.

mod file;
mod policy;

use std::time::Duration;

use thiserror::Error;

use crate::level::ShipLevel;
use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

pub use file::{DEFAULT_SECTION, parse_duration};
pub use policy::{OverflowPolicy, parse_overflow_policy};

/// Default timeout for establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default deadline applied to each batch write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default pause between connection attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(3);
/// Default number of connection attempts per connect.
pub const DEFAULT_MAX_RETRY: usize = 3;
/// Default number of cached entries that triggers an immediate flush.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Default period of the background flush timer.
pub const DEFAULT_BATCH_MAX_WAIT: Duration = Duration::from_millis(500);
/// Default hard cap on cached entries.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 500;
/// Default value of the `source` field.
pub const DEFAULT_SOURCE: &str = "rust-application";

/// Errors raised while building or loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("logstash address cannot be empty")]
    MissingAddress,
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
    #[error("unknown configuration key: {0}")]
    UnknownKey(String),
    #[error("configuration section [{0}] not found")]
    MissingSection(String),
    #[error("invalid INI document: {0}")]
    Ini(#[from] ini::ParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_owned(),
            value: value.into(),
        }
    }
}

/// Options controlling connection handling, batching and buffering.
#[derive(Clone, Debug, PartialEq)]
pub struct ShipperConfig {
    /// `host:port` of the ingestion endpoint.
    pub address: String,
    /// Severity floor; records below it are discarded.
    pub level: ShipLevel,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub reconnect_interval: Duration,
    /// Connection attempts per connect call.
    pub max_retry: usize,
    /// Cached entry count that triggers an immediate flush.
    pub batch_size: usize,
    /// Period of the background flush timer.
    pub batch_max_wait: Duration,
    /// Hard cap on cached entries.
    pub max_cache_size: usize,
    /// Value of the `source` field on every entry.
    pub source: String,
    /// What producers do when the cache is full.
    pub overflow_policy: OverflowPolicy,
    /// Minimum spacing between repeated drop warnings.
    pub warn_interval: Duration,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            level: ShipLevel::Info,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_retry: DEFAULT_MAX_RETRY,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_max_wait: DEFAULT_BATCH_MAX_WAIT,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            source: DEFAULT_SOURCE.to_owned(),
            overflow_policy: OverflowPolicy::default(),
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

fn or_default_duration(value: Duration, default: Duration) -> Duration {
    if value.is_zero() { default } else { value }
}

fn or_default_count(value: usize, default: usize) -> usize {
    if value == 0 { default } else { value }
}

impl ShipperConfig {
    /// Default configuration targeting `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Replace unset thresholds with defaults and validate the address.
    pub fn normalised(mut self) -> Result<Self, ConfigError> {
        self.address = self.address.trim().to_owned();
        if self.address.is_empty() {
            return Err(ConfigError::MissingAddress);
        }
        self.connect_timeout = or_default_duration(self.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        self.write_timeout = or_default_duration(self.write_timeout, DEFAULT_WRITE_TIMEOUT);
        self.reconnect_interval =
            or_default_duration(self.reconnect_interval, DEFAULT_RECONNECT_INTERVAL);
        self.max_retry = or_default_count(self.max_retry, DEFAULT_MAX_RETRY);
        self.batch_size = or_default_count(self.batch_size, DEFAULT_BATCH_SIZE);
        self.batch_max_wait = or_default_duration(self.batch_max_wait, DEFAULT_BATCH_MAX_WAIT);
        self.max_cache_size = or_default_count(self.max_cache_size, DEFAULT_MAX_CACHE_SIZE);
        if self.source.trim().is_empty() {
            self.source = DEFAULT_SOURCE.to_owned();
        }
        if let OverflowPolicy::Timeout(wait) = self.overflow_policy
            && wait.is_zero()
        {
            return Err(ConfigError::invalid("overflowPolicy", "timeout:0"));
        }
        Ok(self)
    }

    /// Upper bound on how long one flush can take: every connection attempt
    /// twice (initial connect plus the reconnect before the retry) and two
    /// write deadlines.
    pub fn flush_budget(&self) -> Duration {
        let attempts = u32::try_from(self.max_retry).unwrap_or(u32::MAX);
        let per_connect = self
            .connect_timeout
            .saturating_add(self.reconnect_interval)
            .saturating_mul(attempts);
        per_connect
            .saturating_mul(2)
            .saturating_add(self.write_timeout.saturating_mul(2))
    }
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.config.$field = value;
            self
        }
    };
}

/// Fluent builder for [`ShipperConfig`].
#[derive(Clone, Debug, Default)]
pub struct ShipperConfigBuilder {
    config: ShipperConfig,
}

impl ShipperConfigBuilder {
    /// Start from the defaults with no address set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ingestion endpoint.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    /// Set the `source` field written into every entry.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.config.source = source.into();
        self
    }

    option_setter!(
        #[doc = "Set the severity floor."]
        with_level,
        level,
        ShipLevel
    );
    option_setter!(with_connect_timeout, connect_timeout, Duration);
    option_setter!(with_write_timeout, write_timeout, Duration);
    option_setter!(with_reconnect_interval, reconnect_interval, Duration);
    option_setter!(with_max_retry, max_retry, usize);
    option_setter!(
        #[doc = "Set the cached entry count that triggers an immediate flush."]
        with_batch_size,
        batch_size,
        usize
    );
    option_setter!(with_batch_max_wait, batch_max_wait, Duration);
    option_setter!(
        #[doc = "Set the hard cap on cached entries."]
        with_max_cache_size,
        max_cache_size,
        usize
    );
    option_setter!(with_overflow_policy, overflow_policy, OverflowPolicy);
    option_setter!(with_warn_interval, warn_interval, Duration);

    /// Normalise and validate the accumulated configuration.
    pub fn build(self) -> Result<ShipperConfig, ConfigError> {
        self.config.normalised()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn empty_address_is_rejected(#[case] address: &str) {
        let err = ShipperConfig::new(address).normalised().unwrap_err();
        assert!(matches!(err, ConfigError::MissingAddress));
    }

    #[test]
    fn zero_thresholds_fall_back_to_defaults() {
        let config = ShipperConfig {
            address: "127.0.0.1:5000".into(),
            connect_timeout: Duration::ZERO,
            write_timeout: Duration::ZERO,
            reconnect_interval: Duration::ZERO,
            max_retry: 0,
            batch_size: 0,
            batch_max_wait: Duration::ZERO,
            max_cache_size: 0,
            source: " ".into(),
            ..ShipperConfig::default()
        }
        .normalised()
        .expect("valid config");
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.write_timeout, DEFAULT_WRITE_TIMEOUT);
        assert_eq!(config.reconnect_interval, DEFAULT_RECONNECT_INTERVAL);
        assert_eq!(config.max_retry, DEFAULT_MAX_RETRY);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.batch_max_wait, DEFAULT_BATCH_MAX_WAIT);
        assert_eq!(config.max_cache_size, DEFAULT_MAX_CACHE_SIZE);
        assert_eq!(config.source, DEFAULT_SOURCE);
    }

    #[test]
    fn explicit_values_are_kept() {
        let config = ShipperConfigBuilder::new()
            .with_address(" logs.internal:5000 ")
            .with_level(ShipLevel::Warn)
            .with_batch_size(10)
            .with_max_cache_size(5)
            .with_batch_max_wait(Duration::from_millis(50))
            .with_source("payments")
            .with_overflow_policy(OverflowPolicy::Drop)
            .build()
            .expect("valid config");
        assert_eq!(config.address, "logs.internal:5000");
        assert_eq!(config.level, ShipLevel::Warn);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_cache_size, 5);
        assert_eq!(config.batch_max_wait, Duration::from_millis(50));
        assert_eq!(config.source, "payments");
        assert_eq!(config.overflow_policy, OverflowPolicy::Drop);
    }

    #[test]
    fn zero_timeout_policy_is_rejected() {
        let err = ShipperConfigBuilder::new()
            .with_address("127.0.0.1:5000")
            .with_overflow_policy(OverflowPolicy::Timeout(Duration::ZERO))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "overflowPolicy"));
    }

    #[test]
    fn flush_budget_covers_retries_and_writes() {
        let config = ShipperConfigBuilder::new()
            .with_address("127.0.0.1:5000")
            .with_connect_timeout(Duration::from_millis(100))
            .with_reconnect_interval(Duration::from_millis(50))
            .with_write_timeout(Duration::from_millis(200))
            .with_max_retry(2)
            .build()
            .expect("valid config");
        assert_eq!(config.flush_budget(), Duration::from_millis(1_000));
    }
}
