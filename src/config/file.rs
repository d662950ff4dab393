//! INI loading for [`ShipperConfig`].
//!
//! The shipper reads a single section (by default `[logship]`) whose keys use
//! the option names the host application already knows:
//!
//! ```ini
//! [logship]
//! address = logstash.internal:5000
//! level = warn
//! batchSize = 200
//! batchMaxWait = 250ms
//! overflowPolicy = timeout:100
//! ```
//!
//! Durations accept `ms`, `s` and `m` suffixes; a bare number is milliseconds.

use std::fs;
use std::path::Path;
use std::time::Duration;

use ini::Ini;

use super::{ConfigError, ShipperConfig, parse_overflow_policy};

/// Section read when the caller does not name one.
pub const DEFAULT_SECTION: &str = "logship";

/// Parse a duration such as `500ms`, `5s`, `1m` or `250`.
///
/// Negative amounts parse to [`Duration::ZERO`], which normalisation replaces
/// with the option's default.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let value = raw.trim().to_ascii_lowercase();
    let (digits, unit_ms) = if let Some(n) = value.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = value.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = value.strip_suffix('m') {
        (n, 60_000)
    } else {
        (value.as_str(), 1)
    };
    let amount: i64 = digits.trim().parse().ok()?;
    let Ok(amount) = u64::try_from(amount) else {
        return Some(Duration::ZERO);
    };
    amount.checked_mul(unit_ms).map(Duration::from_millis)
}

fn duration_field(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    parse_duration(raw).ok_or_else(|| ConfigError::invalid(key, raw))
}

/// Counts are signed on input; anything below one becomes zero and falls
/// back to the default.
fn count_field(key: &str, raw: &str) -> Result<usize, ConfigError> {
    let count: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, raw))?;
    Ok(usize::try_from(count).unwrap_or(0))
}

impl ShipperConfig {
    /// Build a configuration from `section` of an INI document.
    pub fn from_ini_str(text: &str, section: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text)?;
        let props = ini
            .section(Some(section))
            .ok_or_else(|| ConfigError::MissingSection(section.to_owned()))?;
        let mut config = ShipperConfig::default();
        for (key, raw) in props.iter() {
            match key {
                "address" => config.address = raw.to_owned(),
                "level" => {
                    config.level = raw.parse().map_err(|_| ConfigError::invalid(key, raw))?;
                }
                "connectTimeout" => config.connect_timeout = duration_field(key, raw)?,
                "writeTimeout" => config.write_timeout = duration_field(key, raw)?,
                "reconnectInterval" => config.reconnect_interval = duration_field(key, raw)?,
                "maxRetry" => config.max_retry = count_field(key, raw)?,
                "batchSize" => config.batch_size = count_field(key, raw)?,
                "batchMaxWait" => config.batch_max_wait = duration_field(key, raw)?,
                "maxCacheSize" => config.max_cache_size = count_field(key, raw)?,
                "source" => config.source = raw.to_owned(),
                "overflowPolicy" => config.overflow_policy = parse_overflow_policy(raw)?,
                "warnInterval" => config.warn_interval = duration_field(key, raw)?,
                other => return Err(ConfigError::UnknownKey(other.to_owned())),
            }
        }
        config.normalised()
    }

    /// Read `path` and build a configuration from its `[logship]` section.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_ini_str(&text, DEFAULT_SECTION)
    }
}
