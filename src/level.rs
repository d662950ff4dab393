//! Severity levels understood by the shipper.
//!
//! Levels are totally ordered so the handler can compare a record against
//! its severity floor with a single integer comparison.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShipLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Critical,
}

/// Returned when a string does not name a known level.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown log level: {0}")]
pub struct ParseLevelError(pub String);

impl ShipLevel {
    /// Upper-case name written into the `level` field of each entry.
    pub fn as_str(self) -> &'static str {
        match self {
            ShipLevel::Trace => "TRACE",
            ShipLevel::Debug => "DEBUG",
            ShipLevel::Info => "INFO",
            ShipLevel::Warn => "WARN",
            ShipLevel::Error => "ERROR",
            ShipLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ShipLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(ParseLevelError(s.to_owned())),
        }
    }
}

impl From<ShipLevel> for u8 {
    fn from(level: ShipLevel) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for ShipLevel {
    type Error = ParseLevelError;

    fn try_from(value: u8) -> Result<Self, ParseLevelError> {
        match value {
            0 => Ok(Self::Trace),
            1 => Ok(Self::Debug),
            2 => Ok(Self::Info),
            3 => Ok(Self::Warn),
            4 => Ok(Self::Error),
            5 => Ok(Self::Critical),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

impl From<log::Level> for ShipLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => ShipLevel::Trace,
            log::Level::Debug => ShipLevel::Debug,
            log::Level::Info => ShipLevel::Info,
            log::Level::Warn => ShipLevel::Warn,
            log::Level::Error => ShipLevel::Error,
        }
    }
}
