//! Log record representation accepted by the shipper.
//!
//! A [`LogRecord`] captures one log event: when it happened, how severe it is,
//! the message text and any structured attributes supplied at the call site.
//! Scoping data (global attributes, group names) lives on the handler view and
//! is merged in later by [`crate::entry::flatten`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::level::ShipLevel;

/// Attribute map carried by records and handler views. Values may be any
/// JSON value; insertion order is kept on the wire.
pub type Attributes = serde_json::Map<String, Value>;

#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    /// Time the record was created.
    pub timestamp: DateTime<Utc>,
    pub level: ShipLevel,
    pub message: String,
    /// Call-site attributes; these win over handler-level attributes.
    pub attributes: Attributes,
}

impl LogRecord {
    /// Construct a record stamped with the current time.
    pub fn new(level: ShipLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            attributes: Attributes::new(),
        }
    }

    /// Construct a record with an explicit attribute map.
    pub fn with_attributes(
        level: ShipLevel,
        message: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        Self {
            attributes,
            ..Self::new(level, message)
        }
    }

    /// Attach a single attribute, replacing any previous value for `key`.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Override the timestamp, mainly for deterministic tests and bridges.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.level, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attr_overrides_existing_key() {
        let record = LogRecord::new(ShipLevel::Info, "hello")
            .attr("user", "a")
            .attr("user", "b")
            .attr("count", 3);
        assert_eq!(record.attributes.get("user"), Some(&json!("b")));
        assert_eq!(record.attributes.get("count"), Some(&json!(3)));
    }

    #[test]
    fn display_shows_level_and_message() {
        let record = LogRecord::new(ShipLevel::Error, "boom");
        assert_eq!(record.to_string(), "ERROR - boom");
    }
}
