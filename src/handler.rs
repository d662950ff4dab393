//! Public handler contract and the [`LogHandler`] view.
//!
//! A [`LogHandler`] is a cheap, immutable view over one shared [`Shipper`]:
//! it carries only the default attributes and group names merged into each
//! record it submits. [`LogHandler::with_attributes`] and
//! [`LogHandler::with_group`] return new views over the same engine and never
//! change the view they were derived from. The engine closes when
//! [`LogHandler::close`] is called on any view, or when the last view is
//! dropped.

use std::{fmt, io, sync::Arc, time::Duration};

use serde_json::Value;
use thiserror::Error;

use crate::config::{ConfigError, ShipperConfig};
use crate::level::ShipLevel;
use crate::log_record::{Attributes, LogRecord};
use crate::shipper::{Shipper, ShipperBuilder, TransportError};

/// Errors returned by handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler is closed")]
    Closed,
    #[error("flush was not acknowledged within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to start the flush worker: {0}")]
    Spawn(#[source] io::Error),
}

/// Trait implemented by anything that accepts [`LogRecord`] values.
///
/// The facade bridges are generic over this trait so they can be exercised
/// against in-memory handlers.
#[cfg(any(feature = "log-compat", feature = "tracing-compat"))]
const INTERNAL_TARGET: &str = "logship";

/// True for targets emitted by this crate, which the facade bridges must not
/// feed back into a handler.
#[cfg(any(feature = "log-compat", feature = "tracing-compat"))]
pub(crate) fn is_internal_target(target: &str) -> bool {
    target
        .strip_prefix(INTERNAL_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

pub trait RecordHandler: Send + Sync {
    /// Accept a record for shipping.
    fn handle(&self, record: LogRecord) -> Result<(), HandlerError>;

    /// Whether a record at `level` would be accepted.
    fn enabled(&self, _level: ShipLevel) -> bool {
        true
    }

    /// Push buffered records downstream.
    fn flush(&self) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Structured logging sink over a shared [`Shipper`].
#[derive(Clone)]
pub struct LogHandler {
    shipper: Arc<Shipper>,
    attributes: Arc<Attributes>,
    groups: Arc<[String]>,
}

impl LogHandler {
    /// Connect to `config.address` over TCP and start shipping.
    pub fn connect(config: ShipperConfig) -> Result<Self, HandlerError> {
        ShipperBuilder::new(config).build()
    }

    /// Builder for a handler with a custom dialer or metrics sink.
    pub fn builder(config: ShipperConfig) -> ShipperBuilder {
        ShipperBuilder::new(config)
    }

    /// Root view over an already started shipper.
    pub fn from_shipper(shipper: Arc<Shipper>) -> Self {
        Self {
            shipper,
            attributes: Arc::new(Attributes::new()),
            groups: Arc::from(Vec::new()),
        }
    }

    pub fn shipper(&self) -> &Arc<Shipper> {
        &self.shipper
    }

    /// Default attributes merged into every record from this view.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Group names written into every record from this view.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Queue `record`. Fails only once the shipper has been closed.
    pub fn submit(&self, record: LogRecord) -> Result<(), HandlerError> {
        self.shipper
            .submit(record, &self.attributes, &self.groups)
    }

    pub fn log(
        &self,
        level: ShipLevel,
        message: impl Into<String>,
        attributes: Attributes,
    ) -> Result<(), HandlerError> {
        self.submit(LogRecord::with_attributes(level, message, attributes))
    }

    pub fn debug(&self, message: impl Into<String>) -> Result<(), HandlerError> {
        self.submit(LogRecord::new(ShipLevel::Debug, message))
    }

    pub fn info(&self, message: impl Into<String>) -> Result<(), HandlerError> {
        self.submit(LogRecord::new(ShipLevel::Info, message))
    }

    pub fn warn(&self, message: impl Into<String>) -> Result<(), HandlerError> {
        self.submit(LogRecord::new(ShipLevel::Warn, message))
    }

    pub fn error(&self, message: impl Into<String>) -> Result<(), HandlerError> {
        self.submit(LogRecord::new(ShipLevel::Error, message))
    }

    /// New view whose default attributes are this view's merged with
    /// `attributes`; keys in `attributes` win.
    pub fn with_attributes(&self, attributes: Attributes) -> Self {
        if attributes.is_empty() {
            return self.clone();
        }
        let mut merged = (*self.attributes).clone();
        merged.extend(attributes);
        Self {
            shipper: Arc::clone(&self.shipper),
            attributes: Arc::new(merged),
            groups: Arc::clone(&self.groups),
        }
    }

    /// Shorthand for [`LogHandler::with_attributes`] with one pair.
    pub fn with_attribute(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert(key.into(), value.into());
        self.with_attributes(attributes)
    }

    /// New view with `name` appended to the group list. An empty name returns
    /// an identical view.
    pub fn with_group(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            return self.clone();
        }
        let groups: Vec<String> = self.groups.iter().cloned().chain([name]).collect();
        Self {
            shipper: Arc::clone(&self.shipper),
            attributes: Arc::clone(&self.attributes),
            groups: groups.into(),
        }
    }

    pub fn level(&self) -> ShipLevel {
        self.shipper.level()
    }

    /// Change the severity floor shared by every view.
    pub fn set_level(&self, level: ShipLevel) {
        self.shipper.set_level(level);
    }

    pub fn enabled(&self, level: ShipLevel) -> bool {
        self.shipper.enabled(level)
    }

    pub fn flush(&self) -> Result<(), HandlerError> {
        self.shipper.flush()
    }

    /// Close the shared shipper. Idempotent across all views.
    pub fn close(&self) -> Result<(), HandlerError> {
        self.shipper.close()
    }

    pub fn is_closed(&self) -> bool {
        self.shipper.is_closed()
    }

    pub fn pending(&self) -> usize {
        self.shipper.pending()
    }
}

impl RecordHandler for LogHandler {
    fn handle(&self, record: LogRecord) -> Result<(), HandlerError> {
        self.submit(record)
    }

    fn enabled(&self, level: ShipLevel) -> bool {
        LogHandler::enabled(self, level)
    }

    fn flush(&self) -> Result<(), HandlerError> {
        LogHandler::flush(self)
    }
}

impl fmt::Debug for LogHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHandler")
            .field("shipper", &self.shipper)
            .field("attributes", &self.attributes)
            .field("groups", &self.groups)
            .finish()
    }
}
