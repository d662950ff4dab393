//! Compatibility bridge for the Rust `log` crate.
//!
//! [`LogBridge`] implements `log::Log` over any [`RecordHandler`], so
//! `log::info!` and friends ship through a [`crate::LogHandler`]. The record's
//! target, module path, file and line travel as attributes. Records whose
//! target starts with `logship` are skipped: the shipper's own diagnostics
//! must never feed back into the cache they describe.

use log::{Metadata, Record};
use serde_json::Value;

use crate::handler::{RecordHandler, is_internal_target};
use crate::level::ShipLevel;
use crate::log_record::{Attributes, LogRecord};

/// Attribute keys carrying `log` record metadata.
pub const TARGET_KEY: &str = "target";
pub const MODULE_KEY: &str = "module";
pub const FILE_KEY: &str = "file";
pub const LINE_KEY: &str = "line";

/// Adapter implementing the Rust `log::Log` trait.
pub struct LogBridge<H> {
    handler: H,
}

impl<H: RecordHandler> LogBridge<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    fn convert(record: &Record<'_>) -> LogRecord {
        let mut attributes = Attributes::new();
        attributes.insert(TARGET_KEY.into(), Value::from(record.target()));
        if let Some(module) = record.module_path() {
            attributes.insert(MODULE_KEY.into(), Value::from(module));
        }
        if let Some(file) = record.file() {
            attributes.insert(FILE_KEY.into(), Value::from(file));
        }
        if let Some(line) = record.line() {
            attributes.insert(LINE_KEY.into(), Value::from(line));
        }
        LogRecord::with_attributes(
            ShipLevel::from(record.level()),
            record.args().to_string(),
            attributes,
        )
    }
}

impl<H: RecordHandler> log::Log for LogBridge<H> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        !is_internal_target(metadata.target()) && self.handler.enabled(metadata.level().into())
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // A closed handler has nowhere to report to; the drop is already counted.
        let _ = self.handler.handle(Self::convert(record));
    }

    fn flush(&self) {
        if let Err(err) = self.handler.flush() {
            eprintln!("logship: flushing the log bridge failed: {err}");
        }
    }
}

/// Install `handler` as the global Rust logger.
///
/// Fails when a different global logger is already set.
pub fn install_log_bridge<H>(handler: H) -> Result<(), log::SetLoggerError>
where
    H: RecordHandler + 'static,
{
    log::set_boxed_logger(Box::new(LogBridge::new(handler)))?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
