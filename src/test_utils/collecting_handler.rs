//! A simple handler that accumulates records in memory for test assertions.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::handler::{HandlerError, RecordHandler};
use crate::level::ShipLevel;
use crate::log_record::LogRecord;

/// Handler that stores every record it receives for later inspection.
#[derive(Clone, Default)]
pub struct CollectingHandler {
    records: Arc<Mutex<Vec<LogRecord>>>,
    floor: ShipLevel,
}

impl CollectingHandler {
    /// Create a handler accepting `INFO` and above.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(floor: ShipLevel) -> Self {
        Self {
            floor,
            ..Self::default()
        }
    }

    /// Return a snapshot of all records received so far.
    pub fn collected(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }
}

impl RecordHandler for CollectingHandler {
    fn handle(&self, record: LogRecord) -> Result<(), HandlerError> {
        self.records.lock().push(record);
        Ok(())
    }

    fn enabled(&self, level: ShipLevel) -> bool {
        level >= self.floor
    }
}
