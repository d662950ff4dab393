//! Flattening of records into wire-ready JSON objects.
//!
//! Every entry on the wire is a single flat JSON object. The fixed keys
//! (`@timestamp`, `level`, `message`, `source`) come first, `groups` is added
//! only when the handler view has any, and attributes are merged at the top
//! level: handler attributes first, then call-site attributes, so the record
//! wins on key collisions. Nothing is nested under an `attributes` key.
//!
//! A batch is encoded as newline-delimited JSON, one object per line.

use std::io;

use chrono::SecondsFormat;
use serde_json::Value;

use crate::log_record::{Attributes, LogRecord};

pub const TIMESTAMP_KEY: &str = "@timestamp";
pub const LEVEL_KEY: &str = "level";
pub const MESSAGE_KEY: &str = "message";
pub const SOURCE_KEY: &str = "source";
pub const GROUPS_KEY: &str = "groups";

/// A flattened entry waiting in the cache.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatEntry {
    fields: Attributes,
}

impl FlatEntry {
    pub fn fields(&self) -> &Attributes {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl From<Attributes> for FlatEntry {
    fn from(fields: Attributes) -> Self {
        Self { fields }
    }
}

/// Merge `record` with the handler's `globals` and `groups` into one flat entry.
pub fn flatten(
    record: LogRecord,
    source: &str,
    globals: &Attributes,
    groups: &[String],
) -> FlatEntry {
    let mut fields = Attributes::with_capacity(5 + globals.len() + record.attributes.len());
    fields.insert(
        TIMESTAMP_KEY.into(),
        Value::String(
            record
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Nanos, true),
        ),
    );
    fields.insert(LEVEL_KEY.into(), Value::String(record.level.to_string()));
    fields.insert(MESSAGE_KEY.into(), Value::String(record.message));
    fields.insert(SOURCE_KEY.into(), Value::String(source.to_owned()));
    if !groups.is_empty() {
        fields.insert(
            GROUPS_KEY.into(),
            Value::Array(groups.iter().cloned().map(Value::String).collect()),
        );
    }
    for (key, value) in globals {
        fields.insert(key.clone(), value.clone());
    }
    fields.extend(record.attributes);
    FlatEntry { fields }
}

/// Serialise a single entry as one JSON line (including the trailing newline).
pub fn serialise_entry(entry: &FlatEntry, buf: &mut Vec<u8>) -> io::Result<()> {
    let start = buf.len();
    if let Err(err) = serde_json::to_writer(&mut *buf, &entry.fields) {
        buf.truncate(start);
        return Err(io::Error::other(err));
    }
    buf.push(b'\n');
    Ok(())
}

/// Result of encoding a batch for a single write.
#[derive(Debug, Default)]
pub struct EncodedBatch {
    pub payload: Vec<u8>,
    pub encoded: usize,
    pub dropped: usize,
}

impl EncodedBatch {
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Encode `entries` as newline-delimited JSON.
///
/// Entries that fail to serialise are skipped and reported through
/// `on_error`; the rest of the batch is still encoded.
pub fn encode_batch(
    entries: &[FlatEntry],
    on_error: impl FnMut(&FlatEntry, &io::Error),
) -> EncodedBatch {
    encode_batch_with(entries, serialise_entry, on_error)
}

/// Encode `entries` with a caller-supplied line encoder.
///
/// Bytes an encoder wrote before failing are discarded, so a failed entry
/// never leaves a partial line in the payload.
pub fn encode_batch_with(
    entries: &[FlatEntry],
    mut encode_line: impl FnMut(&FlatEntry, &mut Vec<u8>) -> io::Result<()>,
    mut on_error: impl FnMut(&FlatEntry, &io::Error),
) -> EncodedBatch {
    let mut batch = EncodedBatch {
        payload: Vec::with_capacity(entries.len() * 128),
        ..EncodedBatch::default()
    };
    for entry in entries {
        let start = batch.payload.len();
        match encode_line(entry, &mut batch.payload) {
            Ok(()) => batch.encoded += 1,
            Err(err) => {
                batch.payload.truncate(start);
                on_error(entry, &err);
                batch.dropped += 1;
            }
        }
    }
    batch
}
