//! `tracing_subscriber` layer forwarding events to a [`RecordHandler`].
//!
//! Each event becomes one [`LogRecord`]: the `message` field is the record
//! message, every other field becomes an attribute, and the event target is
//! kept under `target`. Events from this crate's own modules are ignored.

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::handler::{RecordHandler, is_internal_target};
use crate::level::ShipLevel;
use crate::log_record::{Attributes, LogRecord};

pub struct ShipperLayer<H> {
    handler: H,
}

impl<H: RecordHandler> ShipperLayer<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

fn map_level(level: &Level) -> ShipLevel {
    if *level == Level::ERROR {
        ShipLevel::Error
    } else if *level == Level::WARN {
        ShipLevel::Warn
    } else if *level == Level::INFO {
        ShipLevel::Info
    } else if *level == Level::DEBUG {
        ShipLevel::Debug
    } else {
        ShipLevel::Trace
    }
}

struct FieldVisitor<'a> {
    fields: &'a mut Attributes,
    message: &'a mut Option<String>,
}

impl FieldVisitor<'_> {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_owned(), value);
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_owned());
        } else {
            self.insert(field, Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{value:?}"));
        } else {
            self.insert(field, Value::String(format!("{value:?}")));
        }
    }
}

impl<S, H> Layer<S> for ShipperLayer<H>
where
    S: Subscriber,
    H: RecordHandler + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_internal_target(meta.target()) {
            return;
        }
        let level = map_level(meta.level());
        if !self.handler.enabled(level) {
            return;
        }
        let mut fields = Attributes::new();
        let mut message = None;
        event.record(&mut FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        });
        fields.insert("target".into(), Value::from(meta.target()));
        let record = LogRecord::with_attributes(level, message.unwrap_or_default(), fields);
        let _ = self.handler.handle(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::CollectingHandler;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn events_become_records_with_fields() {
        let handler = CollectingHandler::new();
        let subscriber =
            tracing_subscriber::registry().with(ShipperLayer::new(handler.clone()));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "checkout", order = 7, paid = true, "order placed");
            tracing::debug!(target: "checkout", "below the floor");
        });

        let records = handler.collected();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.level, ShipLevel::Info);
        assert_eq!(record.message, "order placed");
        assert_eq!(record.attributes["order"], 7);
        assert_eq!(record.attributes["paid"], true);
        assert_eq!(record.attributes["target"], "checkout");
    }

    #[test]
    fn own_events_are_ignored_but_similar_targets_are_not() {
        let handler = CollectingHandler::new();
        let subscriber =
            tracing_subscriber::registry().with(ShipperLayer::new(handler.clone()));
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "logship::shipper", "internal");
            tracing::warn!(target: "logshipper", "neighbouring crate");
        });
        let records = handler.collected();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "neighbouring crate");
        assert_eq!(records[0].attributes["target"], "logshipper");
    }
}
