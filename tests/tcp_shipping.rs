//! End-to-end shipping over a loopback TCP connection.

mod test_utils;

use std::collections::HashSet;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use logship::{
    HandlerError, LogHandler, LogRecord, ShipLevel, ShipperStats, TransportError,
};
use rstest::{fixture, rstest};
use serde_json::json;
use test_utils::{Collector, WAIT, config_for, messages};

#[fixture]
fn collector() -> Collector {
    Collector::start()
}

#[rstest]
fn close_delivers_entries_below_batch_size(collector: Collector) {
    let mut config = config_for(collector.address());
    config.batch_size = 50;
    let handler = LogHandler::connect(config).expect("connect");
    for i in 0..30 {
        handler.info(format!("entry {i}")).expect("submit");
    }
    handler.close().expect("close");

    let entries = collector.wait_for(30, WAIT);
    let expected: Vec<String> = (0..30).map(|i| format!("entry {i}")).collect();
    assert_eq!(messages(&entries), expected);
}

#[rstest]
fn batch_size_flushes_without_waiting_for_timer(collector: Collector) {
    let mut config = config_for(collector.address());
    config.batch_size = 10;
    config.batch_max_wait = Duration::from_secs(30);
    let handler = LogHandler::connect(config).expect("connect");
    let started = Instant::now();
    for i in 0..10 {
        handler.info(format!("entry {i}")).expect("submit");
    }
    let entries = collector.wait_for(10, WAIT);
    assert_eq!(entries.len(), 10);
    assert!(started.elapsed() < Duration::from_secs(30));
    handler.close().expect("close");
}

#[rstest]
fn timer_flushes_a_single_idle_entry(collector: Collector) {
    let mut config = config_for(collector.address());
    config.batch_max_wait = Duration::from_millis(50);
    let handler = LogHandler::connect(config).expect("connect");
    handler.error("only one").expect("submit");
    let entries = collector.wait_for(1, WAIT);
    assert_eq!(messages(&entries), vec!["only one".to_owned()]);
    handler.close().expect("close");
}

#[rstest]
fn wire_entries_are_flat_json_objects(collector: Collector) {
    let mut config = config_for(collector.address());
    config.source = "orders".into();
    let handler = LogHandler::connect(config).expect("connect");
    let scoped = handler
        .with_attribute("service", "cart")
        .with_group("http")
        .with_group("checkout");
    scoped
        .submit(
            LogRecord::new(ShipLevel::Warn, "slow request")
                .attr("latency_ms", 812)
                .attr("service", "cart-v2"),
        )
        .expect("submit");
    handler.close().expect("close");

    let entries = collector.wait_for(1, WAIT);
    let entry = entries[0].as_object().expect("object");
    assert_eq!(entry["level"], "WARN");
    assert_eq!(entry["message"], "slow request");
    assert_eq!(entry["source"], "orders");
    assert_eq!(entry["groups"], json!(["http", "checkout"]));
    assert_eq!(entry["latency_ms"], 812);
    assert_eq!(entry["service"], "cart-v2", "record attributes override view attributes");
    assert!(entry.values().all(|v| !v.is_object()), "no nested objects");
    assert!(entry.contains_key("@timestamp"));
}

#[rstest]
fn parent_view_is_unaffected_by_derived_attributes(collector: Collector) {
    let handler = LogHandler::connect(config_for(collector.address())).expect("connect");
    let derived = handler.with_attribute("x", 1);
    derived.info("derived").expect("submit");
    handler.info("parent").expect("submit");
    handler.close().expect("close");

    let entries = collector.wait_for(2, WAIT);
    let parent = entries
        .iter()
        .find(|e| e["message"] == "parent")
        .expect("parent entry");
    assert!(parent.get("x").is_none());
    let derived = entries
        .iter()
        .find(|e| e["message"] == "derived")
        .expect("derived entry");
    assert_eq!(derived["x"], 1);
}

#[rstest]
fn repeated_close_writes_nothing_more(collector: Collector) {
    let stats = Arc::new(ShipperStats::new());
    let handler = LogHandler::builder(config_for(collector.address()))
        .with_metrics(stats.clone())
        .build()
        .expect("connect");
    handler.info("one").expect("submit");
    handler.close().expect("first close");
    let after_first = stats.snapshot();
    handler.close().expect("second close is a no-op");
    assert_eq!(stats.snapshot(), after_first);
    assert_eq!(collector.wait_for(1, WAIT).len(), 1);
    assert!(matches!(handler.info("late"), Err(HandlerError::Closed)));
}

#[rstest]
fn many_producers_deliver_every_entry_once(collector: Collector) {
    let mut config = config_for(collector.address());
    config.batch_size = 25;
    config.max_cache_size = 50;
    config.batch_max_wait = Duration::from_millis(20);
    let handler = LogHandler::connect(config).expect("connect");
    let producers: Vec<_> = (0..4)
        .map(|t| {
            let handler = handler.clone();
            thread::spawn(move || {
                for i in 0..250 {
                    handler
                        .submit(LogRecord::new(ShipLevel::Info, "tick").attr("id", t * 1000 + i))
                        .expect("submit");
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("producer joined");
    }
    handler.close().expect("close");

    let entries = collector.wait_for(1000, WAIT);
    let ids: HashSet<i64> = entries.iter().filter_map(|e| e["id"].as_i64()).collect();
    assert_eq!(entries.len(), 1000);
    assert_eq!(ids.len(), 1000);
}

#[test]
fn unreachable_endpoint_fails_construction() {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let address = listener.local_addr().expect("addr").to_string();
    drop(listener);
    let err = LogHandler::connect(config_for(address)).expect_err("nothing is listening");
    assert!(matches!(
        err,
        HandlerError::Transport(TransportError::Connect { attempts: 2, .. })
    ));
}

#[test]
fn explicit_flush_is_visible_downstream() {
    let collector = Collector::start();
    let handler = LogHandler::connect(config_for(collector.address())).expect("connect");
    handler.info("flushed early").expect("submit");
    handler.flush().expect("flush");
    assert_eq!(collector.wait_for(1, WAIT).len(), 1);
    assert_eq!(collector.connections(), 1);
    handler.close().expect("close");
}
